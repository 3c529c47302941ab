//! Formcheck demo web app
//!
//! A landing page, a login form that enforces the login contract, and the
//! dashboard the form redirects to on success.

pub mod pages;
pub mod server;

pub use server::{serve, WebServer, WebServerConfig};
