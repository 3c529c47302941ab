//! Formcheck CLI
//!
//! Runs the YAML suite, generates manual test cases from templates, checks
//! credential pairs against the login contract and emits Playwright files.

pub mod commands;
pub mod output;
