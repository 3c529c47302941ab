//! Formcheck Common Library
//!
//! The login-flow contract checked by the end-to-end suite, plus the
//! test-case tooling (templates, markdown, local storage) shared by the CLI.

pub mod error;
pub mod login;
pub mod storage;
pub mod templates;
pub mod testcase;

// Re-export commonly used types
pub use error::{Error, Result};
pub use login::{validate, CredentialStore, LoginError, LoginForm, LoginOutcome};
pub use storage::LocalStorage;
pub use templates::{TemplateInfo, TemplateParams, TestTemplate};
pub use testcase::{TestCase, TestCaseSet};

/// Formcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Origin the suite targets when no override is set
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Default demo app port, matching [`DEFAULT_BASE_URL`]
pub const DEFAULT_WEB_PORT: u16 = 3000;
