//! Error types for formcheck

use thiserror::Error;

/// Result type alias using the formcheck Error
pub type Result<T> = std::result::Result<T, Error>;

/// Formcheck error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Path must be relative: {0}")]
    AbsolutePath(String),

    #[error("Path traversal detected: {0}")]
    PathTraversal(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Invalid template parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },
}
