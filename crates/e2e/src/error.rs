//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Playwright not found. Install with: npm i -D playwright @playwright/test && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("Test not found: {0}")]
    TestNotFound(String),

    #[error("No page loaded; navigate first")]
    NoPage,

    #[error("Locator {locator} resolved to {count} elements")]
    StrictMode { locator: String, count: usize },

    #[error("Element {locator} cannot be used for {action}")]
    Unsupported { locator: String, action: String },

    #[error("Expected {what} to be {expected:?}, got {actual:?}")]
    Mismatch {
        what: String,
        expected: String,
        actual: String,
    },

    #[error("Timed out after {timeout_ms} ms waiting for: {waiting_for}")]
    Timeout { waiting_for: String, timeout_ms: u64 },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Test task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl E2eError {
    /// Classification used in reports
    pub fn kind(&self) -> FailureKind {
        match self {
            E2eError::Timeout { .. } => FailureKind::Timeout,
            E2eError::Mismatch { .. } | E2eError::StrictMode { .. } => FailureKind::Mismatch,
            _ => FailureKind::Error,
        }
    }
}

/// Why a test case failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A condition was not met within its window
    Timeout,
    /// An observed value differed from the expected one
    Mismatch,
    /// Anything else (network, bad locator, driver failure)
    Error,
}

pub type E2eResult<T> = Result<T, E2eError>;
