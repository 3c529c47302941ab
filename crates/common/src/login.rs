//! Login form validation contract
//!
//! The rules a login page must satisfy. Validation is evaluated top to
//! bottom and the first failing rule wins:
//!
//! 1. empty email
//! 2. malformed email
//! 3. empty password
//! 4. unknown credential pair
//!
//! A successful submission navigates to [`DASHBOARD_PATH`], which renders
//! [`WELCOME_TEXT`].

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Path the browser lands on after a successful login
pub const DASHBOARD_PATH: &str = "/dashboard.html";

/// Text rendered on the dashboard after a successful login
pub const WELCOME_TEXT: &str = "Добро пожаловать";

/// Accessible label of the email input
pub const EMAIL_LABEL: &str = "Email";

/// Accessible label of the password input
pub const PASSWORD_LABEL: &str = "Пароль";

/// Accessible name of the submit button
pub const SUBMIT_LABEL: &str = "Войти";

/// Demo credential fixture
pub const DEMO_EMAIL: &str = "user@example.com";
pub const DEMO_PASSWORD: &str = "Passw0rd!";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("email pattern is valid")
});

/// Values submitted by the login form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Why a login submission was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginError {
    EmailRequired,
    InvalidEmailFormat,
    PasswordRequired,
    InvalidCredentials,
}

impl LoginError {
    /// All rejections in evaluation order
    pub const ALL: [LoginError; 4] = [
        LoginError::EmailRequired,
        LoginError::InvalidEmailFormat,
        LoginError::PasswordRequired,
        LoginError::InvalidCredentials,
    ];

    /// The exact message rendered in the alert element
    pub fn message(&self) -> &'static str {
        match self {
            LoginError::EmailRequired => "Email обязателен",
            LoginError::InvalidEmailFormat => "Неверный формат email",
            LoginError::PasswordRequired => "Пароль обязателен",
            LoginError::InvalidCredentials => "Неверные учетные данные",
        }
    }
}

impl std::fmt::Display for LoginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for LoginError {}

/// Known credential pairs, keyed by email
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    pairs: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding only the demo fixture
    pub fn demo() -> Self {
        let mut store = Self::new();
        store.insert(DEMO_EMAIL, DEMO_PASSWORD);
        store
    }

    pub fn insert(&mut self, email: impl Into<String>, password: impl Into<String>) {
        self.pairs.insert(email.into(), password.into());
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Check a pair. Emails compare exactly after trimming.
    pub fn verify(&self, email: &str, password: &str) -> bool {
        self.pairs
            .get(email.trim())
            .map(|known| known == password)
            .unwrap_or(false)
    }
}

/// Outcome of a submission, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated,
    Rejected(LoginError),
}

impl fmt::Display for LoginOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginOutcome::Authenticated => write!(f, "redirect to {}", DASHBOARD_PATH),
            LoginOutcome::Rejected(e) => write!(f, "alert: {}", e),
        }
    }
}

impl From<Result<(), LoginError>> for LoginOutcome {
    fn from(result: Result<(), LoginError>) -> Self {
        match result {
            Ok(()) => LoginOutcome::Authenticated,
            Err(e) => LoginOutcome::Rejected(e),
        }
    }
}

/// Whether `email` looks like an address. Surrounding whitespace is ignored.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Apply the validation rules in order
pub fn validate(form: &LoginForm, store: &CredentialStore) -> Result<(), LoginError> {
    let email = form.email.trim();

    if email.is_empty() {
        return Err(LoginError::EmailRequired);
    }
    if !is_valid_email(email) {
        return Err(LoginError::InvalidEmailFormat);
    }
    if form.password.is_empty() {
        return Err(LoginError::PasswordRequired);
    }
    if !store.verify(email, &form.password) {
        return Err(LoginError::InvalidCredentials);
    }

    Ok(())
}
