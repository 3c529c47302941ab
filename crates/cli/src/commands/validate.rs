//! `formcheck validate`: evaluate a credential pair against the login contract

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use formcheck_common::login::{self, CredentialStore, LoginForm, LoginOutcome, DASHBOARD_PATH};

use crate::output::{print_item, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[arg(long, default_value = "")]
    pub email: String,

    #[arg(long, default_value = "")]
    pub password: String,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// What the login page would do with a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationDisplay {
    pub email: String,
    pub accepted: bool,
    /// Where the browser ends up
    pub location: String,
    /// Alert text, when rejected
    pub alert: Option<String>,
}

impl ValidationDisplay {
    pub fn evaluate(form: &LoginForm, store: &CredentialStore) -> Self {
        let outcome = LoginOutcome::from(login::validate(form, store));
        let (accepted, location, alert) = match outcome {
            LoginOutcome::Authenticated => (true, DASHBOARD_PATH.to_string(), None),
            LoginOutcome::Rejected(e) => (false, "/login".to_string(), Some(e.message().to_string())),
        };
        Self {
            email: form.email.clone(),
            accepted,
            location,
            alert,
        }
    }
}

impl TableDisplay for ValidationDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Email", "Outcome", "Location", "Alert"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.email.clone(),
            if self.accepted { "accepted" } else { "rejected" }.to_string(),
            self.location.clone(),
            self.alert.clone().unwrap_or_default(),
        ]
    }
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    let form = LoginForm::new(args.email, args.password);
    let display = ValidationDisplay::evaluate(&form, &CredentialStore::demo());
    print_item(&display, args.format)
}
