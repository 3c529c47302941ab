//! `formcheck cases`: generate manual test cases from a template

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use formcheck_common::templates::{self, TemplateParams};
use formcheck_common::{LocalStorage, TestCaseSet};

use crate::output::print_success;

/// Rendering of the generated cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CaseFormat {
    #[default]
    Markdown,
    Json,
}

#[derive(Args, Debug)]
pub struct CasesArgs {
    /// Template name (see `formcheck templates`)
    #[arg(long)]
    pub template: String,

    /// Scenario within the template, e.g. `positive` or `negative_password`
    #[arg(long = "type")]
    pub kind: Option<String>,

    /// Extra parameter as key=value; JSON values are accepted
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    #[arg(long, value_enum, default_value_t = CaseFormat::Markdown)]
    pub format: CaseFormat,

    /// Relative file to write instead of printing
    #[arg(long)]
    pub out: Option<PathBuf>,
}

impl CasesArgs {
    fn params(&self) -> Result<TemplateParams> {
        let mut params = TemplateParams::new();
        for pair in &self.params {
            params.insert_pair(pair)?;
        }
        if let Some(kind) = &self.kind {
            params.insert("type", kind.as_str());
        }
        Ok(params)
    }
}

/// Generate and render the requested cases
pub fn render(args: &CasesArgs) -> Result<String> {
    let case = templates::generate(&args.template, &args.params()?)?;
    let set = TestCaseSet::new(vec![case]);
    Ok(match args.format {
        CaseFormat::Markdown => set.to_markdown(),
        CaseFormat::Json => set.to_json()?,
    })
}

pub fn execute(args: CasesArgs) -> Result<()> {
    let content = render(&args)?;
    match &args.out {
        Some(out) => {
            let storage = LocalStorage::new(".")?;
            let relative = out.to_string_lossy();
            let path = storage
                .save_file(&relative, &content)
                .with_context(|| format!("writing {}", relative))?;
            print_success(&format!("Test cases written to {}", path.display()));
        }
        None => println!("{}", content),
    }
    Ok(())
}
