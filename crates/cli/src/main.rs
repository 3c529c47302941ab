//! Formcheck CLI - Main Entry Point

use clap::{Parser, Subcommand};

use formcheck_cli::commands::{cases, codegen, run, templates, validate};
use formcheck_cli::output::{self, print_error};

/// Formcheck - end-to-end checks for a web login flow
#[derive(Parser)]
#[command(name = "formcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the YAML test suite
    Run(run::RunArgs),

    /// List test-case templates
    Templates {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: output::OutputFormat,
    },

    /// Generate manual test cases from a template
    Cases(cases::CasesArgs),

    /// Check a credential pair against the login contract
    Validate(validate::ValidateArgs),

    /// Generate Playwright test files from the YAML specs
    Codegen(codegen::CodegenArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => match run::execute(args).await {
            Ok(true) => {}
            Ok(false) => std::process::exit(1),
            Err(e) => {
                print_error(&format!("{:#}", e));
                std::process::exit(2);
            }
        },
        Commands::Templates { format } => templates::execute(format)?,
        Commands::Cases(args) => cases::execute(args)?,
        Commands::Validate(args) => validate::execute(args)?,
        Commands::Codegen(args) => codegen::execute(args)?,
        Commands::Version => {
            println!("formcheck v{}", formcheck_common::VERSION);
            println!("Default base URL: {}", formcheck_common::DEFAULT_BASE_URL);
        }
    }

    Ok(())
}
