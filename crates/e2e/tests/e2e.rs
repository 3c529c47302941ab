//! E2E test harness entry point
//!
//! This file is the test binary that runs the bundled YAML specs.
//! Run with: cargo test --package formcheck-e2e --test e2e
//!
//! Without `PLAYWRIGHT_BASE_URL` / `BASE_URL` the demo app is started
//! in-process on a free port, so the suite is hermetic by default.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use formcheck_e2e::config::{ReporterConfig, BASE_URL_ENV, PLAYWRIGHT_BASE_URL_ENV};
use formcheck_e2e::report;
use formcheck_e2e::{DriverKind, E2eResult, RunFilter, RunnerConfig, TestRunner};

#[derive(Parser, Debug)]
#[command(name = "formcheck-e2e")]
#[command(about = "E2E test runner for the formcheck login flow")]
#[command(ignore_errors = true)]
struct Args {
    /// Runner config file (defaults apply when absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run only tests matching this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only a specific test by name
    #[arg(short, long)]
    name: Option<String>,

    /// Step driver
    #[arg(long, value_enum)]
    driver: Option<DriverKind>,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let result = rt.block_on(async_main(args));

    match result {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> E2eResult<bool> {
    let mut config = match &args.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig {
            test_dir: formcheck_e2e::bundled_specs_dir(),
            output_dir: PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("formcheck-e2e"),
            reporters: vec![ReporterConfig::List],
            ..RunnerConfig::default()
        },
    };
    if let Some(driver) = args.driver {
        config.driver = driver;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }

    let external = [PLAYWRIGHT_BASE_URL_ENV, BASE_URL_ENV]
        .iter()
        .any(|name| std::env::var(name).map(|v| !v.trim().is_empty()).unwrap_or(false));

    let mut runner = if external || config.server.is_some() {
        TestRunner::new(config)
    } else {
        let base_url = serve_demo_app().await?;
        TestRunner::new(config).with_base_url(base_url)
    };

    let filter = RunFilter {
        tag: args.tag,
        name: args.name,
    };
    let results = runner.run_filtered(&filter).await?;

    report::emit(&report::from_config(runner.config()), &results)?;
    runner.write_results(&results)?;

    Ok(results.success())
}

/// Start the demo app on a free local port
async fn serve_demo_app() -> E2eResult<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);
    tokio::spawn(async move {
        if let Err(e) = formcheck_web::WebServer::default().serve_listener(listener).await {
            eprintln!("demo app stopped: {}", e);
        }
    });
    Ok(base_url)
}
