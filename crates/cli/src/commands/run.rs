//! `formcheck run`: execute the YAML suite

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::{info, warn};

use formcheck_e2e::report;
use formcheck_e2e::{DriverKind, RunFilter, RunnerConfig, TestRunner, TestSuiteResult};

use crate::output::{print_error, print_success, print_warning};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Runner config file; defaults apply when it does not exist
    #[arg(short, long, default_value = "formcheck.toml")]
    pub config: PathBuf,

    /// Run only tests carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Run only the test with this exact name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Step driver
    #[arg(long, value_enum)]
    pub driver: Option<DriverKind>,

    /// Maximum tests running at once
    #[arg(long)]
    pub workers: Option<usize>,

    /// Retries for a failing test
    #[arg(long)]
    pub retries: Option<u32>,

    /// Directory specs are loaded from
    #[arg(long)]
    pub test_dir: Option<PathBuf>,

    /// Start the demo app in-process and test against it
    #[arg(long)]
    pub serve: bool,
}

impl RunArgs {
    /// Config file with command-line overrides applied
    pub fn load_config(&self) -> Result<RunnerConfig> {
        let mut config = RunnerConfig::load(&self.config)?;
        if let Some(driver) = self.driver {
            config.driver = driver;
        }
        if let Some(workers) = self.workers {
            config.workers = Some(workers);
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if let Some(dir) = &self.test_dir {
            config.test_dir = std::env::current_dir()?.join(dir);
        }
        config.validate()?;
        Ok(config)
    }

    fn filter(&self) -> RunFilter {
        RunFilter {
            tag: self.tag.clone(),
            name: self.name.clone(),
        }
    }
}

/// Run the suite; `Ok(false)` when any test failed
pub async fn execute(args: RunArgs) -> Result<bool> {
    let config = args.load_config()?;

    let mut runner = if args.serve {
        if config.server.is_some() {
            warn!("--serve given; ignoring the [server] section of {}", args.config.display());
        }
        let config = RunnerConfig {
            server: None,
            ..config
        };
        let base_url = serve_demo_app().await?;
        TestRunner::new(config).with_base_url(base_url)
    } else {
        TestRunner::new(config)
    };

    let suite = runner.run_filtered(&args.filter()).await?;
    runner.stop_server();

    report::emit(&report::from_config(runner.config()), &suite)?;
    runner.write_results(&suite)?;
    print_summary(&suite);

    Ok(suite.success())
}

/// Bind a free local port and serve the demo app on it
async fn serve_demo_app() -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);
    tokio::spawn(async move {
        if let Err(e) = formcheck_web::WebServer::default().serve_listener(listener).await {
            tracing::error!("Demo app stopped: {}", e);
        }
    });
    info!("Serving demo app at {}", base_url);
    Ok(base_url)
}

fn print_summary(suite: &TestSuiteResult) {
    println!();
    let counts = format!(
        "{} passed, {} failed, {} flaky, {} timed out",
        suite.passed.to_string().green(),
        suite.failed.to_string().red(),
        suite.flaky.to_string().yellow(),
        suite.timed_out.to_string().red()
    );
    if suite.success() {
        print_success(&format!("{} ({} ms)", counts, suite.duration_ms));
        if suite.flaky > 0 {
            print_warning("Some tests only passed on retry");
        }
    } else {
        print_error(&format!("{} ({} ms)", counts, suite.duration_ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: RunArgs,
    }

    #[test]
    fn test_overrides_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("formcheck.toml");
        std::fs::write(&path, "retries = 1\nworkers = 2\n").unwrap();

        let wrapper = Wrapper::parse_from([
            "formcheck",
            "--config",
            path.to_str().unwrap(),
            "--retries",
            "3",
            "--driver",
            "playwright",
        ]);
        let config = wrapper.args.load_config().unwrap();
        assert_eq!(config.retries, 3);
        assert_eq!(config.workers, Some(2));
        assert_eq!(config.driver, DriverKind::Playwright);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let wrapper = Wrapper::parse_from([
            "formcheck",
            "--config",
            dir.path().join("missing.toml").to_str().unwrap(),
            "--workers",
            "0",
        ]);
        assert!(wrapper.args.load_config().is_err());
    }
}
