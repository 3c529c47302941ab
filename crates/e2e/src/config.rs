//! Runner configuration
//!
//! Loaded from a TOML file (usually `formcheck.toml`). A missing file yields
//! the defaults. Relative directories are resolved against the directory
//! holding the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::playwright::Browser;
use crate::server::ServerConfig;

/// Env var checked first for the base URL
pub const PLAYWRIGHT_BASE_URL_ENV: &str = "PLAYWRIGHT_BASE_URL";

/// Env var checked second for the base URL
pub const BASE_URL_ENV: &str = "BASE_URL";

/// Configuration for the test runner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Directory searched for `*.yaml` / `*.yml` specs
    pub test_dir: PathBuf,

    /// Per-test timeout in milliseconds
    pub timeout_ms: u64,

    /// Assertion settings
    pub expect: ExpectConfig,

    /// Base URL used when neither env override is set
    pub base_url: Option<String>,

    /// How many times a failing test is retried
    pub retries: u32,

    /// Maximum tests running at once (None = available parallelism)
    pub workers: Option<usize>,

    /// When to record traces
    pub trace: TracePolicy,

    /// Report outputs
    pub reporters: Vec<ReporterConfig>,

    /// Directory for JSON results and traces
    pub output_dir: PathBuf,

    /// Which driver executes the steps
    pub driver: DriverKind,

    /// Browser options for the playwright driver
    pub playwright: PlaywrightOptions,

    /// Demo app spawned before the run; its address replaces the base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub root: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            test_dir: PathBuf::from("e2e"),
            timeout_ms: 30_000,
            expect: ExpectConfig::default(),
            base_url: None,
            retries: 0,
            workers: None,
            trace: TracePolicy::OnFirstRetry,
            reporters: vec![
                ReporterConfig::List,
                ReporterConfig::Html {
                    output_folder: PathBuf::from("playwright-report"),
                },
            ],
            output_dir: PathBuf::from("test-results"),
            driver: DriverKind::Http,
            playwright: PlaywrightOptions::default(),
            server: None,
            root: PathBuf::from("."),
        }
    }
}

/// Assertion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectConfig {
    /// How long an assertion keeps retrying, in milliseconds
    pub timeout_ms: u64,

    /// Delay between assertion retries, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for ExpectConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            poll_interval_ms: 100,
        }
    }
}

/// Trace capture policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TracePolicy {
    Off,
    On,
    /// Capture only on the first retry of a failing test
    #[default]
    OnFirstRetry,
    /// Capture every attempt, keep the trace only when the attempt fails
    RetainOnFailure,
}

impl TracePolicy {
    /// Whether attempt number `attempt` (0 = first run) records a trace
    pub fn records(&self, attempt: u32) -> bool {
        match self {
            TracePolicy::Off => false,
            TracePolicy::On | TracePolicy::RetainOnFailure => true,
            TracePolicy::OnFirstRetry => attempt == 1,
        }
    }

    /// Whether a recorded trace is written out given the attempt outcome
    pub fn keeps(&self, passed: bool) -> bool {
        match self {
            TracePolicy::RetainOnFailure => !passed,
            _ => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TracePolicy::Off => "off",
            TracePolicy::On => "on",
            TracePolicy::OnFirstRetry => "on-first-retry",
            TracePolicy::RetainOnFailure => "retain-on-failure",
        }
    }
}

/// A report output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReporterConfig {
    /// One console line per finished test
    List,

    /// Self-contained `index.html`. The report is never opened automatically.
    Html { output_folder: PathBuf },

    /// Machine-readable results; defaults to `<output_dir>/test-results.json`
    Json {
        #[serde(default)]
        output_file: Option<PathBuf>,
    },
}

/// Step driver selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// In-process HTTP session interpreting static HTML
    #[default]
    Http,
    /// Node.js Playwright subprocess driving a real browser
    Playwright,
}

/// Options for the playwright driver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightOptions {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for PlaywrightOptions {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> E2eResult<Self> {
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Self>(&content)?
        } else {
            debug!("No config at {}, using defaults", path.display());
            Self::default()
        };
        config.root = root;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> E2eResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| E2eError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the runner cannot work with
    pub fn validate(&self) -> E2eResult<()> {
        if self.timeout_ms == 0 {
            return Err(E2eError::Config("timeout_ms must be positive".to_string()));
        }
        if self.expect.timeout_ms == 0 {
            return Err(E2eError::Config("expect.timeout_ms must be positive".to_string()));
        }
        if self.workers == Some(0) {
            return Err(E2eError::Config("workers must be at least 1".to_string()));
        }
        if let Some(url) = &self.base_url {
            url::Url::parse(url)?;
        }
        Ok(())
    }

    /// Base URL: `PLAYWRIGHT_BASE_URL`, then `BASE_URL`, then the file, then the default
    pub fn resolve_base_url<F>(&self, env: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        [PLAYWRIGHT_BASE_URL_ENV, BASE_URL_ENV]
            .iter()
            .filter_map(|name| env(name))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| formcheck_common::DEFAULT_BASE_URL.to_string())
    }

    /// Base URL from the process environment
    pub fn base_url_from_env(&self) -> String {
        self.resolve_base_url(|name| std::env::var(name).ok())
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn expect_timeout(&self) -> Duration {
        Duration::from_millis(self.expect.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.expect.poll_interval_ms.max(1))
    }

    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Resolve a configured path against [`RunnerConfig::root`]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn test_dir(&self) -> PathBuf {
        self.resolve_path(&self.test_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve_path(&self.output_dir)
    }

    pub fn trace_dir(&self) -> PathBuf {
        self.output_dir().join("traces")
    }
}
