//! Formcheck E2E Test Framework
//!
//! This crate provides a Rust-controlled E2E testing framework that:
//! - Parses declarative YAML test specs (navigate, fill, click, expect)
//! - Runs each spec in an isolated session, in parallel, under timeouts
//! - Drives either an in-process HTTP session or a Playwright browser
//! - Retries failing tests and records traces per policy
//! - Writes list, HTML and JSON reports
//! - Generates Playwright `.spec.ts` / `.spec.js` files from the same specs
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RunnerConfig (formcheck.toml + BASE_URL env)               │
//! │  TestRunner                                                 │
//! │    ├── start_server() -> ServerHandle (optional)            │
//! │    ├── run_specs(specs) -> TestSuiteResult                  │
//! │    │     └── per spec: Semaphore permit, timeout, retries   │
//! │    └── Driver::execute(spec) -> Execution                   │
//! │          ├── HttpDriver (reqwest + scraper)                 │
//! │          └── PlaywrightDriver (node subprocess)             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestSpec (YAML)                                            │
//! │    ├── name, description, tags                              │
//! │    └── steps: navigate | fill | click | expect_title |      │
//! │               expect_url | expect_text | expect_visible     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod codegen;
pub mod config;
pub mod dom;
pub mod driver;
pub mod error;
pub mod http_driver;
pub mod playwright;
pub mod report;
pub mod runner;
pub mod server;
pub mod spec;

pub use config::{DriverKind, RunnerConfig, TracePolicy};
pub use driver::{Driver, StepResult};
pub use error::{E2eError, E2eResult, FailureKind};
pub use runner::{RunFilter, TestResult, TestRunner, TestStatus, TestSuiteResult};
pub use spec::{Locator, TestSpec, TestStep};

/// Directory holding the bundled specs
pub fn bundled_specs_dir() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("specs")
}
