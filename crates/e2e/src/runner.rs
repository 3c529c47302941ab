//! Main test runner: discovery, parallel execution, retries and traces

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::{DriverKind, RunnerConfig};
use crate::driver::{AttemptContext, Driver, StepResult};
use crate::error::{E2eError, E2eResult, FailureKind};
use crate::http_driver::HttpDriver;
use crate::playwright::PlaywrightDriver;
use crate::server::ServerHandle;
use crate::spec::TestSpec;

/// Final state of one test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    TimedOut,
    /// Failed at least once, then passed on a retry
    Flaky,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::TimedOut => "timed_out",
            TestStatus::Flaky => "flaky",
        }
    }
}

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub file: Option<String>,
    pub status: TestStatus,
    pub attempts: u32,
    pub duration_ms: u64,
    /// Steps of the last attempt
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
    pub kind: Option<FailureKind>,
    pub trace_path: Option<PathBuf>,
}

impl TestResult {
    pub fn success(&self) -> bool {
        matches!(self.status, TestStatus::Passed | TestStatus::Flaky)
    }

    /// Result for a test whose task died before producing one
    fn crashed(name: String, file: Option<String>, error: E2eError) -> Self {
        Self {
            name,
            file,
            status: TestStatus::Failed,
            attempts: 1,
            duration_ms: 0,
            steps: Vec::new(),
            kind: Some(error.kind()),
            error: Some(error.to_string()),
            trace_path: None,
        }
    }
}

/// Result of running all tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub flaky: usize,
    pub timed_out: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub base_url: String,
    /// In discovery order
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    fn from_results(
        results: Vec<TestResult>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        base_url: String,
    ) -> Self {
        let count = |status: TestStatus| results.iter().filter(|r| r.status == status).count();
        Self {
            total: results.len(),
            passed: count(TestStatus::Passed),
            failed: count(TestStatus::Failed),
            flaky: count(TestStatus::Flaky),
            timed_out: count(TestStatus::TimedOut),
            started_at,
            duration_ms,
            base_url,
            results,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0 && self.timed_out == 0
    }
}

/// Which specs to run
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub tag: Option<String>,
    pub name: Option<String>,
}

impl RunFilter {
    fn matches(&self, spec: &TestSpec) -> bool {
        self.tag.as_ref().map_or(true, |t| spec.tags.contains(t))
            && self.name.as_ref().map_or(true, |n| &spec.name == n)
    }
}

/// Main E2E test runner
pub struct TestRunner {
    config: Arc<RunnerConfig>,

    driver: Arc<dyn Driver>,

    /// Resolved base URL (env, file or spawned server)
    base_url: String,

    /// Running server handle (if any)
    server: Option<ServerHandle>,
}

impl TestRunner {
    /// Create a runner using the driver selected in `config`
    pub fn new(config: RunnerConfig) -> Self {
        let driver: Arc<dyn Driver> = match config.driver {
            DriverKind::Http => Arc::new(HttpDriver::new()),
            DriverKind::Playwright => Arc::new(PlaywrightDriver::new(
                config.playwright.clone(),
                config.root.clone(),
            )),
        };
        Self::with_driver(config, driver)
    }

    /// Create a runner with an explicit driver
    pub fn with_driver(config: RunnerConfig, driver: Arc<dyn Driver>) -> Self {
        let base_url = config.base_url_from_env();
        Self {
            config: Arc::new(config),
            driver,
            base_url,
            server: None,
        }
    }

    /// Override the resolved base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Start the configured server, if any
    pub async fn start_server(&mut self) -> E2eResult<()> {
        if self.server.is_some() {
            return Ok(());
        }
        let Some(server_config) = &self.config.server else {
            return Ok(());
        };

        let mut server_config = server_config.clone();
        server_config.binary_path = self.config.resolve_path(&server_config.binary_path);
        let server = ServerHandle::spawn(&server_config).await?;

        self.base_url = server.base_url().to_string();
        self.server = Some(server);
        Ok(())
    }

    /// Stop the server
    pub fn stop_server(&mut self) {
        if let Some(mut server) = self.server.take() {
            server.stop();
        }
    }

    /// Discover all specs under the test directory
    pub fn load_specs(&self) -> E2eResult<Vec<TestSpec>> {
        TestSpec::load_all(&self.config.test_dir())
    }

    /// Run all tests in the test directory
    pub async fn run_all(&mut self) -> E2eResult<TestSuiteResult> {
        self.run_filtered(&RunFilter::default()).await
    }

    /// Run tests matching a tag
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<TestSuiteResult> {
        self.run_filtered(&RunFilter {
            tag: Some(tag.to_string()),
            name: None,
        })
        .await
    }

    /// Run the tests `filter` selects
    pub async fn run_filtered(&mut self, filter: &RunFilter) -> E2eResult<TestSuiteResult> {
        let specs: Vec<TestSpec> = self
            .load_specs()?
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect();
        if let (Some(name), true) = (&filter.name, specs.is_empty()) {
            return Err(E2eError::TestNotFound(name.clone()));
        }
        self.run_specs(specs).await
    }

    /// Run a specific test by name
    pub async fn run_test(&mut self, name: &str) -> E2eResult<TestResult> {
        let spec = self
            .load_specs()?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::TestNotFound(name.to_string()))?;

        self.start_server().await?;
        Ok(self.job().run(&spec).await)
    }

    /// Run a list of test specs, at most `workers` at a time
    pub async fn run_specs(&mut self, specs: Vec<TestSpec>) -> E2eResult<TestSuiteResult> {
        TestSpec::check_unique(&specs)?;
        self.start_server().await?;

        let started_at = Utc::now();
        let start = Instant::now();
        let total = specs.len();
        let workers = self.config.effective_workers().max(1);
        let semaphore = Arc::new(Semaphore::new(workers));

        info!(
            "Running {} test(s) using {} worker(s) against {} ({} driver)",
            total,
            workers,
            self.base_url,
            self.driver.name()
        );

        let mut tasks = JoinSet::new();
        for (index, spec) in specs.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let job = self.job();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let name = spec.name.clone();
                let file = spec.file_name();
                let result = match tokio::spawn(async move { job.run(&spec).await }).await {
                    Ok(result) => result,
                    Err(e) => TestResult::crashed(name, file, E2eError::Join(e)),
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<TestResult>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined?;
            if result.success() {
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            slots[index] = Some(result);
        }

        let results: Vec<TestResult> = slots.into_iter().flatten().collect();
        let duration_ms = start.elapsed().as_millis() as u64;
        let suite = TestSuiteResult::from_results(results, started_at, duration_ms, self.base_url.clone());

        info!(
            "Test Results: {} passed, {} failed, {} flaky, {} timed out ({} ms)",
            suite.passed, suite.failed, suite.flaky, suite.timed_out, duration_ms
        );
        Ok(suite)
    }

    /// Write test results to `<output_dir>/test-results.json`
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        let output_dir = self.config.output_dir();
        std::fs::create_dir_all(&output_dir)?;

        let path = output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }

    fn job(&self) -> TestJob {
        TestJob {
            config: self.config.clone(),
            driver: self.driver.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

impl Drop for TestRunner {
    fn drop(&mut self) {
        self.stop_server();
    }
}

/// Everything one spawned test task needs
struct TestJob {
    config: Arc<RunnerConfig>,
    driver: Arc<dyn Driver>,
    base_url: String,
}

/// Outcome of a single attempt
struct Attempt {
    status: TestStatus,
    steps: Vec<StepResult>,
    error: Option<String>,
    kind: Option<FailureKind>,
}

impl TestJob {
    /// Run one spec with retries; never fails, errors become the result
    async fn run(&self, spec: &TestSpec) -> TestResult {
        let start = Instant::now();
        let policy = self.config.trace;
        let max_attempts = self.config.retries + 1;
        let mut kept_trace = None;
        let mut attempt_no = 0;

        loop {
            let trace_path = policy.records(attempt_no).then(|| {
                trace_file(
                    &self.config.trace_dir(),
                    &spec.name,
                    attempt_no,
                    self.driver.trace_extension(),
                )
            });
            let attempt = self.attempt(spec, trace_path.clone()).await;
            let passed = attempt.status == TestStatus::Passed;

            if let Some(path) = trace_path {
                if policy.keeps(passed) && path.exists() {
                    kept_trace = Some(path);
                } else if path.exists() {
                    if let Err(e) = std::fs::remove_file(&path) {
                        warn!("Could not remove trace {}: {}", path.display(), e);
                    }
                }
            }

            attempt_no += 1;
            if passed || attempt_no >= max_attempts {
                let status = match attempt.status {
                    TestStatus::Passed if attempt_no > 1 => TestStatus::Flaky,
                    other => other,
                };
                return TestResult {
                    name: spec.name.clone(),
                    file: spec.file_name(),
                    status,
                    attempts: attempt_no,
                    duration_ms: start.elapsed().as_millis() as u64,
                    steps: attempt.steps,
                    error: attempt.error,
                    kind: attempt.kind,
                    trace_path: kept_trace,
                };
            }

            warn!(
                "{} failed (attempt {}/{}), retrying: {}",
                spec.name,
                attempt_no,
                max_attempts,
                attempt.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    /// One attempt under the per-test timeout
    async fn attempt(&self, spec: &TestSpec, trace_path: Option<PathBuf>) -> Attempt {
        let ctx = AttemptContext {
            base_url: self.base_url.clone(),
            navigation_timeout: self.config.test_timeout(),
            expect_timeout: self.config.expect_timeout(),
            poll_interval: self.config.poll_interval(),
            trace_path,
        };
        debug!("Running test: {}", spec.name);

        let timeout = self.config.test_timeout();
        match tokio::time::timeout(timeout, self.driver.execute(spec, &ctx)).await {
            Err(_) => Attempt {
                status: TestStatus::TimedOut,
                steps: Vec::new(),
                error: Some(format!("Test timeout of {} ms exceeded", timeout.as_millis())),
                kind: Some(FailureKind::Timeout),
            },
            Ok(Err(e)) => Attempt {
                status: TestStatus::Failed,
                steps: Vec::new(),
                error: Some(e.to_string()),
                kind: Some(e.kind()),
            },
            Ok(Ok(execution)) => {
                let failure = execution.first_failure().cloned();
                Attempt {
                    status: if failure.is_some() {
                        TestStatus::Failed
                    } else {
                        TestStatus::Passed
                    },
                    error: failure.as_ref().and_then(|f| {
                        f.error.as_ref().map(|e| format!("{}: {}", f.step_name, e))
                    }),
                    kind: failure.and_then(|f| f.kind),
                    steps: execution.steps,
                }
            }
        }
    }
}

/// `<trace_dir>/<slug>[-retryN].<ext>`
fn trace_file(trace_dir: &Path, name: &str, attempt: u32, extension: &str) -> PathBuf {
    let slug = crate::spec::slug(name);
    let file = if attempt == 0 {
        format!("{}.{}", slug, extension)
    } else {
        format!("{}-retry{}.{}", slug, attempt, extension)
    };
    trace_dir.join(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::config::TracePolicy;
    use crate::driver::Execution;

    /// Fails the first `failures` attempts, writing the trace when asked
    struct FlakyDriver {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Driver for FlakyDriver {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn trace_extension(&self) -> &'static str {
            "json"
        }

        async fn execute(&self, spec: &TestSpec, ctx: &AttemptContext) -> E2eResult<Execution> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(path) = &ctx.trace_path {
                std::fs::create_dir_all(path.parent().unwrap())?;
                std::fs::write(path, "{}")?;
            }
            let step = spec.steps[0].name();
            let result = if call < self.failures {
                StepResult::failed(
                    step,
                    Duration::ZERO,
                    &E2eError::Mismatch {
                        what: "x".into(),
                        expected: "a".into(),
                        actual: "b".into(),
                    },
                )
            } else {
                StepResult::passed(step, Duration::ZERO)
            };
            Ok(Execution { steps: vec![result] })
        }
    }

    /// Panics on the test named `boom`
    struct PanickingDriver;

    #[async_trait]
    impl Driver for PanickingDriver {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn trace_extension(&self) -> &'static str {
            "json"
        }

        async fn execute(&self, spec: &TestSpec, _ctx: &AttemptContext) -> E2eResult<Execution> {
            if spec.name == "boom" {
                panic!("driver bug");
            }
            Ok(Execution {
                steps: vec![StepResult::passed(spec.steps[0].name(), Duration::ZERO)],
            })
        }
    }

    fn spec(name: &str) -> TestSpec {
        TestSpec::from_yaml(&format!(
            "name: {}\nsteps:\n  - action: log\n    message: hi\n",
            name
        ))
        .unwrap()
    }

    fn config(dir: &Path, retries: u32, trace: TracePolicy) -> RunnerConfig {
        RunnerConfig {
            retries,
            trace,
            root: dir.to_path_buf(),
            ..RunnerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_panicking_test_does_not_abort_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = TestRunner::with_driver(
            config(dir.path(), 0, TracePolicy::Off),
            Arc::new(PanickingDriver),
        );

        let suite = runner
            .run_specs(vec![spec("before"), spec("boom"), spec("after")])
            .await
            .unwrap();

        let names: Vec<&str> = suite.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["before", "boom", "after"]);
        assert_eq!(suite.passed, 2);
        assert_eq!(suite.failed, 1);
        let boom = &suite.results[1];
        assert_eq!(boom.status, TestStatus::Failed);
        assert_eq!(boom.kind, Some(FailureKind::Error));
        assert!(boom.error.as_deref().unwrap().starts_with("Test task failed"));
    }

    #[tokio::test]
    async fn test_names_sharing_a_trace_file_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = TestRunner::with_driver(
            config(dir.path(), 0, TracePolicy::On),
            Arc::new(PanickingDriver),
        );

        let err = runner
            .run_specs(vec![spec("Login Works"), spec("login works")])
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::SpecParse(_)));
        assert!(!dir.path().join("test-results").exists());
    }

    #[tokio::test]
    async fn test_retry_marks_flaky_and_keeps_first_retry_trace() {
        let dir = tempfile::tempdir().unwrap();
        let driver = Arc::new(FlakyDriver {
            failures: 1,
            calls: AtomicU32::new(0),
        });
        let mut runner = TestRunner::with_driver(
            config(dir.path(), 1, TracePolicy::OnFirstRetry),
            driver,
        );

        let suite = runner.run_specs(vec![spec("Login Works")]).await.unwrap();
        let result = &suite.results[0];
        assert_eq!(result.status, TestStatus::Flaky);
        assert_eq!(result.attempts, 2);
        assert!(suite.success());
        assert_eq!(
            result.trace_path.as_deref(),
            Some(dir.path().join("test-results/traces/login-works-retry1.json").as_path())
        );
        assert!(!dir.path().join("test-results/traces/login-works.json").exists());
    }

    #[tokio::test]
    async fn test_no_retries_means_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let driver = Arc::new(FlakyDriver {
            failures: 5,
            calls: AtomicU32::new(0),
        });
        let mut runner = TestRunner::with_driver(
            config(dir.path(), 0, TracePolicy::OnFirstRetry),
            driver,
        );

        let suite = runner.run_specs(vec![spec("a")]).await.unwrap();
        let result = &suite.results[0];
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.kind, Some(FailureKind::Mismatch));
        assert!(result.error.as_deref().unwrap().starts_with("log:hi: "));
        assert!(result.trace_path.is_none());
        assert!(!suite.success());
    }

    #[tokio::test]
    async fn test_retain_on_failure_drops_passing_traces() {
        let dir = tempfile::tempdir().unwrap();
        let driver = Arc::new(FlakyDriver {
            failures: 0,
            calls: AtomicU32::new(0),
        });
        let mut runner = TestRunner::with_driver(
            config(dir.path(), 0, TracePolicy::RetainOnFailure),
            driver,
        );

        let suite = runner.run_specs(vec![spec("a")]).await.unwrap();
        assert_eq!(suite.results[0].status, TestStatus::Passed);
        assert!(suite.results[0].trace_path.is_none());
        assert!(!dir.path().join("test-results/traces/a.json").exists());
    }

    #[test]
    fn test_trace_file_names() {
        let dir = Path::new("/out");
        assert_eq!(trace_file(dir, "Вход OK", 0, "zip"), dir.join("вход-ok.zip"));
        assert_eq!(trace_file(dir, "a/b", 2, "json"), dir.join("a-b-retry2.json"));
    }

    #[test]
    fn test_filter() {
        let mut s = spec("x");
        s.tags = vec!["login".to_string()];
        let by_tag = RunFilter {
            tag: Some("login".to_string()),
            name: None,
        };
        let by_name = RunFilter {
            tag: None,
            name: Some("y".to_string()),
        };
        assert!(by_tag.matches(&s));
        assert!(!by_name.matches(&s));
        assert!(RunFilter::default().matches(&s));
    }

    #[test]
    fn test_suite_counts() {
        let make = |status| TestResult {
            name: "t".to_string(),
            file: None,
            status,
            attempts: 1,
            duration_ms: 0,
            steps: Vec::new(),
            error: None,
            kind: None,
            trace_path: None,
        };
        let suite = TestSuiteResult::from_results(
            vec![
                make(TestStatus::Passed),
                make(TestStatus::Flaky),
                make(TestStatus::TimedOut),
            ],
            Utc::now(),
            10,
            "http://localhost:3000".to_string(),
        );
        assert_eq!((suite.passed, suite.flaky, suite.timed_out, suite.failed), (1, 1, 1, 0));
        assert!(!suite.success());
    }
}
