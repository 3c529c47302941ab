//! Driver seam: something that can run one test case in a fresh session

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult, FailureKind};
use crate::spec::TestSpec;

/// Result of executing a test step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub step_name: String,
    pub duration_ms: u64,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
}

impl StepResult {
    pub fn passed(step_name: String, duration: Duration) -> Self {
        Self {
            success: true,
            step_name,
            duration_ms: duration.as_millis() as u64,
            error: None,
            kind: None,
        }
    }

    pub fn failed(step_name: String, duration: Duration, error: &E2eError) -> Self {
        Self {
            success: false,
            step_name,
            duration_ms: duration.as_millis() as u64,
            error: Some(error.to_string()),
            kind: Some(error.kind()),
        }
    }
}

/// Everything a driver needs for one attempt of one test
#[derive(Debug, Clone)]
pub struct AttemptContext {
    /// Origin navigations are resolved against
    pub base_url: String,
    /// Upper bound for a single browser navigation
    pub navigation_timeout: Duration,
    /// How long assertions and element lookups keep retrying
    pub expect_timeout: Duration,
    pub poll_interval: Duration,
    /// Where to write a trace, when this attempt records one
    pub trace_path: Option<PathBuf>,
}

/// Steps executed by one attempt, stopping at the first failure
#[derive(Debug, Clone, Default)]
pub struct Execution {
    pub steps: Vec<StepResult>,
}

impl Execution {
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|s| s.success)
    }

    pub fn first_failure(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| !s.success)
    }
}

/// A timestamped session event written to JSON traces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Milliseconds since the session started
    pub at_ms: u64,
    pub event: String,
    pub detail: String,
}

/// Runs a whole test case in an isolated session
///
/// Step failures are reported inside [`Execution`]. An `Err` means the
/// driver itself could not run (missing tooling, unwritable trace).
#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> &'static str;

    /// File extension of the traces this driver writes
    fn trace_extension(&self) -> &'static str;

    async fn execute(&self, spec: &TestSpec, ctx: &AttemptContext) -> E2eResult<Execution>;
}

/// One evaluation of a retrying condition
#[derive(Debug)]
pub enum Probe<T> {
    /// Condition met
    Ready(T),
    /// Target element not present yet
    Missing(String),
    /// Target present but its value differs
    Mismatch {
        what: String,
        expected: String,
        actual: String,
    },
}

/// Re-evaluate `check` until it is ready or `timeout` elapses
///
/// Hard errors from `check` end polling immediately. At the deadline a
/// missing target becomes [`E2eError::Timeout`] and a differing value
/// becomes [`E2eError::Mismatch`].
pub async fn poll_until<T, F>(timeout: Duration, interval: Duration, mut check: F) -> E2eResult<T>
where
    F: FnMut() -> E2eResult<Probe<T>> + Send,
    T: Send,
{
    let start = Instant::now();
    loop {
        let expired = start.elapsed() >= timeout;
        match check()? {
            Probe::Ready(value) => return Ok(value),
            Probe::Missing(waiting_for) if expired => {
                return Err(E2eError::Timeout {
                    waiting_for,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Probe::Mismatch {
                what,
                expected,
                actual,
            } if expired => {
                return Err(E2eError::Mismatch {
                    what,
                    expected,
                    actual,
                })
            }
            _ => {}
        }

        tokio::time::sleep(interval).await;
    }
}
