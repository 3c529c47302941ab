//! Playwright browser automation
//!
//! A whole test case is compiled into one Node.js script that drives a fresh
//! browser context. The script prints one JSON line per executed step on
//! stdout; the driver turns those lines back into [`StepResult`]s.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::codegen::{js_string, locator_expr};
use crate::config::PlaywrightOptions;
use crate::driver::{AttemptContext, Driver, Execution, StepResult};
use crate::error::{E2eError, E2eResult, FailureKind};
use crate::spec::{TestSpec, TestStep};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// Driver running each test in a real browser via Node.js Playwright
pub struct PlaywrightDriver {
    options: PlaywrightOptions,

    /// Directory whose `node_modules` provides `playwright`
    project_dir: PathBuf,

    installed: OnceCell<bool>,
}

impl PlaywrightDriver {
    pub fn new(options: PlaywrightOptions, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            options,
            project_dir: project_dir.into(),
            installed: OnceCell::new(),
        }
    }

    /// Check if Playwright is installed (once per driver)
    async fn ensure_installed(&self) -> E2eResult<()> {
        let installed = self
            .installed
            .get_or_init(|| async {
                let status = Command::new("npx")
                    .args(["playwright", "--version"])
                    .current_dir(&self.project_dir)
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .await;
                matches!(status, Ok(s) if s.success())
            })
            .await;

        if *installed {
            Ok(())
        } else {
            Err(E2eError::PlaywrightNotFound)
        }
    }

    /// Execute the full script via node
    async fn run_script(&self, script: &str) -> E2eResult<std::process::Output> {
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("test.js");
        std::fs::write(&script_path, script)?;

        debug!("Running Playwright script: {}", script_path.display());

        let output = Command::new("node")
            .arg(&script_path)
            .current_dir(&self.project_dir)
            .env("NODE_PATH", self.project_dir.join("node_modules"))
            .kill_on_drop(true)
            .output()
            .await?;
        Ok(output)
    }
}

#[async_trait]
impl Driver for PlaywrightDriver {
    fn name(&self) -> &'static str {
        "playwright"
    }

    fn trace_extension(&self) -> &'static str {
        "zip"
    }

    async fn execute(&self, spec: &TestSpec, ctx: &AttemptContext) -> E2eResult<Execution> {
        self.ensure_installed().await?;

        if let Some(parent) = ctx.trace_path.as_deref().and_then(Path::parent) {
            std::fs::create_dir_all(parent)?;
        }

        let script = build_script(spec, ctx, &self.options);
        let output = self.run_script(&script).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        for line in stderr.lines().filter(|l| l.starts_with("[TEST LOG]")) {
            info!("{}", line);
        }

        verdict(spec, output.status.success(), &stdout, &stderr)
    }
}

/// Turn the script's exit status and output into an [`Execution`]
///
/// A script that exits with an error, or stops reporting before the last
/// step, without reporting a failed step is itself an error.
fn verdict(spec: &TestSpec, succeeded: bool, stdout: &str, stderr: &str) -> E2eResult<Execution> {
    let execution = parse_output(spec, stdout)?;
    if !execution.passed() {
        return Ok(execution);
    }
    if !succeeded {
        return Err(E2eError::Playwright(format!(
            "script failed:\nstdout: {}\nstderr: {}",
            stdout, stderr
        )));
    }
    if execution.steps.len() < spec.steps.len() {
        return Err(E2eError::Playwright(format!(
            "script reported {} of {} steps",
            execution.steps.len(),
            spec.steps.len()
        )));
    }
    Ok(execution)
}

/// Line printed by the generated script after each step
#[derive(Debug, Deserialize)]
struct StepReport {
    step: usize,
    ok: bool,
    #[serde(default)]
    ms: u64,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    kind: Option<FailureKind>,
}

fn parse_output(spec: &TestSpec, stdout: &str) -> E2eResult<Execution> {
    let mut steps = Vec::new();
    for line in stdout.lines().filter(|l| l.starts_with('{')) {
        let report: StepReport = serde_json::from_str(line)
            .map_err(|e| E2eError::Playwright(format!("unreadable step report {:?}: {}", line, e)))?;
        let step = spec.steps.get(report.step).ok_or_else(|| {
            E2eError::Playwright(format!(
                "step report for index {} but the test has {} steps",
                report.step,
                spec.steps.len()
            ))
        })?;
        steps.push(StepResult {
            success: report.ok,
            step_name: step.name(),
            duration_ms: report.ms,
            error: report.error,
            kind: if report.ok {
                None
            } else {
                Some(report.kind.unwrap_or(FailureKind::Error))
            },
        });
    }
    Ok(Execution { steps })
}

/// Convert a step to the body of an async JS closure
fn step_to_js(step: &TestStep, expect_ms: u64) -> String {
    match step {
        TestStep::Navigate { url } => format!("await page.goto({});", js_string(url.trim())),
        TestStep::Fill { locator, value } => {
            format!("await {}.fill({});", locator_expr(locator), js_string(value))
        }
        TestStep::Click { locator } => format!("await {}.click();", locator_expr(locator)),
        TestStep::ExpectTitle { pattern } => format!(
            "await expect(page).toHaveTitle(new RegExp({}), {{ timeout: {} }});",
            js_string(pattern),
            expect_ms
        ),
        TestStep::ExpectUrl { pattern } => format!(
            "await expect(page).toHaveURL(new RegExp({}), {{ timeout: {} }});",
            js_string(pattern),
            expect_ms
        ),
        TestStep::ExpectText { locator, text } => format!(
            "await expect({}).toHaveText({}, {{ timeout: {} }});",
            locator_expr(locator),
            js_string(text),
            expect_ms
        ),
        TestStep::ExpectVisible { locator } => format!(
            "await expect({}).toBeVisible({{ timeout: {} }});",
            locator_expr(locator),
            expect_ms
        ),
        TestStep::Log { message } => format!("console.error('[TEST LOG] ' + {});", js_string(message)),
    }
}

/// Build the Playwright script for a whole test case
pub fn build_script(spec: &TestSpec, ctx: &AttemptContext, options: &PlaywrightOptions) -> String {
    let expect_ms = ctx.expect_timeout.as_millis() as u64;
    let nav_ms = ctx.navigation_timeout.as_millis() as u64;
    let trace = match &ctx.trace_path {
        Some(p) => js_string(&p.to_string_lossy()),
        None => "null".to_string(),
    };

    let mut script = format!(
        r#"const {{ chromium, firefox, webkit }} = require('playwright');
const {{ expect }} = require('@playwright/test');

const report = (r) => console.log(JSON.stringify(r));
const classify = (e) => {{
  const message = String((e && e.message) || e);
  if (/strict mode violation/i.test(message)) return 'mismatch';
  if (e && e.name === 'TimeoutError') return 'timeout';
  if (e && e.matcherResult) return e.matcherResult.actual === undefined ? 'timeout' : 'mismatch';
  return 'error';
}};

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    baseURL: {base_url},
    viewport: {{ width: {width}, height: {height} }}
  }});
  const tracePath = {trace};
  if (tracePath) await context.tracing.start({{ screenshots: true, snapshots: true }});
  const page = await context.newPage();
  page.setDefaultTimeout({expect_ms});
  page.setDefaultNavigationTimeout({nav_ms});

  // {name}
  const steps = [
"#,
        browser = options.browser.as_str(),
        headless = options.headless,
        base_url = js_string(&ctx.base_url),
        width = options.viewport_width,
        height = options.viewport_height,
        trace = trace,
        expect_ms = expect_ms,
        nav_ms = nav_ms,
        name = spec.name.replace('\n', " "),
    );

    for (i, step) in spec.steps.iter().enumerate() {
        script.push_str(&format!(
            "    // Step {}: {}\n    async () => {{ {} }},\n",
            i + 1,
            step.name().replace('\n', " "),
            step_to_js(step, expect_ms)
        ));
    }

    script.push_str(
        r#"  ];

  try {
    for (let i = 0; i < steps.length; i++) {
      const start = Date.now();
      try {
        await steps[i]();
        report({ step: i, ok: true, ms: Date.now() - start });
      } catch (e) {
        report({ step: i, ok: false, ms: Date.now() - start, error: String((e && e.message) || e), kind: classify(e) });
        break;
      }
    }
  } finally {
    if (tracePath) await context.tracing.stop({ path: tracePath });
    await browser.close();
  }
})().catch((e) => {
  console.error((e && e.stack) || String(e));
  process.exit(2);
});
"#,
    );

    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ctx() -> AttemptContext {
        AttemptContext {
            base_url: "http://localhost:3000".to_string(),
            navigation_timeout: Duration::from_secs(30),
            expect_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            trace_path: None,
        }
    }

    fn login_spec() -> TestSpec {
        TestSpec::from_yaml(
            r#"
name: "it's a login"
steps:
  - action: navigate
    url: /login
  - action: fill
    locator: { label: Email }
    value: "o'brien@example.com"
  - action: click
    locator: { role: button, name: Войти }
  - action: expect_text
    locator: { role: alert }
    text: Неверные учетные данные
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_script_uses_user_facing_locators() {
        let script = build_script(&login_spec(), &ctx(), &PlaywrightOptions::default());
        assert!(script.contains("await chromium.launch({ headless: true })"));
        assert!(script.contains("baseURL: 'http://localhost:3000'"));
        assert!(script.contains("await page.goto('/login');"));
        assert!(script.contains(r"await page.getByLabel('Email').fill('o\'brien@example.com');"));
        assert!(script.contains("page.getByRole('button', { name: 'Войти' }).click()"));
        assert!(script.contains(
            "await expect(page.getByRole('alert')).toHaveText('Неверные учетные данные', { timeout: 5000 });"
        ));
        assert!(script.contains("const tracePath = null;"));
    }

    #[test]
    fn test_script_records_trace_when_requested() {
        let mut ctx = ctx();
        ctx.trace_path = Some(PathBuf::from("/tmp/out/trace.zip"));
        let options = PlaywrightOptions {
            browser: Browser::Firefox,
            headless: false,
            ..PlaywrightOptions::default()
        };
        let script = build_script(&login_spec(), &ctx, &options);
        assert!(script.contains("const tracePath = '/tmp/out/trace.zip';"));
        assert!(script.contains("firefox.launch({ headless: false })"));
    }

    #[test]
    fn test_parse_output_maps_steps() {
        let spec = login_spec();
        let stdout = concat!(
            "{\"step\":0,\"ok\":true,\"ms\":12}\n",
            "noise from the browser\n",
            "{\"step\":1,\"ok\":true,\"ms\":3}\n",
            "{\"step\":2,\"ok\":false,\"ms\":5000,\"error\":\"Timeout 5000ms exceeded\",\"kind\":\"timeout\"}\n",
        );
        let exec = parse_output(&spec, stdout).unwrap();
        assert_eq!(exec.steps.len(), 3);
        assert_eq!(exec.steps[0].step_name, "navigate:/login");
        let failure = exec.first_failure().unwrap();
        assert_eq!(failure.kind, Some(FailureKind::Timeout));
        assert_eq!(failure.duration_ms, 5000);
    }

    #[test]
    fn test_missing_step_reports_fail_the_attempt() {
        let spec = login_spec();
        let err = verdict(&spec, true, "{\"step\":0,\"ok\":true}\n", "").unwrap_err();
        assert!(matches!(err, E2eError::Playwright(_)));
        assert!(err.to_string().contains("reported 1 of 4 steps"));
    }

    #[test]
    fn test_unreadable_report_line_is_an_error() {
        let spec = login_spec();
        let stdout = "{\"step\":0,\"ok\":true}\n{\"step\":1,\"ok\":tru\n";
        let err = verdict(&spec, true, stdout, "").unwrap_err();
        assert!(err.to_string().contains("unreadable step report"));
    }

    #[test]
    fn test_report_index_out_of_range_is_an_error() {
        let spec = login_spec();
        assert!(parse_output(&spec, "{\"step\":9,\"ok\":true}\n").is_err());
    }

    #[test]
    fn test_verdict_keeps_reported_failure() {
        let spec = login_spec();
        let stdout = "{\"step\":0,\"ok\":false,\"error\":\"net::ERR\"}\n";
        let exec = verdict(&spec, false, stdout, "").unwrap();
        assert!(!exec.passed());
        assert_eq!(exec.steps.len(), 1);
    }

    #[test]
    fn test_crash_without_reported_failure_is_an_error() {
        let spec = login_spec();
        let err = verdict(&spec, false, "", "Error: browser closed").unwrap_err();
        assert!(err.to_string().contains("browser closed"));
    }

    #[test]
    fn test_verdict_all_steps_passed() {
        let spec = login_spec();
        let stdout: String = (0..4).map(|i| format!("{{\"step\":{},\"ok\":true}}\n", i)).collect();
        assert!(verdict(&spec, true, &stdout, "").unwrap().passed());
    }

    #[test]
    fn test_browser_names() {
        assert_eq!(Browser::default().as_str(), "chromium");
        assert_eq!(serde_json::to_string(&Browser::Webkit).unwrap(), "\"webkit\"");
    }
}
