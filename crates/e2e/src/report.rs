//! Report outputs: console list, HTML folder and JSON file

use std::fmt::Write as _;
use std::path::PathBuf;

use tracing::info;

use crate::config::{ReporterConfig, RunnerConfig};
use crate::error::E2eResult;
use crate::runner::{TestResult, TestStatus, TestSuiteResult};

/// Something that turns a finished run into an output
pub trait Reporter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Emit the report, returning the written file if there is one
    fn report(&self, suite: &TestSuiteResult) -> E2eResult<Option<PathBuf>>;
}

/// Build the reporters listed in `config`, paths resolved
pub fn from_config(config: &RunnerConfig) -> Vec<Box<dyn Reporter>> {
    config
        .reporters
        .iter()
        .map(|r| -> Box<dyn Reporter> {
            match r {
                ReporterConfig::List => Box::new(ListReporter),
                ReporterConfig::Html { output_folder } => Box::new(HtmlReporter {
                    output_folder: config.resolve_path(output_folder),
                }),
                ReporterConfig::Json { output_file } => Box::new(JsonReporter {
                    output_file: output_file
                        .as_ref()
                        .map(|f| config.resolve_path(f))
                        .unwrap_or_else(|| config.output_dir().join("test-results.json")),
                }),
            }
        })
        .collect()
}

/// Run every reporter, collecting written files
pub fn emit(reporters: &[Box<dyn Reporter>], suite: &TestSuiteResult) -> E2eResult<Vec<PathBuf>> {
    let mut written = Vec::new();
    for reporter in reporters {
        if let Some(path) = reporter.report(suite)? {
            info!("{} report written to: {}", reporter.name(), path.display());
            written.push(path);
        }
    }
    Ok(written)
}

fn symbol(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Passed => "✓",
        TestStatus::Flaky => "±",
        TestStatus::Failed => "✘",
        TestStatus::TimedOut => "⏱",
    }
}

/// One line per test, then a summary
pub struct ListReporter;

impl ListReporter {
    fn line(index: usize, result: &TestResult) -> String {
        let location = result
            .file
            .as_deref()
            .map(|f| format!("{} › ", f))
            .unwrap_or_default();
        let mut line = format!(
            "  {} {:>3} {}{} ({} ms)",
            symbol(result.status),
            index + 1,
            location,
            result.name,
            result.duration_ms
        );
        if result.attempts > 1 {
            let _ = write!(line, " [{} attempts]", result.attempts);
        }
        if let Some(error) = &result.error {
            let _ = write!(line, "\n        {}", error);
        }
        line
    }

    pub fn render(suite: &TestSuiteResult) -> String {
        let mut out = format!(
            "\nRan {} test(s) against {} at {}\n\n",
            suite.total,
            suite.base_url,
            suite.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        for (i, result) in suite.results.iter().enumerate() {
            out.push_str(&Self::line(i, result));
            out.push('\n');
        }
        let _ = write!(
            out,
            "\n  {} passed, {} failed, {} flaky, {} timed out ({} ms)\n",
            suite.passed, suite.failed, suite.flaky, suite.timed_out, suite.duration_ms
        );
        out
    }
}

impl Reporter for ListReporter {
    fn name(&self) -> &'static str {
        "list"
    }

    fn report(&self, suite: &TestSuiteResult) -> E2eResult<Option<PathBuf>> {
        print!("{}", Self::render(suite));
        Ok(None)
    }
}

/// Self-contained `index.html`; never opened automatically
pub struct HtmlReporter {
    pub output_folder: PathBuf,
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl HtmlReporter {
    pub fn render(suite: &TestSuiteResult) -> String {
        let mut rows = String::new();
        for result in &suite.results {
            let steps: String = result
                .steps
                .iter()
                .map(|s| {
                    format!(
                        "<li class=\"{}\">{} ({} ms){}</li>",
                        if s.success { "ok" } else { "bad" },
                        escape(&s.step_name),
                        s.duration_ms,
                        s.error
                            .as_deref()
                            .map(|e| format!(": {}", escape(e)))
                            .unwrap_or_default()
                    )
                })
                .collect();
            let _ = write!(
                rows,
                r#"<tr class="{status}"><td>{symbol} {status}</td><td>{name}</td><td>{file}</td><td>{attempts}</td><td>{ms}</td><td><ul>{steps}</ul>{error}{trace}</td></tr>
"#,
                status = result.status.as_str(),
                symbol = symbol(result.status),
                name = escape(&result.name),
                file = escape(result.file.as_deref().unwrap_or("")),
                attempts = result.attempts,
                ms = result.duration_ms,
                steps = steps,
                error = result
                    .error
                    .as_deref()
                    .map(|e| format!("<pre>{}</pre>", escape(e)))
                    .unwrap_or_default(),
                trace = result
                    .trace_path
                    .as_ref()
                    .map(|p| format!("<p>trace: <code>{}</code></p>", escape(&p.to_string_lossy())))
                    .unwrap_or_default(),
            );
        }

        REPORT_HTML
            .replace("{{BASE_URL}}", &escape(&suite.base_url))
            .replace("{{STARTED}}", &suite.started_at.to_rfc3339())
            .replace(
                "{{SUMMARY}}",
                &format!(
                    "{} passed, {} failed, {} flaky, {} timed out, {} total ({} ms)",
                    suite.passed, suite.failed, suite.flaky, suite.timed_out, suite.total, suite.duration_ms
                ),
            )
            .replace("{{ROWS}}", &rows)
    }
}

impl Reporter for HtmlReporter {
    fn name(&self) -> &'static str {
        "html"
    }

    fn report(&self, suite: &TestSuiteResult) -> E2eResult<Option<PathBuf>> {
        std::fs::create_dir_all(&self.output_folder)?;
        let path = self.output_folder.join("index.html");
        std::fs::write(&path, Self::render(suite))?;
        Ok(Some(path))
    }
}

/// Machine-readable results
pub struct JsonReporter {
    pub output_file: PathBuf,
}

impl Reporter for JsonReporter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn report(&self, suite: &TestSuiteResult) -> E2eResult<Option<PathBuf>> {
        if let Some(parent) = self.output_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.output_file, serde_json::to_string_pretty(suite)?)?;
        Ok(Some(self.output_file.clone()))
    }
}

const REPORT_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Formcheck Report</title>
    <style>
        body { font-family: system-ui, sans-serif; margin: 2rem; }
        table { border-collapse: collapse; width: 100%; }
        td, th { border-bottom: 1px solid #ddd; padding: 0.4rem; vertical-align: top; text-align: left; }
        tr.passed td:first-child { color: #1a7f37; }
        tr.flaky td:first-child { color: #9a6700; }
        tr.failed td:first-child, tr.timed_out td:first-child { color: #cf222e; }
        li.bad { color: #cf222e; }
        pre { white-space: pre-wrap; }
    </style>
</head>
<body>
    <h1>Formcheck Report</h1>
    <p>Base URL: <code>{{BASE_URL}}</code>, started {{STARTED}}</p>
    <p>{{SUMMARY}}</p>
    <table>
        <thead><tr><th>Status</th><th>Test</th><th>File</th><th>Attempts</th><th>ms</th><th>Details</th></tr></thead>
        <tbody>
{{ROWS}}        </tbody>
    </table>
</body>
</html>
"#;
