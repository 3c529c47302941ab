use std::sync::Arc;

use formcheck_common::login::{CredentialStore, LoginError};
use formcheck_e2e::http_driver::HttpDriver;
use formcheck_e2e::{
    FailureKind, RunFilter, RunnerConfig, TestRunner, TestSpec, TestStatus, TestStep,
    TestSuiteResult,
};
use formcheck_web::{WebServer, WebServerConfig};

async fn serve(app: WebServer) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(app.serve_listener(listener));
    base_url
}

fn bundled_config(output: &tempfile::TempDir) -> RunnerConfig {
    let mut config = RunnerConfig {
        test_dir: formcheck_e2e::bundled_specs_dir(),
        output_dir: output.path().to_path_buf(),
        workers: Some(4),
        ..RunnerConfig::default()
    };
    config.expect.timeout_ms = 300;
    config.expect.poll_interval_ms = 20;
    config
}

async fn run_login_suite(app: WebServer, output: &tempfile::TempDir) -> TestSuiteResult {
    let base_url = serve(app).await;
    let mut runner = TestRunner::with_driver(bundled_config(output), Arc::new(HttpDriver::new()))
        .with_base_url(base_url);
    runner.run_tagged("login").await.unwrap()
}

/// The bundled login suite passes against the demo app
#[tokio::test]
async fn login_suite_passes_against_demo_app() {
    let output = tempfile::tempdir().unwrap();
    let suite = run_login_suite(WebServer::default(), &output).await;

    for result in &suite.results {
        assert_eq!(
            result.status,
            TestStatus::Passed,
            "{} failed: {:?}",
            result.name,
            result.error
        );
    }
    assert_eq!(suite.total, 7);
    assert!(suite.success());
    assert_eq!(suite.results[0].name, "login smoke");
}

/// Every contract message is asserted by at least one bundled test
#[test]
fn login_suite_covers_every_rejection() {
    let specs = TestSpec::load_all(&formcheck_e2e::bundled_specs_dir()).unwrap();
    let asserted: Vec<&str> = specs
        .iter()
        .flat_map(|s| &s.steps)
        .filter_map(|step| match step {
            TestStep::ExpectText { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();

    for error in LoginError::ALL {
        assert!(asserted.contains(&error.message()), "no test asserts {:?}", error);
    }
}

/// An app that rejects the demo credential fails only the smoke test
#[tokio::test]
async fn broken_credentials_fail_only_the_smoke_test() {
    let output = tempfile::tempdir().unwrap();
    let app = WebServer::new(WebServerConfig {
        credentials: CredentialStore::new(),
        ..WebServerConfig::default()
    });
    let suite = run_login_suite(app, &output).await;

    assert!(!suite.success());
    assert_eq!(suite.failed, 1);
    assert_eq!(suite.passed, 6);

    let smoke = &suite.results[0];
    assert_eq!(smoke.name, "login smoke");
    assert_eq!(smoke.status, TestStatus::Failed);
    assert_eq!(smoke.kind, Some(FailureKind::Mismatch));
    let error = smoke.error.as_deref().unwrap();
    assert!(error.starts_with("expect_url"), "unexpected error: {}", error);
    assert!(error.contains("login"), "unexpected error: {}", error);
}

/// The smoke spec alone checks the landing page title
#[tokio::test]
async fn landing_smoke_passes() {
    let output = tempfile::tempdir().unwrap();
    let base_url = serve(WebServer::default()).await;
    let mut runner = TestRunner::with_driver(bundled_config(&output), Arc::new(HttpDriver::new()))
        .with_base_url(base_url);

    let suite = runner
        .run_filtered(&RunFilter {
            tag: Some("smoke".to_string()),
            name: None,
        })
        .await
        .unwrap();

    assert!(suite.success());
    assert!(suite.results.iter().any(|r| r.file.as_deref() == Some("example.yaml")));

    let path = runner.write_results(&suite).unwrap();
    let written: TestSuiteResult =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(written.total, suite.total);
}
