//! In-process HTTP driver
//!
//! Each test gets its own [`reqwest::Client`] with a private cookie jar.
//! Pages are fetched as static HTML; fills are kept per form and merged
//! into the form's default values when a submit button is clicked, the
//! way a browser builds a submission without scripts. Requests carry no
//! timeout of their own; the runner's per-test timeout bounds them.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};
use url::Url;

use crate::dom::{self, ClickAction, Document, FormSubmission};
use crate::driver::{poll_until, AttemptContext, Driver, Execution, Probe, StepResult, TraceEvent};
use crate::error::{E2eError, E2eResult};
use crate::spec::{Locator, TestSpec, TestStep};

/// Driver that talks HTTP directly and interprets the returned HTML
#[derive(Debug, Clone, Default)]
pub struct HttpDriver;

impl HttpDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for HttpDriver {
    fn name(&self) -> &'static str {
        "http"
    }

    fn trace_extension(&self) -> &'static str {
        "json"
    }

    async fn execute(&self, spec: &TestSpec, ctx: &AttemptContext) -> E2eResult<Execution> {
        let mut session = HttpSession::new(ctx)?;
        let mut execution = Execution::default();

        for step in &spec.steps {
            let name = step.name();
            let start = Instant::now();
            session.trace("step", &name);

            match session.run_step(step).await {
                Ok(()) => execution.steps.push(StepResult::passed(name, start.elapsed())),
                Err(e) => {
                    debug!("{}: step {} failed: {}", spec.name, name, e);
                    session.trace("error", &e.to_string());
                    execution.steps.push(StepResult::failed(name, start.elapsed(), &e));
                    break;
                }
            }
        }

        if let Some(path) = &ctx.trace_path {
            session.write_trace(path, spec)?;
        }
        Ok(execution)
    }
}

/// The currently loaded document
struct Page {
    url: Url,
    status: u16,
    body: String,
}

struct HttpSession {
    client: reqwest::Client,
    base: Url,
    page: Option<Page>,
    /// Typed values keyed by (owning form index, control name)
    filled: HashMap<(Option<usize>, String), String>,
    ctx: AttemptContext,
    started: Instant,
    events: Vec<TraceEvent>,
}

impl HttpSession {
    fn new(ctx: &AttemptContext) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(concat!("formcheck/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base: Url::parse(&ctx.base_url)?,
            page: None,
            filled: HashMap::new(),
            ctx: ctx.clone(),
            started: Instant::now(),
            events: Vec::new(),
        })
    }

    fn trace(&mut self, event: &str, detail: &str) {
        self.events.push(TraceEvent {
            at_ms: self.started.elapsed().as_millis() as u64,
            event: event.to_string(),
            detail: detail.to_string(),
        });
    }

    fn page(&self) -> E2eResult<&Page> {
        self.page.as_ref().ok_or(E2eError::NoPage)
    }

    async fn run_step(&mut self, step: &TestStep) -> E2eResult<()> {
        match step {
            TestStep::Navigate { url } => {
                let target = self.base.join(url.trim())?;
                let request = self.client.get(target.clone());
                self.load(request, "GET", &target).await
            }
            TestStep::Fill { locator, value } => self.fill(locator, value).await,
            TestStep::Click { locator } => self.click(locator).await,
            TestStep::ExpectTitle { pattern } => {
                let re = Regex::new(pattern)?;
                let body = &self.page()?.body;
                poll_until(self.ctx.expect_timeout, self.ctx.poll_interval, || {
                    let title = Document::parse(body).title();
                    Ok(if re.is_match(&title) {
                        Probe::Ready(())
                    } else {
                        Probe::Mismatch {
                            what: "page title".to_string(),
                            expected: format!("/{}/", pattern),
                            actual: title,
                        }
                    })
                })
                .await
            }
            TestStep::ExpectUrl { pattern } => {
                let re = Regex::new(pattern)?;
                let url = self.page()?.url.as_str();
                poll_until(self.ctx.expect_timeout, self.ctx.poll_interval, || {
                    Ok(if re.is_match(url) {
                        Probe::Ready(())
                    } else {
                        Probe::Mismatch {
                            what: "page URL".to_string(),
                            expected: format!("/{}/", pattern),
                            actual: url.to_string(),
                        }
                    })
                })
                .await
            }
            TestStep::ExpectText { locator, text } => {
                let expected = dom::normalize_ws(text);
                let body = &self.page()?.body;
                poll_until(self.ctx.expect_timeout, self.ctx.poll_interval, || {
                    let doc = Document::parse(body);
                    Ok(match doc.query_one(locator)? {
                        None => Probe::Missing(locator.to_string()),
                        Some(el) => {
                            let actual = dom::element_text(&el);
                            if actual == expected {
                                Probe::Ready(())
                            } else {
                                Probe::Mismatch {
                                    what: format!("text of {}", locator),
                                    expected: expected.clone(),
                                    actual,
                                }
                            }
                        }
                    })
                })
                .await
            }
            TestStep::ExpectVisible { locator } => {
                let body = &self.page()?.body;
                poll_until(self.ctx.expect_timeout, self.ctx.poll_interval, || {
                    let doc = Document::parse(body);
                    Ok(match doc.query_one(locator)? {
                        None => Probe::Missing(locator.to_string()),
                        Some(el) if dom::is_visible(&el) => Probe::Ready(()),
                        Some(_) => Probe::Mismatch {
                            what: format!("visibility of {}", locator),
                            expected: "visible".to_string(),
                            actual: "hidden".to_string(),
                        },
                    })
                })
                .await
            }
            TestStep::Log { message } => {
                info!("[TEST LOG] {}", message);
                Ok(())
            }
        }
    }

    /// Send `request` and make the final response the current page
    async fn load(&mut self, request: reqwest::RequestBuilder, method: &str, target: &Url) -> E2eResult<()> {
        self.trace("request", &format!("{} {}", method, target));
        let response = request.send().await?;
        let status = response.status().as_u16();
        let url = response.url().clone();
        let body = response.text().await?;
        self.trace("response", &format!("{} {}", status, url));
        debug!("{} {} -> {} {}", method, target, status, url);

        self.page = Some(Page { url, status, body });
        self.filled.clear();
        Ok(())
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        let body = &self.page()?.body;
        let key = poll_until(self.ctx.expect_timeout, self.ctx.poll_interval, || {
            let doc = Document::parse(body);
            let el = match doc.query_one(locator)? {
                None => return Ok(Probe::Missing(locator.to_string())),
                Some(el) if !dom::is_visible(&el) => {
                    return Ok(Probe::Missing(format!("{} to be visible", locator)))
                }
                Some(el) => el,
            };
            if !dom::is_fillable(&el) {
                return Err(E2eError::Unsupported {
                    locator: locator.to_string(),
                    action: "fill".to_string(),
                });
            }
            let name = el.value().attr("name").ok_or_else(|| E2eError::Unsupported {
                locator: locator.to_string(),
                action: "fill without a name attribute".to_string(),
            })?;
            Ok(Probe::Ready((doc.form_index(&el), name.to_string())))
        })
        .await?;

        self.trace("fill", &key.1);
        self.filled.insert(key, value.to_string());
        Ok(())
    }

    async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        let body = &self.page()?.body;
        let action = poll_until(self.ctx.expect_timeout, self.ctx.poll_interval, || {
            let doc = Document::parse(body);
            Ok(match doc.query_one(locator)? {
                None => Probe::Missing(locator.to_string()),
                Some(el) if !dom::is_visible(&el) => Probe::Missing(format!("{} to be visible", locator)),
                Some(el) => Probe::Ready(doc.click_action(&el)),
            })
        })
        .await?;

        match action {
            ClickAction::Follow(href) if href.starts_with('#') || href.starts_with("javascript:") => {
                self.trace("click", "in-page link");
                Ok(())
            }
            ClickAction::Follow(href) => {
                let target = self.page()?.url.join(&href)?;
                let request = self.client.get(target.clone());
                self.load(request, "GET", &target).await
            }
            ClickAction::Submit(submission) => self.submit(submission).await,
            ClickAction::None => {
                self.trace("click", "no default action");
                Ok(())
            }
        }
    }

    async fn submit(&mut self, submission: FormSubmission) -> E2eResult<()> {
        let page_url = &self.page()?.url;
        let mut target = match submission.action.trim() {
            "" => page_url.clone(),
            action => page_url.join(action)?,
        };
        target.set_fragment(None);

        let form = Some(submission.form_index);
        let fields: Vec<(String, String)> = submission
            .fields
            .into_iter()
            .map(|(name, default)| {
                let value = self
                    .filled
                    .get(&(form, name.clone()))
                    .cloned()
                    .unwrap_or(default);
                (name, value)
            })
            .collect();

        if submission.method == "post" {
            let request = self.client.post(target.clone()).form(&fields);
            self.load(request, "POST", &target).await
        } else {
            target.query_pairs_mut().clear().extend_pairs(fields.iter());
            let request = self.client.get(target.clone());
            self.load(request, "GET", &target).await
        }
    }

    fn write_trace(&self, path: &Path, spec: &TestSpec) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let trace = serde_json::json!({
            "test": spec.name,
            "driver": "http",
            "final_url": self.page.as_ref().map(|p| p.url.to_string()),
            "final_status": self.page.as_ref().map(|p| p.status),
            "events": self.events,
        });
        std::fs::write(path, serde_json::to_string_pretty(&trace)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::extract::Query;
    use axum::response::Html;
    use axum::routing::get;
    use axum::Router;
    use formcheck_web::WebServer;

    use crate::error::FailureKind;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn ctx(base_url: String) -> AttemptContext {
        AttemptContext {
            base_url,
            navigation_timeout: Duration::from_secs(5),
            expect_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(20),
            trace_path: None,
        }
    }

    fn spec(yaml: &str) -> TestSpec {
        TestSpec::from_yaml(yaml).unwrap()
    }

    #[tokio::test]
    async fn test_happy_path_against_demo_app() {
        let base = serve(WebServer::default().router()).await;
        let spec = spec(
            r#"
name: happy
steps:
  - action: navigate
    url: /login
  - action: fill
    locator: { label: Email }
    value: user@example.com
  - action: fill
    locator: { label: Пароль }
    value: Passw0rd!
  - action: click
    locator: { role: button, name: Войти }
  - action: expect_url
    pattern: 'dashboard\.html$'
  - action: expect_visible
    locator: { text: Добро пожаловать }
"#,
        );
        let exec = HttpDriver::new().execute(&spec, &ctx(base)).await.unwrap();
        assert!(exec.passed(), "{:?}", exec.first_failure());
        assert_eq!(exec.steps.len(), 6);
    }

    #[tokio::test]
    async fn test_wrong_alert_text_is_mismatch() {
        let base = serve(WebServer::default().router()).await;
        let spec = spec(
            r#"
name: wrong-text
steps:
  - action: navigate
    url: /login
  - action: click
    locator: { role: button, name: Войти }
  - action: expect_text
    locator: { role: alert }
    text: Пароль обязателен
  - action: log
    message: never reached
"#,
        );
        let exec = HttpDriver::new().execute(&spec, &ctx(base)).await.unwrap();
        let failure = exec.first_failure().unwrap();
        assert_eq!(failure.kind, Some(FailureKind::Mismatch));
        assert!(failure.error.as_deref().unwrap().contains("Email обязателен"));
        assert_eq!(exec.steps.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_element_times_out() {
        let base = serve(WebServer::default().router()).await;
        let spec = spec(
            r#"
name: no-alert
steps:
  - action: navigate
    url: /login
  - action: expect_visible
    locator: { role: alert }
"#,
        );
        let exec = HttpDriver::new().execute(&spec, &ctx(base)).await.unwrap();
        assert_eq!(exec.first_failure().unwrap().kind, Some(FailureKind::Timeout));
    }

    #[tokio::test]
    async fn test_get_form_and_link() {
        async fn search(Query(q): Query<HashMap<String, String>>) -> Html<String> {
            Html(format!(
                "<html><head><title>Results</title></head><body><p id=\"q\">{}</p><a href=\"/\">Home</a></body></html>",
                q.get("q").cloned().unwrap_or_default()
            ))
        }
        let router = Router::new()
            .route(
                "/",
                get(|| async {
                    Html(
                        r#"<html><head><title>Search</title></head><body>
<form action="/search"><input aria-label="Query" name="q" value="default"><input type="submit" value="Go"></form>
</body></html>"#,
                    )
                }),
            )
            .route("/search", get(search));
        let base = serve(router).await;
        let spec = spec(
            r##"
name: search
steps:
  - action: navigate
    url: /
  - action: fill
    locator: { label: query }
    value: rust lang
  - action: click
    locator: { role: button, name: Go }
  - action: expect_url
    pattern: 'search\?q=rust\+lang$'
  - action: expect_text
    locator: { css: "#q" }
    text: rust lang
  - action: click
    locator: { role: link, name: Home }
  - action: expect_title
    pattern: '^Search$'
"##,
        );
        let exec = HttpDriver::new().execute(&spec, &ctx(base)).await.unwrap();
        assert!(exec.passed(), "{:?}", exec.first_failure());
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_cookies_or_fills() {
        let base = serve(WebServer::default().router()).await;
        let fill_only = spec(
            r#"
name: fill-only
steps:
  - action: navigate
    url: /login
  - action: fill
    locator: { label: Email }
    value: user@example.com
"#,
        );
        let submit_only = spec(
            r#"
name: submit-only
steps:
  - action: navigate
    url: /login
  - action: click
    locator: { role: button, name: Войти }
  - action: expect_text
    locator: { role: alert }
    text: Email обязателен
"#,
        );
        let driver = HttpDriver::new();
        assert!(driver.execute(&fill_only, &ctx(base.clone())).await.unwrap().passed());
        assert!(driver.execute(&submit_only, &ctx(base)).await.unwrap().passed());
    }

    #[tokio::test]
    async fn test_writes_json_trace() {
        let base = serve(WebServer::default().router()).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traces/t.json");
        let mut ctx = ctx(base);
        ctx.trace_path = Some(path.clone());

        let spec = spec("name: t\nsteps:\n  - action: navigate\n    url: /\n");
        HttpDriver::new().execute(&spec, &ctx).await.unwrap();

        let trace: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(trace["test"], "t");
        assert_eq!(trace["final_status"], 200);
        let events = trace["events"].as_array().unwrap();
        assert!(events.iter().any(|e| e["event"] == "request"));
    }

    #[tokio::test]
    async fn test_click_before_navigate_fails() {
        let spec = spec(
            "name: t\nsteps:\n  - action: click\n    locator: { text: x }\n",
        );
        let exec = HttpDriver::new()
            .execute(&spec, &ctx("http://127.0.0.1:9".to_string()))
            .await
            .unwrap();
        assert_eq!(exec.first_failure().unwrap().kind, Some(FailureKind::Error));
    }
}
