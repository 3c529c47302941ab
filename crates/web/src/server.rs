//! Web server implementation

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Form, OriginalUri, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use formcheck_common::login::{self, CredentialStore, LoginForm, DASHBOARD_PATH};

use crate::pages;

/// Web server configuration
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    /// Credential pairs accepted by the login form
    pub credentials: CredentialStore,

    /// Site name used in page titles
    pub title: String,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            credentials: CredentialStore::demo(),
            title: "Formcheck Demo".to_string(),
        }
    }
}

/// Web server state
#[derive(Clone)]
pub struct WebServer {
    state: Arc<WebServerState>,
}

struct WebServerState {
    cfg: WebServerConfig,
}

pub async fn serve(addr: SocketAddr, cfg: WebServerConfig) -> anyhow::Result<()> {
    let server = WebServer::new(cfg);
    server.serve(addr).await
}

impl WebServer {
    /// Create a new web server
    pub fn new(cfg: WebServerConfig) -> Self {
        Self {
            state: Arc::new(WebServerState { cfg }),
        }
    }

    /// Create router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(landing_handler))
            .route("/login", get(login_page_handler).post(login_submit_handler))
            .route("/login.html", get(login_page_handler).post(login_submit_handler))
            .route(DASHBOARD_PATH, get(dashboard_handler))
            .route("/health", get(health_handler))
            .fallback(not_found_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the web server
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        self.serve_listener(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve_listener(self, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
        info!("Demo app listening on http://{}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

impl Default for WebServer {
    fn default() -> Self {
        Self::new(WebServerConfig::default())
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "formcheck-web"
    }))
}

async fn landing_handler(State(state): State<Arc<WebServerState>>) -> Html<String> {
    Html(pages::landing(&state.cfg.title))
}

async fn login_page_handler(
    State(state): State<Arc<WebServerState>>,
    OriginalUri(uri): OriginalUri,
) -> Html<String> {
    Html(pages::login(&state.cfg.title, uri.path(), None))
}

async fn login_submit_handler(
    State(state): State<Arc<WebServerState>>,
    OriginalUri(uri): OriginalUri,
    Form(form): Form<LoginForm>,
) -> Response {
    match login::validate(&form, &state.cfg.credentials) {
        Ok(()) => {
            info!("Login accepted");
            Redirect::to(DASHBOARD_PATH).into_response()
        }
        Err(e) => {
            debug!("Login rejected: {:?}", e);
            Html(pages::login(&state.cfg.title, uri.path(), Some(e))).into_response()
        }
    }
}

async fn dashboard_handler(State(state): State<Arc<WebServerState>>) -> Html<String> {
    Html(pages::dashboard(&state.cfg.title))
}

async fn not_found_handler(State(state): State<Arc<WebServerState>>) -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html(pages::not_found(&state.cfg.title)))
}
