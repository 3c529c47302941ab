use std::net::SocketAddr;

use tracing::info;

use formcheck_web::server::WebServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let host = std::env::var("FORMCHECK_WEB_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = match std::env::var("FORMCHECK_WEB_PORT") {
        Ok(v) => v
            .parse()
            .map_err(|_| anyhow::anyhow!("FORMCHECK_WEB_PORT must be a port number, got {:?}", v))?,
        Err(_) => formcheck_common::DEFAULT_WEB_PORT,
    };
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    let cfg = WebServerConfig::default();

    info!(
        "Starting formcheck demo on http://{} ({} known credential(s))",
        addr,
        cfg.credentials.len()
    );

    formcheck_web::serve(addr, cfg).await
}
