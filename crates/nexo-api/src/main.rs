//! # nexo-api: Binary Entry Point
//!
//! Loads [`ServerConfig`](nexo_api::config::ServerConfig), assembles the log,
//! and serves the HTTP API.

use anyhow::Context;
use nexo_api::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::load().context("loading configuration")?;
    let state = nexo_api::bootstrap::bootstrap(&config).map_err(|e| {
        tracing::error!("Bootstrap failed: {e}");
        e
    })?;

    let app = nexo_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("NEXO API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
