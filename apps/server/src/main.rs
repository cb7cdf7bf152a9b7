//! repodocs HTTP server — generation trigger plus live progress streaming.

mod api;

use std::sync::Arc;

use color_eyre::eyre::{Result, WrapErr};
use tracing::info;
use tracing_subscriber::EnvFilter;

use repodocs_core::DocsService;
use repodocs_shared::load_config;
use repodocs_synth::GeminiClient;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("repodocs=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = load_config()?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let completion = Arc::new(GeminiClient::from_config(&config.completion)?);
    let service = Arc::new(DocsService::new(config, completion));

    let app = api::router(api::AppState { service });

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("failed to bind {addr}"))?;
    info!(%addr, "repodocs server listening");

    axum::serve(listener, app).await.wrap_err("server error")?;

    Ok(())
}
