use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use haul_core::{PacedEngine, ServiceConfig, SharedEngine};
use haul_engine::YtDlpEngine;
use haul_server::routes;
use haul_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("haul=info".parse()?))
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env()?;
    let port = std::env::var("HAUL_SERVER_PORT").unwrap_or_else(|_| "8888".to_string());
    let addr = format!("0.0.0.0:{port}");
    let admin_token = std::env::var("HAUL_ADMIN_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty());
    if admin_token.is_none() {
        tracing::warn!("HAUL_ADMIN_TOKEN not set, credential upload and cleanup endpoints are disabled");
    }

    let ytdlp = YtDlpEngine::new(&config.ytdlp_path);
    match ytdlp.version().await {
        Ok(version) => tracing::info!(%version, "Using yt-dlp"),
        Err(e) => tracing::warn!(error = %e, "yt-dlp is not usable, downloads will fail"),
    }
    let engine = match config.pacing_config() {
        Some(pacing) => SharedEngine::new(PacedEngine::new(ytdlp, pacing)),
        None => SharedEngine::new(ytdlp),
    };

    let state = Arc::new(AppState::from_config(&config, engine, admin_token).await?);

    let cancel = CancellationToken::new();
    let sweeper = {
        let state = state.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { state.run_sweeper(cancel).await })
    };

    let app = routes::router(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!(
        downloads_dir = %config.downloads_dir.display(),
        retention_hours = config.retention.window.num_hours(),
        "Starting server on {addr}"
    );
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    let _ = sweeper.await;
    tracing::info!(in_flight = state.orchestrator.in_flight(), "Waiting for running downloads");
    state.orchestrator.drain().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
