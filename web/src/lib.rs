//! datasift web shell
//!
//! Serves the input form, runs submissions through the ingestion pipeline and
//! serves the resulting artifacts.
//!
//! # Routes
//!
//! ```text
//! GET  /                         input form (file field `file`, text field `url`)
//! POST /                         run a submission, 303 to the report on success
//! GET  /report                   report of the most recent run
//! GET  /download                 cleaned CSV of the most recent run
//! GET  /runs/{run_id}/report     report of a specific run
//! GET  /runs/{run_id}/download   cleaned CSV of a specific run
//! GET  /health                   { "ok": true, "service": "datasift-web" }
//! ```
//!
//! The pipeline is synchronous; each submission runs on a
//! `tokio::task::spawn_blocking` worker so the server keeps answering other
//! requests meanwhile.

pub mod config;
mod handlers;
mod pages;
pub mod state;

pub use config::{ConfigError, ServerConfig};
pub use state::{AppState, RunRecord};

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use datasift_processing::{Pipeline, PipelineResult};
use std::sync::Arc;
use tracing::{debug, error, info};

pub const SERVICE_NAME: &str = "datasift-web";

/// Build the router over `state`.
pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes();
    Router::new()
        .route("/", get(handlers::index).post(handlers::submit))
        .route("/report", get(handlers::latest_report))
        .route("/download", get(handlers::latest_download))
        .route("/runs/{run_id}/report", get(handlers::run_report))
        .route("/runs/{run_id}/download", get(handlers::run_download))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Build the pipeline described by `config`, logging its progress.
pub fn build_pipeline(config: &ServerConfig) -> PipelineResult<Pipeline> {
    Pipeline::builder()
        .config(config.pipeline.clone())
        .on_progress(|update| {
            debug!(
                "[{:>3.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        })
        .build()
}

/// Bind the configured address and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: &ServerConfig, pipeline: Arc<Pipeline>) -> anyhow::Result<()> {
    let app = router(AppState::new(pipeline, config.max_upload_bytes));

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("[{}] listening on http://{}", SERVICE_NAME, addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("[{}] shut down", SERVICE_NAME);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
