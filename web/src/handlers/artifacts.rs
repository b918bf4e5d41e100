//! Serving the artifacts of completed runs.

use crate::pages::message_page;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use datasift_processing::artifacts::CSV_FILE_NAME;
use datasift_processing::{ArtifactPaths, RunId};
use std::io::ErrorKind;
use std::path::Path as FsPath;
use tracing::error;

/// Report of the most recently completed run.
pub async fn latest_report(State(state): State<AppState>) -> Response {
    match state.latest_run() {
        Some(run) => serve_report(&run.artifacts.report).await,
        None => not_found("No report has been generated yet."),
    }
}

/// Cleaned CSV of the most recently completed run.
pub async fn latest_download(State(state): State<AppState>) -> Response {
    match state.latest_run() {
        Some(run) => serve_csv(&run.artifacts.csv).await,
        None => not_found("No cleaned CSV has been generated yet."),
    }
}

pub async fn run_report(State(state): State<AppState>, Path(run_id): Path<String>) -> Response {
    match run_artifacts(&state, &run_id) {
        Some(paths) => serve_report(&paths.report).await,
        None => not_found("Unknown run."),
    }
}

pub async fn run_download(State(state): State<AppState>, Path(run_id): Path<String>) -> Response {
    match run_artifacts(&state, &run_id) {
        Some(paths) => serve_csv(&paths.csv).await,
        None => not_found("Unknown run."),
    }
}

fn run_artifacts(state: &AppState, run_id: &str) -> Option<ArtifactPaths> {
    RunId::parse(run_id).and_then(|id| state.artifacts_for(&id))
}

async fn serve_report(path: &FsPath) -> Response {
    match tokio::fs::read_to_string(path).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => read_failure(path, e),
    }
}

async fn serve_csv(path: &FsPath) -> Response {
    match tokio::fs::read(path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", CSV_FILE_NAME),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => read_failure(path, e),
    }
}

fn read_failure(path: &FsPath, e: std::io::Error) -> Response {
    if e.kind() == ErrorKind::NotFound {
        return not_found("The requested artifact does not exist.");
    }
    error!("Failed to read {}: {}", path.display(), e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(message_page(
            "Server Error",
            "The artifact could not be read.",
        )),
    )
        .into_response()
}

fn not_found(message: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Html(message_page("Not Found", message)),
    )
        .into_response()
}
