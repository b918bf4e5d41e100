//! The input form and its submission.
//!
//! A submission runs the whole pipeline on a blocking worker thread. The
//! response is one of:
//! - `303 See Other` to the run's report when both artifacts were written
//! - the untouched form when neither a `.csv` file nor a URL was supplied
//! - the form with the error code and message when the run failed

use crate::pages::{FormError, form_page};
use crate::state::{AppState, RunRecord};
use axum::extract::multipart::{Multipart, MultipartError};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use datasift_processing::{FormSubmission, PipelineError, RunId, RunOutcome, UploadedFile};
use tracing::{debug, error, info, warn};

pub async fn index(State(state): State<AppState>) -> Response {
    form_response(&state, StatusCode::OK, None)
}

pub async fn submit(State(state): State<AppState>, multipart: Multipart) -> Response {
    let submission = match read_submission(multipart).await {
        Ok(submission) => submission,
        Err(e) => {
            warn!("Rejected form submission: {}", e);
            let error = FormError {
                code: "INVALID_FORM".to_string(),
                message: e.body_text(),
            };
            return form_response(&state, e.status(), Some(error));
        }
    };

    let pipeline = state.pipeline().clone();
    let outcome = tokio::task::spawn_blocking(move || pipeline.run(submission))
        .await
        .unwrap_or_else(|e| Err(PipelineError::Internal(format!("Task join error: {}", e))));

    match outcome {
        Ok(RunOutcome::Completed(result)) => {
            info!(
                "Run {} complete: {} -> {} rows from {}",
                result.run_id, result.rows_loaded, result.cleaning.rows_after, result.source
            );
            let location = report_location(&state, &result.run_id);
            state.record_run(RunRecord::from(&result));
            Redirect::to(&location).into_response()
        }
        Ok(RunOutcome::NoData) => {
            debug!("Submission carried no CSV file and no URL");
            form_response(&state, StatusCode::OK, None)
        }
        Err(e) => {
            let status = if e.is_input_error() {
                StatusCode::BAD_REQUEST
            } else {
                error!("Run failed [{}]: {}", e.error_code(), e);
                StatusCode::INTERNAL_SERVER_ERROR
            };
            let error = FormError {
                code: e.error_code().to_string(),
                message: e.to_string(),
            };
            form_response(&state, status, Some(error))
        }
    }
}

/// Collect the `file` and `url` fields. Other fields are ignored.
async fn read_submission(mut multipart: Multipart) -> Result<FormSubmission, MultipartError> {
    let mut submission = FormSubmission::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_owned();
                let bytes = field.bytes().await?;
                // Browsers send an empty, nameless part when no file was chosen.
                if !filename.is_empty() {
                    submission.file = Some(UploadedFile {
                        filename,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            Some("url") => submission.url = Some(field.text().await?),
            _ => {}
        }
    }

    Ok(submission)
}

fn report_location(state: &AppState, run_id: &RunId) -> String {
    if state.pipeline().layout().namespaced {
        format!("/runs/{}/report", run_id)
    } else {
        "/report".to_string()
    }
}

fn form_response(state: &AppState, status: StatusCode, error: Option<FormError>) -> Response {
    let html = form_page(error.as_ref(), &state.recent_runs());
    (status, Html(html)).into_response()
}
