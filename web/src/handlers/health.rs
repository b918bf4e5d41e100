use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

pub async fn health() -> impl IntoResponse {
    let resp = HealthResponse {
        ok: true,
        service: crate::SERVICE_NAME,
    };
    (StatusCode::OK, Json(resp))
}
