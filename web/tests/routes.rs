//! Router tests driven with `tower::ServiceExt::oneshot`.

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::Router;
use datasift_processing::{FetchResponse, HttpFetcher, Pipeline, PipelineConfig, RunId};
use datasift_web::{AppState, router};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "datasift-test-boundary";

/// Answers every URL with the same response.
struct FixedFetcher(FetchResponse);

impl HttpFetcher for FixedFetcher {
    fn fetch(&self, _url: &str) -> anyhow::Result<FetchResponse> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

struct TestApp {
    _dir: tempfile::TempDir,
    state: AppState,
}

impl TestApp {
    fn new(namespaced: bool, fetched: FetchResponse) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let state = app_state(dir.path(), namespaced, fetched, 1024 * 1024);
        Self { _dir: dir, state }
    }

    fn router(&self) -> Router {
        router(self.state.clone())
    }
}

fn app_state(dir: &Path, namespaced: bool, fetched: FetchResponse, limit: usize) -> AppState {
    let config = PipelineConfig::builder()
        .artifact_dir(dir.join("static"))
        .upload_dir(dir.join("uploads"))
        .namespace_artifacts(namespaced)
        .report_download_href("download")
        .build()
        .unwrap();
    let pipeline = Pipeline::builder()
        .config(config)
        .fetcher(Arc::new(FixedFetcher(fetched)))
        .build()
        .unwrap();
    AppState::new(Arc::new(pipeline), limit)
}

/// Multipart body with an optional file part and an optional url part.
fn multipart_body(file: Option<(&str, &str)>, url: Option<&str>) -> String {
    let mut body = String::new();
    if let Some((filename, content)) = file {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: text/csv\r\n\r\n{content}\r\n"
        ));
    }
    if let Some(url) = url {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"url\"\r\n\r\n{url}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

fn post_form(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_form_is_served() {
    let app = TestApp::new(true, FetchResponse::ok(""));
    let response = app.router().oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("name=\"file\""));
    assert!(html.contains("name=\"url\""));
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new(true, FetchResponse::ok(""));
    let response = app.router().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "datasift-web");
}

#[tokio::test]
async fn test_upload_redirects_to_report_and_serves_artifacts() {
    let app = TestApp::new(true, FetchResponse::ok(""));

    let response = app
        .router()
        .oneshot(post_form(multipart_body(
            Some(("people.csv", "name,value\na,1\na,1\nb,\nc,2\n")),
            None,
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let report_url = location(&response);
    assert!(report_url.starts_with("/runs/"));
    assert!(report_url.ends_with("/report"));

    let response = app.router().oneshot(get(&report_url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Complete Data Profiling Report"));
    assert!(html.contains("href=\"download\""));

    let download_url = report_url.replace("/report", "/download");
    let response = app.router().oneshot(get(&download_url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"cleaned.csv\""
    );
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    assert_eq!(body_text(response).await, "name,value\na,1\nc,2\n");

    // The latest-run aliases point at the same artifacts.
    let response = app.router().oneshot(get("/download")).await.unwrap();
    assert_eq!(body_text(response).await, "name,value\na,1\nc,2\n");
}

#[tokio::test]
async fn test_fixed_layout_redirects_to_latest_report() {
    let app = TestApp::new(false, FetchResponse::ok(""));

    let response = app
        .router()
        .oneshot(post_form(multipart_body(Some(("a.csv", "x\n1\n")), None)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/report");

    let response = app.router().oneshot(get("/report")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_url_submission_is_fetched() {
    let app = TestApp::new(true, FetchResponse::ok("k,v\nx,1\n"));

    let response = app
        .router()
        .oneshot(post_form(multipart_body(
            None,
            Some("https://example.com/data.csv"),
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let latest = app.state.latest_run().unwrap();
    assert_eq!(latest.source, "https://example.com/data.csv");
    assert_eq!(latest.rows_after, 1);
}

#[tokio::test]
async fn test_not_found_url_rerenders_form_with_message() {
    let app = TestApp::new(
        true,
        FetchResponse {
            status: 404,
            bytes: b"missing".to_vec(),
        },
    );

    let response = app
        .router()
        .oneshot(post_form(multipart_body(
            None,
            Some("https://example.com/missing.csv"),
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_text(response).await;
    assert!(html.contains("FETCH_FAILED"));
    assert!(html.contains("HTTP status 404"));
    assert!(html.contains("name=\"file\""));
    assert!(app.state.latest_run().is_none());
}

#[tokio::test]
async fn test_non_csv_upload_without_url_returns_form() {
    let app = TestApp::new(true, FetchResponse::ok(""));

    let response = app
        .router()
        .oneshot(post_form(multipart_body(Some(("data.txt", "a,b\n1,2\n")), None)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("name=\"file\""));
    assert!(!html.contains("role=\"alert\""));
    assert!(app.state.latest_run().is_none());
}

#[tokio::test]
async fn test_empty_submission_returns_form() {
    let app = TestApp::new(true, FetchResponse::ok(""));

    let response = app
        .router()
        .oneshot(post_form(multipart_body(Some(("", "")), Some(""))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_csv_shows_parse_error() {
    let app = TestApp::new(true, FetchResponse::ok(""));

    let response = app
        .router()
        .oneshot(post_form(multipart_body(
            Some(("bad.csv", "a,b\n1,2\n3,4,5\n")),
            None,
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_text(response).await;
    assert!(html.contains("PARSE_ERROR"));
    assert!(html.contains("line 3"));
}

#[tokio::test]
async fn test_unterminated_quote_shows_parse_error() {
    let app = TestApp::new(true, FetchResponse::ok(""));

    let response = app
        .router()
        .oneshot(post_form(multipart_body(
            Some(("open.csv", "a,b\n1,\"unterminated\n")),
            None,
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_text(response).await;
    assert!(html.contains("PARSE_ERROR"));
    assert!(html.contains("EOF inside quoted field"));
    assert!(app.state.latest_run().is_none());
}

#[tokio::test]
async fn test_artifacts_before_any_run_are_not_found() {
    let app = TestApp::new(true, FetchResponse::ok(""));

    for uri in ["/report", "/download"] {
        let response = app.router().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }

    let unknown = format!("/runs/{}/report", RunId::new());
    let response = app.router().oneshot(get(&unknown)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .router()
        .oneshot(get("/runs/not-a-uuid/download"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_body_limit_is_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path(), true, FetchResponse::ok(""), 64);
    let big = "a,b\n".to_string() + &"1,2\n".repeat(100);

    let response = router(state.clone())
        .oneshot(post_form(multipart_body(Some(("big.csv", &big)), None)))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert!(state.latest_run().is_none());
}
