use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use helios_broker::fake::{FakeJobQueue, FakeLogChannel, FakeStatusStore};
use helios_manager::fanout::Fanout;
use helios_manager::http::router;
use helios_manager::state::AppState;
use serde_json::Value;
use tower::ServiceExt;

fn test_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

async fn build_state() -> (AppState, tempfile::TempDir) {
    let storage = tempfile::tempdir().unwrap();
    let log = test_logger();
    let queue = Arc::new(FakeJobQueue::with_default_timeout());
    let status_store = Arc::new(FakeStatusStore::new());
    let log_channel = FakeLogChannel::new();
    let fanout = Fanout::new(log_channel, log.clone());
    let state = AppState {
        storage_root: storage.path().to_path_buf(),
        queue,
        status_store,
        fanout,
        log,
    };
    (state, storage)
}

fn multipart_body(boundary: &str, metadata_json: &str, archive: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"metadata\"\r\n\r\n");
    body.extend_from_slice(metadata_json.as_bytes());
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"project.zip\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: application/zip\r\n\r\n");
    body.extend_from_slice(archive);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

fn empty_zip() -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        writer.finish().unwrap();
    }
    buf
}

#[tokio::test]
async fn submit_then_query_status_round_trips() {
    let (state, _storage) = build_state().await;
    let status_store = Arc::clone(&state.status_store);
    let app = router(state);

    let boundary = "XBOUNDARY";
    let metadata = r#"{"entrypoint":"main.py","name":"demo"}"#;
    let body = multipart_body(boundary, metadata, &empty_zip());

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/tasks/submit")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["success"], true);
    let task_id = json["task_id"].as_str().unwrap().to_string();

    let recorded = status_store
        .get(task_id.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(recorded.as_wire_str(), "pending");

    let status_request = Request::builder()
        .method("GET")
        .uri(format!("/api/v1/tasks/{task_id}/status"))
        .body(Body::empty())
        .unwrap();
    let status_response = app.oneshot(status_request).await.unwrap();
    assert_eq!(status_response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(status_response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "pending");
}

#[tokio::test]
async fn unsafe_entrypoint_is_rejected_and_leaves_no_directory() {
    let (state, storage) = build_state().await;
    let app = router(state);

    let boundary = "XBOUNDARY";
    let metadata = r#"{"entrypoint":"../escape.py","name":"demo"}"#;
    let body = multipart_body(boundary, metadata, &empty_zip());

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/tasks/submit")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut entries = tokio::fs::read_dir(storage.path()).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_task_status_is_not_found() {
    let (state, _storage) = build_state().await;
    let app = router(state);

    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/v1/tasks/{}/status", uuid::Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_check_reports_ok() {
    let (state, _storage) = build_state().await;
    let app = router(state);

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
