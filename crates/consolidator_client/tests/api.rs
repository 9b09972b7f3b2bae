use std::fs;

use consolidator_client::{ApiClient, ApiSettings, FailureKind, ReqwestApiClient};
use consolidator_core::{ConsolidationOptions, FileHandle, JobId, JobStatus, SUBMISSION_FALLBACK};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ReqwestApiClient {
    ReqwestApiClient::new(ApiSettings::parse(&server.uri()).unwrap()).unwrap()
}

fn staged(dir: &TempDir, name: &str, content: &[u8]) -> FileHandle {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    FileHandle::new(name, content.len() as u64, path)
}

#[tokio::test]
async fn submit_uploads_multipart_and_returns_receipt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/consolidate"))
        .and(body_string_contains("name=\"template\""))
        .and(body_string_contains("name=\"sources\""))
        .and(body_string_contains("filename=\"feb.xlsx\""))
        .and(body_string_contains("name=\"create_backup\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "job_id": "abc-123",
            "message": "Consolidation started",
            "total_files": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let template = staged(&dir, "template.xlsx", b"tmpl");
    let sources = vec![
        staged(&dir, "jan.xlsx", b"january"),
        staged(&dir, "feb.xlsx", b"february"),
    ];

    let receipt = client_for(&server)
        .submit(&template, &sources, &ConsolidationOptions::default())
        .await
        .expect("submit ok");
    assert_eq!(receipt.job_id, "abc-123");
    assert_eq!(receipt.total_files, 2);
}

#[tokio::test]
async fn submit_rejection_carries_backend_error_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/consolidate"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({ "error": "Template file is required" })),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let template = staged(&dir, "template.xlsx", b"tmpl");
    let err = client_for(&server)
        .submit(&template, &[], &ConsolidationOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Rejected { status: 400 });
    assert_eq!(err.message, "Template file is required");
}

#[tokio::test]
async fn submit_rejection_without_body_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/consolidate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>boom</html>"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let template = staged(&dir, "template.xlsx", b"tmpl");
    let source = staged(&dir, "jan.xlsx", b"jan");
    let err = client_for(&server)
        .submit(&template, &[source], &ConsolidationOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Rejected { status: 500 });
    assert_eq!(err.message, SUBMISSION_FALLBACK);
}

#[tokio::test]
async fn submit_fails_before_network_when_file_is_unreadable() {
    let server = MockServer::start().await;
    let missing = FileHandle::new("gone.xlsx", 3, "/definitely/not/here/gone.xlsx");

    let err = client_for(&server)
        .submit(&missing, &[], &ConsolidationOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Io);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn status_maps_wire_fields_to_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status/abc-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "job_id": "abc-123",
            "status": "processing",
            "progress": 55.0,
            "processed_files": 1,
            "total_files": 2,
            "current_file": "feb.xlsx",
            "message": "Processing feb.xlsx",
            "error": ""
        })))
        .mount(&server)
        .await;

    let snapshot = client_for(&server)
        .status(&JobId::from("abc-123"))
        .await
        .expect("status ok");
    assert_eq!(snapshot.id, Some(JobId::from("abc-123")));
    assert_eq!(snapshot.status, JobStatus::Processing);
    assert_eq!(snapshot.progress_percent(), 55);
    assert_eq!(snapshot.processed_files, 1);
    assert_eq!(snapshot.current_file.as_deref(), Some("feb.xlsx"));
    assert_eq!(snapshot.error, None);
}

#[tokio::test]
async fn status_for_unknown_job_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status/nope"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({ "error": "Job not found" })),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .status(&JobId::from("nope"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn base_path_prefix_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/backend/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "healthy",
            "active_jobs": 3,
            "timestamp": "2024-03-07T10:00:00"
        })))
        .mount(&server)
        .await;

    let settings = ApiSettings::parse(&format!("{}/backend", server.uri())).unwrap();
    let report = ReqwestApiClient::new(settings)
        .unwrap()
        .health()
        .await
        .expect("health ok");
    assert_eq!(report.status, "healthy");
    assert_eq!(report.active_jobs, 3);
}

#[tokio::test]
async fn download_reads_body_and_suggested_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download/abc-123"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "content-disposition",
                    "attachment; filename=\"Consolidated_Mar_07_2024.xlsx\"",
                )
                .set_body_bytes(b"PK\x03\x04workbook".to_vec()),
        )
        .mount(&server)
        .await;

    let workbook = client_for(&server)
        .download(&JobId::from("abc-123"))
        .await
        .expect("download ok");
    assert_eq!(
        workbook.suggested_name.as_deref(),
        Some("Consolidated_Mar_07_2024.xlsx")
    );
    assert_eq!(workbook.bytes, b"PK\x03\x04workbook".to_vec());
}

#[tokio::test]
async fn download_over_limit_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download/big"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64]))
        .mount(&server)
        .await;

    let mut settings = ApiSettings::parse(&server.uri()).unwrap();
    settings.max_download_bytes = 16;
    let err = ReqwestApiClient::new(settings)
        .unwrap()
        .download(&JobId::from("big"))
        .await
        .unwrap_err();
    assert!(matches!(err.kind, FailureKind::TooLarge { max_bytes: 16, .. }));
}

#[tokio::test]
async fn download_of_missing_output_surfaces_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download/abc-123"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({ "error": "Output file not found" })),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .download(&JobId::from("abc-123"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Rejected { status: 404 });
    assert_eq!(err.message, "Output file not found");
}
