use chrono::{Local, TimeZone, Utc};
use consolidator_client::{
    handle_report, handle_report_body, service_description, ErrorDetails, ErrorReportBuilder,
    ErrorReporter, InMemoryWorkbookStore, ReportError, ReporterSettings, WebhookRequest,
    DEFAULT_SHEET_NAME, HEADERS, REPORT_COLUMNS, STATUS_COLUMN,
};
use pretty_assertions::assert_eq;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn row(id: &str, error_type: &str, status: &str) -> Vec<String> {
    let mut row = vec![String::new(); REPORT_COLUMNS];
    row[0] = id.to_string();
    row[1] = format!("2024-03-07T10:00:0{}", id.len() % 10);
    row[4] = error_type.to_string();
    row[STATUS_COLUMN - 1] = status.to_string();
    row
}

fn request(rows: Vec<Vec<String>>) -> WebhookRequest {
    WebhookRequest {
        spreadsheet_id: Some("sheet-1".to_string()),
        sheet_name: None,
        data: Some(rows),
    }
}

#[test]
fn first_report_provisions_error_log_layout() {
    let mut store = InMemoryWorkbookStore::new();
    let now = Utc.with_ymd_and_hms(2024, 3, 7, 10, 0, 0).unwrap();

    let reply = handle_report(&mut store, request(vec![row("ERR_1", "TimeoutError", "Fixed")]), now);
    assert!(reply.success);
    assert_eq!(reply.message.as_deref(), Some("Added 1 row(s) to spreadsheet"));
    assert_eq!(reply.total_errors, Some(1));

    let sheet = store.sheet("sheet-1", DEFAULT_SHEET_NAME).expect("sheet provisioned");
    assert_eq!(sheet.layout.headers, HEADERS.to_vec());
    assert_eq!(sheet.layout.headers[8..10], ["Platform", "Interpreter Version"]);
    assert_eq!(sheet.layout.frozen_rows, 1);
    assert_eq!(sheet.layout.status_validation.column, 14);
    assert_eq!(sheet.layout.category_rules.len(), 3);
    assert_eq!(sheet.layout.summary.rows[0].1, "=COUNTA(A:A)-1");
    // Incoming status is always overwritten.
    assert_eq!(sheet.rows[0][STATUS_COLUMN - 1], "New");
}

#[test]
fn later_reports_append_and_summary_counts() {
    let mut store = InMemoryWorkbookStore::new();
    let now = Utc::now();
    handle_report(
        &mut store,
        request(vec![row("ERR_1", "TimeoutError", "New"), row("ERR_22", "KeyError", "New")]),
        now,
    );
    let reply = handle_report(&mut store, request(vec![row("ERR_333", "TimeoutError", "New")]), now);
    assert_eq!(reply.total_errors, Some(3));

    let summary = store.sheet("sheet-1", DEFAULT_SHEET_NAME).unwrap().summary();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.new, 3);
    assert_eq!(summary.fixed, 0);
    assert_eq!(summary.most_common_error_type.as_deref(), Some("TimeoutError"));
    assert_eq!(summary.last_error_at.as_deref(), Some("2024-03-07T10:00:07"));
}

#[test]
fn missing_fields_and_bad_json_answer_with_failure() {
    let mut store = InMemoryWorkbookStore::new();
    let now = Utc::now();

    let reply = handle_report(
        &mut store,
        WebhookRequest {
            spreadsheet_id: Some("sheet-1".to_string()),
            ..WebhookRequest::default()
        },
        now,
    );
    assert!(!reply.success);
    assert_eq!(
        reply.error.as_deref(),
        Some("Missing required fields: spreadsheet_id and data")
    );

    let reply = handle_report_body(&mut store, "{not json", now);
    assert!(!reply.success);
    assert!(reply.error.is_some());
    assert!(store.sheet("sheet-1", DEFAULT_SHEET_NAME).is_none());
}

#[test]
fn custom_sheet_name_is_honoured() {
    let mut store = InMemoryWorkbookStore::new();
    let body = serde_json::json!({
        "spreadsheet_id": "sheet-9",
        "sheet_name": "Beta Errors",
        "data": [row("ERR_1", "ValueError", "New")]
    })
    .to_string();

    let reply = handle_report_body(&mut store, &body, Utc::now());
    assert!(reply.success);
    assert!(store.sheet("sheet-9", "Beta Errors").is_some());
    assert!(store.sheet("sheet-9", DEFAULT_SHEET_NAME).is_none());
}

#[test]
fn service_description_reports_active() {
    let value = service_description(Utc::now());
    assert_eq!(value["status"], "active");
    assert_eq!(value["version"], "2.0");
}

fn sample_report() -> consolidator_client::ErrorReport {
    ErrorReportBuilder::new("2.0.0").build(
        ErrorDetails {
            error_type: "BadZipFile".to_string(),
            message: "File is not a zip file".to_string(),
            triggered_by: "Template Loading".to_string(),
            stack_trace: String::new(),
        },
        None,
        Local::now(),
    )
}

#[tokio::test]
async fn reporter_posts_rows_to_webhook() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(serde_json::json!({ "spreadsheet_id": "sheet-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "message": "Added 1 row(s) to spreadsheet",
            "total_errors": 4
        })))
        .expect(1)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/hook", server.uri())).unwrap();
    let reporter = ErrorReporter::new(ReporterSettings::new(url, "sheet-1")).unwrap();
    let reply = reporter.send(&[sample_report()]).await.expect("report sent");
    assert_eq!(reply.total_errors, Some(4));
}

#[tokio::test]
async fn reporter_surfaces_rejection_in_success_false_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "error": "Missing required fields: spreadsheet_id and data"
        })))
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/hook", server.uri())).unwrap();
    let reporter = ErrorReporter::new(ReporterSettings::new(url, "sheet-1")).unwrap();
    let err = reporter.send(&[sample_report()]).await.unwrap_err();
    assert!(matches!(err, ReportError::Rejected(ref text) if text.starts_with("Missing required")));
}
