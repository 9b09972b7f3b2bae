//! Consolidator client: backend API, status polling, downloads and error reporting.
mod api;
mod filename;
mod persist;
mod poller;
mod report;
mod sheet;
mod types;

pub use api::{ApiClient, ApiSettings, ReqwestApiClient};
pub use filename::result_filename;
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use poller::{ChannelObserver, PollObserver, PollerHandle, StatusPoller};
pub use report::{
    ErrorCategory, ErrorDetails, ErrorReport, ErrorReportBuilder, ErrorReporter, ReportError,
    ReporterSettings, WebhookPayload, WebhookResponse, REPORT_COLUMNS,
};
pub use sheet::{
    handle_report, handle_report_body, service_description, CategoryRule, InMemoryWorkbookStore,
    ListValidation, Sheet, SheetLayout, SheetSummary, SummaryBlock, WebhookRequest, WorkbookStore,
    COLUMN_WIDTHS, DEFAULT_SHEET_NAME, HEADERS, STATUS_COLUMN, STATUS_VALUES,
};
pub use types::{
    ApiError, DownloadedWorkbook, FailureKind, HealthReport, StatusResponse, SubmitReceipt,
};
