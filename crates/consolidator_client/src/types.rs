use std::fmt;

use consolidator_core::{JobId, JobSnapshot, JobStatus};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    Network,
    Timeout,
    HttpStatus(u16),
    /// Backend answered non-2xx with an `{error}` body.
    Rejected { status: u16 },
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Decode,
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Rejected { status } => write!(f, "rejected with status {status}"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Decode => write!(f, "malformed response"),
            FailureKind::Io => write!(f, "io error"),
        }
    }
}

/// Reply to `POST /api/consolidate`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmitReceipt {
    pub job_id: String,
    #[serde(default)]
    pub total_files: u32,
    #[serde(default)]
    pub message: Option<String>,
}

/// Reply to `GET /api/status/{job_id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub job_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub processed_files: u32,
    #[serde(default)]
    pub total_files: u32,
    #[serde(default)]
    pub current_file: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub has_output: Option<bool>,
}

impl StatusResponse {
    pub fn into_snapshot(self, job_id: &JobId) -> JobSnapshot {
        JobSnapshot {
            id: Some(self.job_id.map(JobId::new).unwrap_or_else(|| job_id.clone())),
            status: JobStatus::from_wire(&self.status),
            progress: self.progress,
            processed_files: self.processed_files,
            total_files: self.total_files,
            current_file: non_empty(self.current_file),
            message: non_empty(self.message),
            error: non_empty(self.error),
        }
    }
}

/// Reply to `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub active_jobs: u32,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedWorkbook {
    /// File name suggested by `Content-Disposition`, if any.
    pub suggested_name: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
