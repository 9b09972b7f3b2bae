//! Error reports destined for the diagnostics spreadsheet webhook.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local};
use consolidator_logging::{con_info, con_warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const REPORT_COLUMNS: usize = 15;
const MAX_MESSAGE_CHARS: usize = 500;
const MAX_STACK_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    TemplateLoading,
    FileProcessing,
    FileFormat,
    FileAccess,
    System,
    Ui,
    General,
}

impl ErrorCategory {
    /// Keyword rules, checked in order; the first match wins.
    pub fn classify(error_type: &str, triggered_by: &str) -> Self {
        let error_type = error_type.to_lowercase();
        let triggered_by = triggered_by.to_lowercase();
        if contains_any(&triggered_by, &["template"]) {
            ErrorCategory::TemplateLoading
        } else if contains_any(&triggered_by, &["file processing", "consolidation"]) {
            ErrorCategory::FileProcessing
        } else if contains_any(&error_type, &["badzipfile", "zipfile", "xlsx", "xls"]) {
            ErrorCategory::FileFormat
        } else if contains_any(&error_type, &["filenotfound", "permission", "access"]) {
            ErrorCategory::FileAccess
        } else if contains_any(&error_type, &["memory", "timeout", "connection"]) {
            ErrorCategory::System
        } else if contains_any(&triggered_by, &["ui", "interface", "button", "dialog"]) {
            ErrorCategory::Ui
        } else {
            ErrorCategory::General
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorCategory::TemplateLoading => "Template Loading Error",
            ErrorCategory::FileProcessing => "File Processing Error",
            ErrorCategory::FileFormat => "File Format Error",
            ErrorCategory::FileAccess => "File Access Error",
            ErrorCategory::System => "System Error",
            ErrorCategory::Ui => "UI Error",
            ErrorCategory::General => "General Error",
        }
    }
}

/// One spreadsheet row worth of diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub report_id: String,
    pub timestamp: String,
    pub app_version: String,
    pub category: ErrorCategory,
    pub error_type: String,
    pub message: String,
    pub triggered_by: String,
    pub user_count: u32,
    pub platform: String,
    pub interpreter_version: String,
    pub filename: Option<String>,
    pub file_size: Option<u64>,
    pub stack_trace: String,
}

impl ErrorReport {
    /// Column order matches the sheet header; Status starts as `New`.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.report_id.clone(),
            self.timestamp.clone(),
            self.app_version.clone(),
            self.category.label().to_string(),
            self.error_type.clone(),
            truncate_chars(&self.message, MAX_MESSAGE_CHARS),
            self.triggered_by.clone(),
            self.user_count.to_string(),
            self.platform.clone(),
            self.interpreter_version.clone(),
            self.filename.clone().unwrap_or_else(|| "N/A".to_string()),
            self.file_size.unwrap_or(0).to_string(),
            truncate_chars(&self.stack_trace, MAX_STACK_CHARS),
            "New".to_string(),
            String::new(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetails {
    pub error_type: String,
    pub message: String,
    pub triggered_by: String,
    pub stack_trace: String,
}

/// Stamps reports with ids, versions and host information.
#[derive(Debug)]
pub struct ErrorReportBuilder {
    app_version: String,
    interpreter_version: String,
    count: AtomicU32,
}

impl ErrorReportBuilder {
    pub fn new(app_version: impl Into<String>) -> Self {
        Self {
            app_version: app_version.into(),
            interpreter_version: concat!("consolidator_client ", env!("CARGO_PKG_VERSION")).to_string(),
            count: AtomicU32::new(0),
        }
    }

    pub fn build(&self, details: ErrorDetails, user_file: Option<&Path>, now: DateTime<Local>) -> ErrorReport {
        let n = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        let (filename, file_size) = match user_file {
            Some(path) => match std::fs::metadata(path) {
                Ok(meta) => (
                    path.file_name().map(|name| name.to_string_lossy().into_owned()),
                    Some(meta.len()),
                ),
                Err(_) => (None, None),
            },
            None => (None, None),
        };

        ErrorReport {
            report_id: format!("ERR_{}_{}", now.format("%Y%m%d_%H%M%S"), n),
            timestamp: now.to_rfc3339(),
            app_version: self.app_version.clone(),
            category: ErrorCategory::classify(&details.error_type, &details.triggered_by),
            error_type: details.error_type,
            message: if details.message.is_empty() {
                "Unknown error".to_string()
            } else {
                details.message
            },
            triggered_by: details.triggered_by,
            user_count: 1,
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            interpreter_version: self.interpreter_version.clone(),
            filename,
            file_size,
            stack_trace: details.stack_trace,
        }
    }
}

/// Body POSTed to the webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub spreadsheet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
    pub data: Vec<Vec<String>>,
}

/// Webhook reply; failures still come back as 200 with `success: false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_errors: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("webhook unreachable: {0}")]
    Network(String),
    #[error("webhook answered with status {0}")]
    HttpStatus(u16),
    #[error("webhook rejected report: {0}")]
    Rejected(String),
    #[error("malformed webhook reply: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct ReporterSettings {
    pub webhook_url: Url,
    pub spreadsheet_id: String,
    pub sheet_name: Option<String>,
    pub timeout: Duration,
}

impl ReporterSettings {
    pub fn new(webhook_url: Url, spreadsheet_id: impl Into<String>) -> Self {
        Self {
            webhook_url,
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: None,
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct ErrorReporter {
    settings: ReporterSettings,
    client: reqwest::Client,
}

impl ErrorReporter {
    pub fn new(settings: ReporterSettings) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| ReportError::Network(err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub async fn send(&self, reports: &[ErrorReport]) -> Result<WebhookResponse, ReportError> {
        let payload = WebhookPayload {
            spreadsheet_id: self.settings.spreadsheet_id.clone(),
            sheet_name: self.settings.sheet_name.clone(),
            data: reports.iter().map(ErrorReport::to_row).collect(),
        };

        let response = self
            .client
            .post(self.settings.webhook_url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|err| ReportError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::HttpStatus(status.as_u16()));
        }

        let reply = response
            .json::<WebhookResponse>()
            .await
            .map_err(|err| ReportError::Decode(err.to_string()))?;
        if !reply.success {
            let reason = reply.error.clone().unwrap_or_else(|| "unknown error".to_string());
            con_warn!("error report rejected: {}", reason);
            return Err(ReportError::Rejected(reason));
        }
        con_info!("sent {} error report(s) to webhook", payload.data.len());
        Ok(reply)
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
