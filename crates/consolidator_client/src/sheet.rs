//! Receiving end of the error-report webhook.
//!
//! The first write to a sheet provisions its layout (headers, widths, Status
//! validation, category colours, summary formulas). Later writes only append.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use consolidator_logging::con_info;
use serde::{Deserialize, Serialize};

use crate::report::{WebhookResponse, REPORT_COLUMNS};

pub const DEFAULT_SHEET_NAME: &str = "Error Log";
pub const STATUS_COLUMN: usize = 14;
const CATEGORY_COLUMN: usize = 4;
const ERROR_TYPE_COLUMN: usize = 5;
pub const STATUS_VALUES: [&str; 5] = ["New", "Investigating", "Fixed", "Won't Fix", "Duplicate"];

pub const HEADERS: [&str; REPORT_COLUMNS] = [
    "Report ID",
    "Date & Time",
    "App Version",
    "Error Category",
    "Error Type",
    "Error Message",
    "Triggered By",
    "User Count",
    "Platform",
    "Interpreter Version",
    "Filename",
    "File Size (bytes)",
    "Stack Trace",
    "Status",
    "Notes",
];

pub const COLUMN_WIDTHS: [u32; REPORT_COLUMNS] = [
    120, 150, 80, 120, 120, 200, 150, 80, 120, 120, 150, 100, 300, 80, 200,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListValidation {
    /// 1-based column index.
    pub column: usize,
    pub first_row: usize,
    pub row_count: usize,
    pub values: Vec<String>,
    pub allow_invalid: bool,
    pub help_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub column: usize,
    pub text_contains: String,
    pub background: String,
    pub font_color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryBlock {
    pub title: String,
    /// 1-based column the block starts at, one gap column after the data.
    pub start_column: usize,
    pub first_row: usize,
    pub rows: Vec<(String, String)>,
    pub column_widths: [u32; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLayout {
    pub headers: Vec<String>,
    pub column_widths: Vec<u32>,
    pub header_background: String,
    pub header_font_color: String,
    pub frozen_rows: usize,
    pub status_validation: ListValidation,
    pub category_rules: Vec<CategoryRule>,
    pub summary: SummaryBlock,
}

impl SheetLayout {
    pub fn error_log() -> Self {
        let rule = |text: &str, background: &str, font: &str| CategoryRule {
            column: CATEGORY_COLUMN,
            text_contains: text.to_string(),
            background: background.to_string(),
            font_color: font.to_string(),
        };
        let summary_row = |label: &str, formula: &str| (label.to_string(), formula.to_string());

        Self {
            headers: HEADERS.iter().map(|h| h.to_string()).collect(),
            column_widths: COLUMN_WIDTHS.to_vec(),
            header_background: "#1f4e79".to_string(),
            header_font_color: "white".to_string(),
            frozen_rows: 1,
            status_validation: ListValidation {
                column: STATUS_COLUMN,
                first_row: 2,
                row_count: 1000,
                values: STATUS_VALUES.iter().map(|v| v.to_string()).collect(),
                allow_invalid: false,
                help_text: "Select error status".to_string(),
            },
            category_rules: vec![
                rule("Template Loading", "#ffebee", "#c62828"),
                rule("File Processing", "#fff3e0", "#ef6c00"),
                rule("System", "#f3e5f5", "#7b1fa2"),
            ],
            summary: SummaryBlock {
                title: "ERROR REPORTING SUMMARY".to_string(),
                start_column: REPORT_COLUMNS + 2,
                first_row: 3,
                rows: vec![
                    summary_row("Total Errors:", "=COUNTA(A:A)-1"),
                    summary_row("New Errors:", "=COUNTIF(N:N,\"New\")"),
                    summary_row("Fixed Errors:", "=COUNTIF(N:N,\"Fixed\")"),
                    summary_row("Today's Errors:", "=COUNTIF(B:B,\">=\"&TODAY())"),
                    summary_row("Most Common Error:", "=INDEX(E:E,MODE(MATCH(E:E,E:E,0)))"),
                    summary_row("Last Error:", "=MAX(B:B)"),
                ],
                column_widths: [150, 200],
            },
        }
    }
}

/// Locally computed equivalent of the summary block's formulas.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SheetSummary {
    pub total: usize,
    pub new: usize,
    pub fixed: usize,
    pub most_common_error_type: Option<String>,
    pub last_error_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub layout: SheetLayout,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn provisioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layout: SheetLayout::error_log(),
            rows: Vec::new(),
        }
    }

    /// Appends rows with Status forced to `New`; returns the number appended.
    pub fn append(&mut self, rows: Vec<Vec<String>>) -> usize {
        let count = rows.len();
        for mut row in rows {
            if row.len() >= STATUS_COLUMN {
                row[STATUS_COLUMN - 1] = STATUS_VALUES[0].to_string();
            }
            self.rows.push(row);
        }
        count
    }

    pub fn summary(&self) -> SheetSummary {
        let column = |row: &Vec<String>, index: usize| row.get(index).cloned().unwrap_or_default();
        let status_count = |wanted: &str| {
            self.rows
                .iter()
                .filter(|row| column(*row, STATUS_COLUMN - 1) == wanted)
                .count()
        };

        let mut tally: BTreeMap<String, usize> = BTreeMap::new();
        for row in &self.rows {
            let error_type = column(row, ERROR_TYPE_COLUMN - 1);
            if !error_type.is_empty() {
                *tally.entry(error_type).or_default() += 1;
            }
        }
        // Ties go to the value seen first, like MODE over MATCH.
        let most_common_error_type = self
            .rows
            .iter()
            .map(|row| column(row, ERROR_TYPE_COLUMN - 1))
            .filter(|error_type| !error_type.is_empty())
            .fold(None::<(String, usize)>, |best, error_type| {
                let count = tally.get(&error_type).copied().unwrap_or(0);
                match best {
                    Some((_, best_count)) if best_count >= count => best,
                    _ => Some((error_type, count)),
                }
            })
            .map(|(error_type, _)| error_type);

        SheetSummary {
            total: self.rows.len(),
            new: status_count("New"),
            fixed: status_count("Fixed"),
            most_common_error_type,
            last_error_at: self.rows.iter().map(|row| column(row, 1)).max(),
        }
    }
}

/// Where webhook rows land.
pub trait WorkbookStore {
    fn sheet_mut(&mut self, spreadsheet_id: &str, sheet_name: &str) -> Option<&mut Sheet>;
    fn insert_sheet(&mut self, spreadsheet_id: &str, sheet: Sheet) -> &mut Sheet;
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InMemoryWorkbookStore {
    spreadsheets: BTreeMap<String, BTreeMap<String, Sheet>>,
}

impl InMemoryWorkbookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(&self, spreadsheet_id: &str, sheet_name: &str) -> Option<&Sheet> {
        self.spreadsheets.get(spreadsheet_id)?.get(sheet_name)
    }
}

impl WorkbookStore for InMemoryWorkbookStore {
    fn sheet_mut(&mut self, spreadsheet_id: &str, sheet_name: &str) -> Option<&mut Sheet> {
        self.spreadsheets.get_mut(spreadsheet_id)?.get_mut(sheet_name)
    }

    fn insert_sheet(&mut self, spreadsheet_id: &str, sheet: Sheet) -> &mut Sheet {
        let name = sheet.name.clone();
        let sheets = self.spreadsheets.entry(spreadsheet_id.to_string()).or_default();
        sheets.entry(name).or_insert(sheet)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookRequest {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub sheet_name: Option<String>,
    #[serde(default)]
    pub data: Option<Vec<Vec<String>>>,
}

/// Handles a raw POST body. Malformed JSON is answered, not propagated.
pub fn handle_report_body(
    store: &mut impl WorkbookStore,
    body: &str,
    now: DateTime<Utc>,
) -> WebhookResponse {
    match serde_json::from_str::<WebhookRequest>(body) {
        Ok(request) => handle_report(store, request, now),
        Err(err) => failure(err.to_string(), now),
    }
}

pub fn handle_report(
    store: &mut impl WorkbookStore,
    request: WebhookRequest,
    now: DateTime<Utc>,
) -> WebhookResponse {
    let (Some(spreadsheet_id), Some(rows)) = (
        request.spreadsheet_id.filter(|id| !id.trim().is_empty()),
        request.data,
    ) else {
        return failure("Missing required fields: spreadsheet_id and data", now);
    };
    let sheet_name = request
        .sheet_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string());

    if store.sheet_mut(&spreadsheet_id, &sheet_name).is_none() {
        con_info!("provisioning sheet '{}' in {}", sheet_name, spreadsheet_id);
        store.insert_sheet(&spreadsheet_id, Sheet::provisioned(sheet_name.clone()));
    }
    let Some(sheet) = store.sheet_mut(&spreadsheet_id, &sheet_name) else {
        return failure(format!("Sheet '{sheet_name}' could not be created"), now);
    };
    let added = sheet.append(rows);

    WebhookResponse {
        success: true,
        message: Some(format!("Added {added} row(s) to spreadsheet")),
        error: None,
        timestamp: Some(now.to_rfc3339()),
        total_errors: Some(sheet.rows.len() as u64),
    }
}

/// Reply to a GET on the webhook.
pub fn service_description(now: DateTime<Utc>) -> serde_json::Value {
    serde_json::json!({
        "message": "Excel Consolidator Error Reporting Service",
        "status": "active",
        "version": "2.0",
        "features": [
            "Professional formatting",
            "Error categorization",
            "Summary statistics",
            "Conditional formatting",
            "Data validation"
        ],
        "timestamp": now.to_rfc3339(),
    })
}

fn failure(error: impl Into<String>, now: DateTime<Utc>) -> WebhookResponse {
    WebhookResponse {
        success: false,
        message: None,
        error: Some(error.into()),
        timestamp: Some(now.to_rfc3339()),
        total_errors: None,
    }
}
