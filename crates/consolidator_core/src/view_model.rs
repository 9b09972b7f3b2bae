use std::path::PathBuf;

use crate::{ConsolidationOptions, JobId, Notification, Section};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub section: Section,
    pub template: Option<FileRowView>,
    pub sources: Vec<FileRowView>,
    pub submit_enabled: bool,
    pub options: ConsolidationOptions,
    pub job_id: Option<JobId>,
    pub progress: ProgressView,
    pub results: Option<ResultsView>,
    pub error_message: Option<String>,
    pub notifications: Vec<Notification>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRowView {
    pub name: String,
    pub size_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressView {
    pub total_files: u32,
    pub processed_files: u32,
    pub percent: u32,
    pub status_text: String,
    pub current_file: Option<String>,
    /// Each processed file label appears once, in arrival order.
    pub processed_log: Vec<String>,
    pub elapsed_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsView {
    pub files_count: u32,
    pub message: String,
    pub process_time_label: String,
    pub download_url: String,
    pub download_enabled: bool,
    pub downloaded_to: Option<PathBuf>,
}

/// `0 B`, `512 B`, `1.5 KB`, `2.0 MB`, ...
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// `42s`, `3m 5s`, `1h 2m 3s`.
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    let minutes = seconds / 60;
    let remaining_seconds = seconds % 60;
    if minutes < 60 {
        return format!("{minutes}m {remaining_seconds}s");
    }
    let hours = minutes / 60;
    let remaining_minutes = minutes % 60;
    format!("{hours}h {remaining_minutes}m {remaining_seconds}s")
}
