use std::fmt;

/// Opaque identifier the backend assigns to a consolidation job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Relative download path for the job's result workbook.
    pub fn download_path(&self) -> String {
        format!("/api/download/{}", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Monotonic counter distinguishing submit attempts within one process.
pub type SubmissionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    /// Maps the backend's status string. Unknown values count as still running.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" => JobStatus::Queued,
            "completed" => JobStatus::Completed,
            "error" => JobStatus::Error,
            _ => JobStatus::Processing,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// One full status report for a job. Every poll replaces the previous one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobSnapshot {
    pub id: Option<JobId>,
    pub status: JobStatus,
    pub progress: f64,
    pub processed_files: u32,
    pub total_files: u32,
    pub current_file: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl JobSnapshot {
    pub fn progress_percent(&self) -> u32 {
        self.progress.clamp(0.0, 100.0).round() as u32
    }
}

/// Per-submission switches forwarded to the backend as stringified booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsolidationOptions {
    pub convert_text_to_numbers: bool,
    pub convert_percentages: bool,
    pub create_backup: bool,
    pub skip_validation: bool,
}

impl Default for ConsolidationOptions {
    fn default() -> Self {
        Self {
            convert_text_to_numbers: true,
            convert_percentages: true,
            create_backup: false,
            skip_validation: true,
        }
    }
}

impl ConsolidationOptions {
    /// Form field names and values in the order the backend documents them.
    pub fn form_fields(&self) -> [(&'static str, &'static str); 4] {
        fn flag(value: bool) -> &'static str {
            if value {
                "true"
            } else {
                "false"
            }
        }
        [
            ("convert_text_to_numbers", flag(self.convert_text_to_numbers)),
            ("convert_percentages", flag(self.convert_percentages)),
            ("create_backup", flag(self.create_backup)),
            ("skip_validation", flag(self.skip_validation)),
        ]
    }
}
