use crate::{ConsolidationOptions, FileHandle, JobId, SubmissionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SubmitJob {
        submission: SubmissionId,
        template: FileHandle,
        sources: Vec<FileHandle>,
        options: ConsolidationOptions,
    },
    StartPolling { job_id: JobId },
    /// Cancel the poll timer for `job_id` right away.
    StopPolling { job_id: JobId },
    DownloadResult { job_id: JobId, path: String },
}
