use std::path::PathBuf;
use std::time::Instant;

use crate::{ConsolidationOptions, FileHandle, JobId, JobSnapshot, PollOutcome, SubmissionId};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User picked a template workbook.
    TemplateChosen(FileHandle),
    /// User removed the template.
    TemplateCleared,
    /// User picked or dropped one or more source workbooks.
    SourcesChosen(Vec<FileHandle>),
    /// User removed the source at this position.
    SourceRemoved(usize),
    /// User toggled one of the consolidation switches.
    OptionsChanged(ConsolidationOptions),
    /// User clicked Start; `at` is the local wall clock.
    SubmitClicked { at: Instant },
    /// Backend accepted the upload.
    SubmitAccepted {
        submission: SubmissionId,
        job_id: JobId,
        total_files: u32,
    },
    /// Upload was rejected or never reached the backend.
    SubmitFailed {
        submission: SubmissionId,
        message: String,
    },
    /// Non-terminal status snapshot from the poller.
    PollUpdate { job_id: JobId, snapshot: JobSnapshot },
    /// Poller reached a terminal state on its own.
    PollFinished { job_id: JobId, outcome: PollOutcome },
    /// User clicked Download on the results section.
    DownloadClicked,
    DownloadFinished { job_id: JobId, path: PathBuf },
    DownloadFailed { job_id: JobId, message: String },
    /// User clicked New Consolidation or Retry.
    ResetClicked,
    /// Clock tick; drives toast expiry and the elapsed-time label.
    Tick { now: Instant },
    /// Fallback for placeholder wiring.
    NoOp,
}
