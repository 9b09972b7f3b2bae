//! Consolidator core: pure session state machine and view-model helpers.
mod effect;
mod error;
mod job;
mod msg;
mod notify;
mod poll;
mod staging;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use error::{
    SessionError, CONNECTION_LOST_MESSAGE, SERVER_ERROR_FALLBACK, SUBMISSION_FALLBACK,
    TIMEOUT_MESSAGE,
};
pub use job::{ConsolidationOptions, JobId, JobSnapshot, JobStatus, SubmissionId};
pub use msg::Msg;
pub use notify::{escape_markup, Notification, NotificationKind, NotificationQueue, NOTIFICATION_TTL};
pub use poll::{
    PollOutcome, PollPhase, PollSession, PollSettings, PollStep, TickAction, DEFAULT_MAX_TICKS,
    DEFAULT_POLL_INTERVAL,
};
pub use staging::{is_workbook_name, AddSourcesOutcome, FileHandle, StagedInputs};
pub use state::{AppState, Section};
pub use update::update;
pub use view_model::{
    format_duration, format_file_size, AppViewModel, FileRowView, ProgressView, ResultsView,
};
