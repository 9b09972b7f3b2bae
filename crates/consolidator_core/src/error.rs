use thiserror::Error;

pub const CONNECTION_LOST_MESSAGE: &str = "Lost connection to server. Please check your network.";
pub const TIMEOUT_MESSAGE: &str = "Request timed out. The process may still be running.";
pub const SERVER_ERROR_FALLBACK: &str = "An error occurred during consolidation";
pub const SUBMISSION_FALLBACK: &str = "Failed to start consolidation";

/// Everything that can go wrong in one staging/submission/polling session.
///
/// `Validation` is reported as a notification and leaves state alone; every
/// other variant is terminal and moves the view to the error section.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Submission(String),
    #[error("{0}")]
    ConnectionLost(String),
    #[error("Request timed out. The process may still be running.")]
    Timeout { ticks: u32 },
    #[error("{0}")]
    ServerReported(String),
}

impl SessionError {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionError::Validation(_))
    }
}
