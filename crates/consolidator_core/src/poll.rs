//! Status polling as a pure state machine.
//!
//! `Idle -> Polling -> {Completed, Errored, TimedOut, ConnectionLost}`. A user
//! stop moves any non-terminal phase to `Stopped`, which reports nothing.
//! The async driver lives in the client crate; this type only decides.

use std::time::Duration;

use crate::error::{CONNECTION_LOST_MESSAGE, SERVER_ERROR_FALLBACK};
use crate::{JobId, JobSnapshot, JobStatus, SessionError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_TICKS: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_ticks: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_ticks: DEFAULT_MAX_TICKS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Polling,
    Completed,
    Errored,
    TimedOut,
    ConnectionLost,
    Stopped,
}

impl PollPhase {
    pub fn is_finished(self) -> bool {
        !matches!(self, PollPhase::Idle | PollPhase::Polling)
    }
}

/// How a polling session ended on its own.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed(JobSnapshot),
    Errored { message: String, snapshot: JobSnapshot },
    TimedOut { ticks: u32 },
    ConnectionLost { message: String },
}

impl PollOutcome {
    /// The terminal error for the view, `None` on success.
    pub fn error(&self) -> Option<SessionError> {
        match self {
            PollOutcome::Completed(_) => None,
            PollOutcome::Errored { message, .. } => {
                Some(SessionError::ServerReported(message.clone()))
            }
            PollOutcome::TimedOut { ticks } => Some(SessionError::Timeout { ticks: *ticks }),
            PollOutcome::ConnectionLost { message } => {
                Some(SessionError::ConnectionLost(message.clone()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickAction {
    /// Issue status request number `tick` (1-based).
    Request { tick: u32 },
    Finished(PollOutcome),
    /// Session is not polling; the tick is stale.
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollStep {
    Continue(JobSnapshot),
    Finished(PollOutcome),
    /// Response arrived after the session ended or was stopped.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct PollSession {
    job_id: JobId,
    settings: PollSettings,
    phase: PollPhase,
    ticks: u32,
    in_flight: bool,
}

impl PollSession {
    pub fn new(job_id: JobId, settings: PollSettings) -> Self {
        Self {
            job_id,
            settings,
            phase: PollPhase::Idle,
            ticks: 0,
            in_flight: false,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    pub fn start(&mut self) {
        if self.phase == PollPhase::Idle {
            self.phase = PollPhase::Polling;
        }
    }

    /// Called once per interval. A tick that lands while the previous request
    /// is still outstanding is skipped and does not count toward the ceiling.
    pub fn begin_tick(&mut self) -> TickAction {
        if self.phase != PollPhase::Polling || self.in_flight {
            return TickAction::Skip;
        }
        if self.ticks >= self.settings.max_ticks {
            return TickAction::Finished(self.finish(PollOutcome::TimedOut { ticks: self.ticks }));
        }
        self.ticks += 1;
        self.in_flight = true;
        TickAction::Request { tick: self.ticks }
    }

    /// Applies one status response. `Err` carries the transport failure detail.
    pub fn apply(&mut self, result: Result<JobSnapshot, String>) -> PollStep {
        if self.phase != PollPhase::Polling {
            return PollStep::Ignored;
        }
        self.in_flight = false;

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(detail) => {
                consolidator_logging::con_warn!("status request for {} failed: {}", self.job_id, detail);
                return PollStep::Finished(self.finish(PollOutcome::ConnectionLost {
                    message: CONNECTION_LOST_MESSAGE.to_string(),
                }));
            }
        };

        match snapshot.status {
            JobStatus::Completed => PollStep::Finished(self.finish(PollOutcome::Completed(snapshot))),
            JobStatus::Error => {
                let message = snapshot
                    .error
                    .clone()
                    .filter(|msg| !msg.trim().is_empty())
                    .unwrap_or_else(|| SERVER_ERROR_FALLBACK.to_string());
                PollStep::Finished(self.finish(PollOutcome::Errored { message, snapshot }))
            }
            JobStatus::Queued | JobStatus::Processing => {
                if self.ticks >= self.settings.max_ticks {
                    PollStep::Finished(self.finish(PollOutcome::TimedOut { ticks: self.ticks }))
                } else {
                    PollStep::Continue(snapshot)
                }
            }
        }
    }

    /// Stops the session from any phase. Returns true only for the call that
    /// actually stopped a live session.
    pub fn stop(&mut self) -> bool {
        match self.phase {
            PollPhase::Idle | PollPhase::Polling => {
                self.phase = PollPhase::Stopped;
                self.in_flight = false;
                true
            }
            _ => false,
        }
    }

    fn finish(&mut self, outcome: PollOutcome) -> PollOutcome {
        self.phase = match &outcome {
            PollOutcome::Completed(_) => PollPhase::Completed,
            PollOutcome::Errored { .. } => PollPhase::Errored,
            PollOutcome::TimedOut { .. } => PollPhase::TimedOut,
            PollOutcome::ConnectionLost { .. } => PollPhase::ConnectionLost,
        };
        self.in_flight = false;
        outcome
    }
}
