//! Async driver for [`PollSession`]: one status request per interval until the
//! session finishes or the handle is stopped.

use std::sync::Arc;

use consolidator_core::{
    JobId, JobSnapshot, Msg, PollOutcome, PollPhase, PollSession, PollSettings, PollStep,
    TickAction,
};
use consolidator_logging::{con_debug, con_info};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::ApiClient;

/// Receives poll results. Nothing is delivered after the handle is stopped.
pub trait PollObserver: Send + Sync {
    fn on_update(&self, job_id: &JobId, snapshot: &JobSnapshot);
    fn on_terminal(&self, job_id: &JobId, outcome: &PollOutcome);
}

/// Forwards poll results into the app's message loop.
pub struct ChannelObserver {
    tx: UnboundedSender<Msg>,
}

impl ChannelObserver {
    pub fn new(tx: UnboundedSender<Msg>) -> Self {
        Self { tx }
    }
}

impl PollObserver for ChannelObserver {
    fn on_update(&self, job_id: &JobId, snapshot: &JobSnapshot) {
        let _ = self.tx.send(Msg::PollUpdate {
            job_id: job_id.clone(),
            snapshot: snapshot.clone(),
        });
    }

    fn on_terminal(&self, job_id: &JobId, outcome: &PollOutcome) {
        let _ = self.tx.send(Msg::PollFinished {
            job_id: job_id.clone(),
            outcome: outcome.clone(),
        });
    }
}

#[derive(Clone)]
pub struct StatusPoller {
    api: Arc<dyn ApiClient>,
    settings: PollSettings,
}

impl StatusPoller {
    pub fn new(api: Arc<dyn ApiClient>, settings: PollSettings) -> Self {
        Self { api, settings }
    }

    /// Spawns the polling task on the current tokio runtime.
    pub fn start(&self, job_id: JobId, observer: Arc<dyn PollObserver>) -> PollerHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(run_session(
            self.api.clone(),
            self.settings,
            job_id.clone(),
            observer,
            token.clone(),
        ));
        PollerHandle {
            job_id,
            token,
            task,
        }
    }
}

pub struct PollerHandle {
    job_id: JobId,
    token: CancellationToken,
    task: JoinHandle<PollPhase>,
}

impl PollerHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Cancels the timer and any in-flight request. Safe to call repeatedly
    /// and after the session already ended.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the task and returns the phase it ended in.
    pub async fn join(self) -> PollPhase {
        match self.task.await {
            Ok(phase) => phase,
            Err(_) => PollPhase::Stopped,
        }
    }
}

async fn run_session(
    api: Arc<dyn ApiClient>,
    settings: PollSettings,
    job_id: JobId,
    observer: Arc<dyn PollObserver>,
    token: CancellationToken,
) -> PollPhase {
    let mut session = PollSession::new(job_id.clone(), settings);
    session.start();
    con_info!(
        "polling {} every {:?} (max {} ticks)",
        job_id,
        settings.interval,
        settings.max_ticks
    );

    let mut ticker = interval_at(Instant::now() + settings.interval, settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return stopped(&mut session),
            _ = ticker.tick() => {}
        }

        match session.begin_tick() {
            TickAction::Skip => continue,
            TickAction::Finished(outcome) => return finish(&session, &*observer, &token, outcome),
            TickAction::Request { tick } => con_debug!("poll tick {} for {}", tick, job_id),
        }

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return stopped(&mut session),
            result = api.status(&job_id) => result,
        };

        let result = result.map_err(|err| err.to_string());
        let latest = result.as_ref().ok().cloned();
        match session.apply(result) {
            PollStep::Continue(snapshot) => {
                if token.is_cancelled() {
                    return stopped(&mut session);
                }
                observer.on_update(&job_id, &snapshot);
            }
            PollStep::Finished(outcome) => {
                // The ceiling response is still shown before the timeout.
                if let (PollOutcome::TimedOut { .. }, Some(snapshot)) = (&outcome, &latest) {
                    if !token.is_cancelled() {
                        observer.on_update(&job_id, snapshot);
                    }
                }
                return finish(&session, &*observer, &token, outcome);
            }
            PollStep::Ignored => return session.phase(),
        }
    }
}

fn stopped(session: &mut PollSession) -> PollPhase {
    if session.stop() {
        con_debug!("polling for {} stopped by user", session.job_id());
    }
    session.phase()
}

fn finish(
    session: &PollSession,
    observer: &dyn PollObserver,
    token: &CancellationToken,
    outcome: PollOutcome,
) -> PollPhase {
    if !token.is_cancelled() {
        con_info!("polling for {} ended: {:?}", session.job_id(), session.phase());
        observer.on_terminal(session.job_id(), &outcome);
    }
    session.phase()
}
