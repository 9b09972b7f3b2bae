use std::time::Duration;

use consolidator_core::{
    JobId, JobSnapshot, JobStatus, PollOutcome, PollPhase, PollSession, PollSettings, PollStep,
    SessionError, TickAction, SERVER_ERROR_FALLBACK,
};

fn session(max_ticks: u32) -> PollSession {
    let mut session = PollSession::new(
        JobId::from("job-7"),
        PollSettings {
            interval: Duration::from_secs(1),
            max_ticks,
        },
    );
    session.start();
    session
}

fn session_with_default_ceiling() -> PollSession {
    let mut session = PollSession::new(JobId::from("job-8"), PollSettings::default());
    session.start();
    session
}

fn status(status: JobStatus, progress: f64) -> JobSnapshot {
    JobSnapshot {
        status,
        progress,
        total_files: 2,
        ..JobSnapshot::default()
    }
}

#[test]
fn completed_response_finishes_once() {
    let mut session = session(600);
    assert_eq!(session.begin_tick(), TickAction::Request { tick: 1 });
    assert!(matches!(
        session.apply(Ok(status(JobStatus::Processing, 10.0))),
        PollStep::Continue(_)
    ));

    assert_eq!(session.begin_tick(), TickAction::Request { tick: 2 });
    let done = status(JobStatus::Completed, 100.0);
    assert_eq!(
        session.apply(Ok(done.clone())),
        PollStep::Finished(PollOutcome::Completed(done))
    );
    assert_eq!(session.phase(), PollPhase::Completed);

    assert_eq!(session.begin_tick(), TickAction::Skip);
    assert_eq!(
        session.apply(Ok(status(JobStatus::Completed, 100.0))),
        PollStep::Ignored
    );
    assert!(!session.stop());
}

#[test]
fn ceiling_reached_on_last_allowed_response() {
    let mut session = session(600);
    for tick in 1..=600 {
        assert_eq!(session.begin_tick(), TickAction::Request { tick });
        let step = session.apply(Ok(status(JobStatus::Processing, 50.0)));
        if tick < 600 {
            assert!(matches!(step, PollStep::Continue(_)));
        } else {
            assert_eq!(step, PollStep::Finished(PollOutcome::TimedOut { ticks: 600 }));
        }
    }
    assert_eq!(session.phase(), PollPhase::TimedOut);
    assert_eq!(session.begin_tick(), TickAction::Skip);
    assert_eq!(session.ticks(), 600);
}

#[test]
fn transport_failure_is_connection_lost_without_retry() {
    let mut session = session(600);
    session.begin_tick();
    let step = session.apply(Err("503 Service Unavailable".to_string()));
    let PollStep::Finished(outcome) = step else {
        panic!("expected terminal step");
    };
    assert!(matches!(outcome.error(), Some(SessionError::ConnectionLost(_))));
    assert_eq!(session.phase(), PollPhase::ConnectionLost);
    assert_eq!(session.begin_tick(), TickAction::Skip);
}

#[test]
fn server_error_uses_reported_message_or_fallback() {
    let mut session = session(600);
    session.begin_tick();
    let mut failed = status(JobStatus::Error, 30.0);
    failed.error = Some("Sheet 'Data' not found".to_string());
    match session.apply(Ok(failed)) {
        PollStep::Finished(PollOutcome::Errored { message, .. }) => {
            assert_eq!(message, "Sheet 'Data' not found")
        }
        other => panic!("unexpected step {other:?}"),
    }

    let mut fallback = session_with_default_ceiling();
    fallback.begin_tick();
    match fallback.apply(Ok(status(JobStatus::Error, 30.0))) {
        PollStep::Finished(PollOutcome::Errored { message, .. }) => {
            assert_eq!(message, SERVER_ERROR_FALLBACK)
        }
        other => panic!("unexpected step {other:?}"),
    }
}

#[test]
fn overlapping_tick_is_skipped_while_request_in_flight() {
    let mut session = session(600);
    assert_eq!(session.begin_tick(), TickAction::Request { tick: 1 });
    assert_eq!(session.begin_tick(), TickAction::Skip);
    session.apply(Ok(status(JobStatus::Queued, 0.0)));
    assert_eq!(session.begin_tick(), TickAction::Request { tick: 2 });
}

#[test]
fn stop_is_idempotent_from_every_phase() {
    let mut idle = PollSession::new(JobId::from("idle"), PollSettings::default());
    assert!(idle.stop());
    assert!(!idle.stop());
    assert_eq!(idle.phase(), PollPhase::Stopped);

    let mut polling = session(600);
    polling.begin_tick();
    assert!(polling.stop());
    assert!(!polling.stop());
    assert_eq!(
        polling.apply(Ok(status(JobStatus::Completed, 100.0))),
        PollStep::Ignored
    );

    let mut finished = session(1);
    finished.begin_tick();
    finished.apply(Ok(status(JobStatus::Processing, 1.0)));
    assert_eq!(finished.phase(), PollPhase::TimedOut);
    assert!(!finished.stop());
    assert_eq!(finished.phase(), PollPhase::TimedOut);
}
