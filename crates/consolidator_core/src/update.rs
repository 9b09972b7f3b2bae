use consolidator_logging::con_debug;

use crate::{AppState, Effect, Msg, NotificationKind, PollOutcome, Section};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::TemplateChosen(file) => {
            if state.section() == Section::Upload {
                // A rejected template is already reported as a toast.
                let _ = state.set_template(file);
            }
            Vec::new()
        }
        Msg::TemplateCleared => {
            if state.section() == Section::Upload {
                state.clear_template();
            }
            Vec::new()
        }
        Msg::SourcesChosen(files) => {
            if state.section() == Section::Upload && !files.is_empty() {
                state.add_sources(files);
            }
            Vec::new()
        }
        Msg::SourceRemoved(index) => {
            if state.section() == Section::Upload {
                state.remove_source(index);
            }
            Vec::new()
        }
        Msg::OptionsChanged(options) => {
            if state.section() == Section::Upload {
                state.set_options(options);
            }
            Vec::new()
        }
        Msg::SubmitClicked { at } => {
            if state.section() != Section::Upload {
                return (state, Vec::new());
            }
            if !state.staged().can_submit() {
                state.notify(
                    "Missing Files",
                    "Please upload both template and source files",
                    NotificationKind::Error,
                );
                return (state, Vec::new());
            }
            let options = state.options();
            match state.begin_submission(at) {
                Some((submission, template, sources)) => vec![Effect::SubmitJob {
                    submission,
                    template,
                    sources,
                    options,
                }],
                None => Vec::new(),
            }
        }
        Msg::SubmitAccepted {
            submission,
            job_id,
            total_files,
        } => {
            if !state.is_pending_submission(submission) {
                con_debug!("ignoring acceptance for stale submission {}", submission);
                return (state, Vec::new());
            }
            state.accept_submission(job_id.clone(), total_files);
            vec![Effect::StartPolling { job_id }]
        }
        Msg::SubmitFailed {
            submission,
            message,
        } => {
            if state.is_pending_submission(submission) {
                state.reject_submission(message);
            }
            Vec::new()
        }
        Msg::PollUpdate { job_id, snapshot } => {
            if state.is_current_poll(&job_id) {
                state.apply_snapshot(snapshot);
            }
            Vec::new()
        }
        Msg::PollFinished { job_id, outcome } => {
            if !state.is_current_poll(&job_id) {
                con_debug!("ignoring poll outcome for stale job {}", job_id);
                return (state, Vec::new());
            }
            // The poller has already stopped itself.
            state.finish_poll();
            let error = outcome.error();
            match outcome {
                PollOutcome::Completed(snapshot) => state.complete(snapshot),
                PollOutcome::Errored { snapshot, .. } => state.apply_snapshot(snapshot),
                PollOutcome::TimedOut { .. } | PollOutcome::ConnectionLost { .. } => {}
            }
            if let Some(error) = error {
                state.fail(error);
            }
            Vec::new()
        }
        Msg::DownloadClicked => match state.download_target() {
            Some(job_id) => {
                state.notify(
                    "Download Started",
                    "Your file is being downloaded",
                    NotificationKind::Success,
                );
                let path = job_id.download_path();
                vec![Effect::DownloadResult { job_id, path }]
            }
            None => {
                state.notify("Error", "No job ID found", NotificationKind::Error);
                Vec::new()
            }
        },
        Msg::DownloadFinished { job_id, path } => {
            if state.current_job_id() == Some(&job_id) {
                state.set_downloaded(path);
            }
            Vec::new()
        }
        Msg::DownloadFailed { job_id, message } => {
            if state.current_job_id() == Some(&job_id) {
                state.notify("Download Failed", message, NotificationKind::Error);
            }
            Vec::new()
        }
        Msg::ResetClicked => match state.reset() {
            Some(job_id) => vec![Effect::StopPolling { job_id }],
            None => Vec::new(),
        },
        Msg::Tick { now } => {
            state.tick(now);
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
