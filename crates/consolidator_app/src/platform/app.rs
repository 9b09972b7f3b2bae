//! Message loop for one consolidation run in the terminal.

use std::fs;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use consolidator_client::ApiClient;
use consolidator_core::{
    update, AppState, ConsolidationOptions, FileHandle, Msg, NotificationKind, PollSettings,
    Section,
};
use consolidator_logging::{con_debug, con_info};
use tokio::sync::mpsc;

use super::effects::EffectRunner;
use super::ui::render::{render, toast_lines};

const TICK_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub template: PathBuf,
    pub sources: Vec<PathBuf>,
    pub options: ConsolidationOptions,
    pub download: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { saved_to: Option<PathBuf> },
    Failed(String),
    Cancelled,
}

/// Builds a staged file entry from a path on disk.
pub fn file_handle(path: &Path) -> Result<FileHandle> {
    let meta = fs::metadata(path).with_context(|| format!("cannot read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;
    Ok(FileHandle::new(name, meta.len(), path))
}

/// Stages the request, submits it and follows the job until it ends.
///
/// `interrupt` resolving is treated as the user pressing New Consolidation.
pub async fn run_session<W: Write>(
    api: Arc<dyn ApiClient>,
    poll_settings: PollSettings,
    output_dir: PathBuf,
    request: RunRequest,
    out: &mut W,
    interrupt: impl Future<Output = ()> + Send + 'static,
) -> Result<RunOutcome> {
    let template = file_handle(&request.template)?;
    let sources = request
        .sources
        .iter()
        .map(|path| file_handle(path))
        .collect::<Result<Vec<_>>>()?;

    let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<Msg>();
    let mut runner = EffectRunner::new(api, poll_settings, output_dir, msg_tx.clone());

    for msg in [
        Msg::TemplateChosen(template),
        Msg::SourcesChosen(sources),
        Msg::OptionsChanged(request.options),
        Msg::SubmitClicked { at: Instant::now() },
    ] {
        let _ = msg_tx.send(msg);
    }

    let tick_tx = msg_tx.clone();
    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            interval.tick().await;
            if tick_tx.send(Msg::Tick { now: Instant::now() }).is_err() {
                break;
            }
        }
    });
    let interrupt_tx = msg_tx.clone();
    let interrupter = tokio::spawn(async move {
        interrupt.await;
        con_info!("run interrupted by user");
        let _ = interrupt_tx.send(Msg::ResetClicked);
    });
    drop(msg_tx);

    let mut state = AppState::new();
    let mut last_frame: Vec<String> = Vec::new();
    let mut last_toast = 0;
    let mut download_requested = false;

    let outcome = loop {
        let Some(msg) = msg_rx.recv().await else {
            break RunOutcome::Failed("message channel closed".to_string());
        };
        let cancelled = matches!(msg, Msg::ResetClicked);
        let submit_attempt = matches!(msg, Msg::SubmitClicked { .. });
        let download_failed = match &msg {
            Msg::DownloadFailed { message, .. } => Some(message.clone()),
            _ => None,
        };

        let (next, effects) = update(state, msg);
        state = next;
        runner.enqueue(effects);

        if state.consume_dirty() {
            let view = state.view();
            let (toasts, newest) = toast_lines(&view, last_toast);
            last_toast = newest;
            for line in toasts {
                writeln!(out, "{line}")?;
            }
            let frame = render(&view);
            if frame != last_frame {
                for line in &frame {
                    writeln!(out, "{line}")?;
                }
                last_frame = frame;
            }
        }

        match state.section() {
            Section::Upload if cancelled => break RunOutcome::Cancelled,
            Section::Upload if submit_attempt => break RunOutcome::Failed(refusal_message(&state)),
            Section::Error => {
                let message = state
                    .view()
                    .error_message
                    .unwrap_or_else(|| "Unknown error".to_string());
                break RunOutcome::Failed(message);
            }
            Section::Results => {
                if let Some(message) = download_failed {
                    break RunOutcome::Failed(message);
                }
                if !request.download {
                    break RunOutcome::Completed { saved_to: None };
                }
                let saved_to = state.view().results.and_then(|results| results.downloaded_to);
                if saved_to.is_some() {
                    break RunOutcome::Completed { saved_to };
                }
                if !download_requested {
                    download_requested = true;
                    let (next, effects) = update(state, Msg::DownloadClicked);
                    state = next;
                    runner.enqueue(effects);
                }
            }
            Section::Upload | Section::Progress => {}
        }
    };

    con_debug!("run finished: {:?}", outcome);
    ticker.abort();
    interrupter.abort();
    runner.shutdown().await;
    out.flush()?;
    Ok(outcome)
}

/// Error toasts raised while staging, oldest first.
fn refusal_message(state: &AppState) -> String {
    let reasons: Vec<String> = state
        .notifications()
        .items()
        .iter()
        .filter(|toast| toast.kind == NotificationKind::Error)
        .map(|toast| format!("{}: {}", toast.title, toast.message))
        .collect();
    if reasons.is_empty() {
        "Inputs were not accepted".to_string()
    } else {
        reasons.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use consolidator_client::{
        ApiError, DownloadedWorkbook, FailureKind, HealthReport, SubmitReceipt,
    };
    use consolidator_core::{JobId, JobSnapshot, JobStatus};
    use pretty_assertions::assert_eq;

    /// Accepts any upload as `job-7`, completes on the third poll.
    struct FakeBackend {
        polls: AtomicU32,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl ApiClient for FakeBackend {
        async fn submit(
            &self,
            _template: &FileHandle,
            _sources: &[FileHandle],
            _options: &ConsolidationOptions,
        ) -> Result<SubmitReceipt, ApiError> {
            Ok(SubmitReceipt {
                job_id: "job-7".to_string(),
                total_files: 2,
                message: None,
            })
        }

        async fn status(&self, job_id: &JobId) -> Result<JobSnapshot, ApiError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(error) = &self.fail_with {
                return Ok(JobSnapshot {
                    id: Some(job_id.clone()),
                    status: JobStatus::Error,
                    error: Some(error.clone()),
                    ..JobSnapshot::default()
                });
            }
            let status = if n >= 3 {
                JobStatus::Completed
            } else {
                JobStatus::Processing
            };
            Ok(JobSnapshot {
                id: Some(job_id.clone()),
                status,
                progress: if n >= 3 { 100.0 } else { f64::from(n) * 40.0 },
                processed_files: n.min(2),
                total_files: 2,
                current_file: Some(format!("source{}.xlsx", n.min(2))),
                message: Some("Processing".to_string()),
                error: None,
            })
        }

        async fn download(&self, _job_id: &JobId) -> Result<DownloadedWorkbook, ApiError> {
            Ok(DownloadedWorkbook {
                suggested_name: Some("merged.xlsx".to_string()),
                bytes: b"PK".to_vec(),
            })
        }

        async fn health(&self) -> Result<HealthReport, ApiError> {
            Err(ApiError {
                kind: FailureKind::Network,
                message: "unused".to_string(),
            })
        }
    }

    fn request(dir: &tempfile::TempDir, download: bool) -> RunRequest {
        let write = |name: &str| {
            let path = dir.path().join(name);
            fs::write(&path, b"xlsx").unwrap();
            path
        };
        RunRequest {
            template: write("template.xlsx"),
            sources: vec![write("source1.xlsx"), write("source2.xlsx")],
            options: ConsolidationOptions::default(),
            download,
        }
    }

    fn fast_polls() -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(10),
            max_ticks: 50,
        }
    }

    #[tokio::test]
    async fn completed_run_downloads_result() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("out");
        let api = Arc::new(FakeBackend {
            polls: AtomicU32::new(0),
            fail_with: None,
        });
        let mut out = Vec::new();

        let outcome = run_session(
            api,
            fast_polls(),
            output.clone(),
            request(&dir, true),
            &mut out,
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Completed {
                saved_to: Some(output.join("merged.xlsx"))
            }
        );
        assert_eq!(fs::read(output.join("merged.xlsx")).unwrap(), b"PK");
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("Successfully consolidated 2 files into one workbook"));
    }

    #[tokio::test]
    async fn server_error_ends_run_with_its_message() {
        let dir = tempfile::TempDir::new().unwrap();
        let api = Arc::new(FakeBackend {
            polls: AtomicU32::new(0),
            fail_with: Some("Template sheet missing".to_string()),
        });
        let mut out = Vec::new();

        let outcome = run_session(
            api,
            fast_polls(),
            dir.path().join("out"),
            request(&dir, true),
            &mut out,
            std::future::pending(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, RunOutcome::Failed("Template sheet missing".to_string()));
    }

    #[tokio::test]
    async fn interrupt_cancels_polling() {
        let dir = tempfile::TempDir::new().unwrap();
        let api = Arc::new(FakeBackend {
            polls: AtomicU32::new(0),
            fail_with: None,
        });
        let mut out = Vec::new();
        let slow = PollSettings {
            interval: Duration::from_secs(3600),
            max_ticks: 600,
        };

        let outcome = run_session(
            api.clone(),
            slow,
            dir.path().join("out"),
            request(&dir, false),
            &mut out,
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await
        .unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert_eq!(api.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejected_template_fails_without_submitting() {
        let dir = tempfile::TempDir::new().unwrap();
        let notes = dir.path().join("notes.csv");
        fs::write(&notes, b"a,b").unwrap();
        let request = RunRequest {
            template: notes,
            ..request(&dir, true)
        };
        let api = Arc::new(FakeBackend {
            polls: AtomicU32::new(0),
            fail_with: None,
        });
        let mut out = Vec::new();

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            run_session(
                api.clone(),
                fast_polls(),
                dir.path().join("out"),
                request,
                &mut out,
                std::future::pending(),
            ),
        )
        .await
        .expect("run should end once submit is refused")
        .unwrap();

        let RunOutcome::Failed(message) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(message.starts_with("Invalid File Type: "));
        assert!(message.contains("Missing Files"));
        assert_eq!(api.polls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn all_sources_rejected_fails_without_submitting() {
        let dir = tempfile::TempDir::new().unwrap();
        let csv = dir.path().join("jan.csv");
        fs::write(&csv, b"a,b").unwrap();
        let request = RunRequest {
            sources: vec![csv],
            ..request(&dir, true)
        };
        let api = Arc::new(FakeBackend {
            polls: AtomicU32::new(0),
            fail_with: None,
        });
        let mut out = Vec::new();

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            run_session(
                api,
                fast_polls(),
                dir.path().join("out"),
                request,
                &mut out,
                std::future::pending(),
            ),
        )
        .await
        .expect("run should end once submit is refused")
        .unwrap();

        let RunOutcome::Failed(message) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(message.starts_with("Invalid Files: "));
    }

    #[test]
    fn missing_input_file_is_reported() {
        let err = file_handle(Path::new("/no/such/dir/template.xlsx")).unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
