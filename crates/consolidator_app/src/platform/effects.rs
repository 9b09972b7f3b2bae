use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use consolidator_client::{
    ApiClient, ApiError, AtomicFileWriter, ChannelObserver, FailureKind, PollerHandle,
    StatusPoller,
};
use consolidator_core::{Effect, JobId, Msg, PollSettings, SUBMISSION_FALLBACK};
use consolidator_logging::{con_info, con_warn};
use tokio::sync::mpsc::UnboundedSender;

/// Executes core effects and feeds their results back as messages.
pub struct EffectRunner {
    api: Arc<dyn ApiClient>,
    poller: StatusPoller,
    writer: Arc<AtomicFileWriter>,
    msg_tx: UnboundedSender<Msg>,
    pollers: HashMap<JobId, PollerHandle>,
}

impl EffectRunner {
    pub fn new(
        api: Arc<dyn ApiClient>,
        poll_settings: PollSettings,
        output_dir: PathBuf,
        msg_tx: UnboundedSender<Msg>,
    ) -> Self {
        Self {
            poller: StatusPoller::new(api.clone(), poll_settings),
            api,
            writer: Arc::new(AtomicFileWriter::new(output_dir)),
            msg_tx,
            pollers: HashMap::new(),
        }
    }

    pub fn enqueue(&mut self, effects: Vec<Effect>) {
        self.pollers.retain(|_, handle| !handle.is_finished());
        for effect in effects {
            match effect {
                Effect::SubmitJob {
                    submission,
                    template,
                    sources,
                    options,
                } => {
                    let api = self.api.clone();
                    let tx = self.msg_tx.clone();
                    tokio::spawn(async move {
                        let msg = match api.submit(&template, &sources, &options).await {
                            Ok(receipt) => {
                                let total_files = if receipt.total_files > 0 {
                                    receipt.total_files
                                } else {
                                    sources.len() as u32
                                };
                                Msg::SubmitAccepted {
                                    submission,
                                    job_id: JobId::new(receipt.job_id),
                                    total_files,
                                }
                            }
                            Err(err) => {
                                con_warn!("submission {} failed: {}", submission, err);
                                Msg::SubmitFailed {
                                    submission,
                                    message: submission_message(&err),
                                }
                            }
                        };
                        let _ = tx.send(msg);
                    });
                }
                Effect::StartPolling { job_id } => {
                    let observer = Arc::new(ChannelObserver::new(self.msg_tx.clone()));
                    let handle = self.poller.start(job_id.clone(), observer);
                    if let Some(previous) = self.pollers.insert(job_id, handle) {
                        previous.stop();
                    }
                }
                Effect::StopPolling { job_id } => {
                    if let Some(handle) = self.pollers.remove(&job_id) {
                        con_info!("stopping poller for {}", job_id);
                        handle.stop();
                    }
                }
                Effect::DownloadResult { job_id, path } => {
                    con_info!("downloading {} from {}", job_id, path);
                    let api = self.api.clone();
                    let writer = self.writer.clone();
                    let tx = self.msg_tx.clone();
                    tokio::spawn(async move {
                        let msg = match download_to_disk(api, writer, &job_id).await {
                            Ok(path) => Msg::DownloadFinished { job_id, path },
                            Err(message) => {
                                con_warn!("download for {} failed: {}", job_id, message);
                                Msg::DownloadFailed { job_id, message }
                            }
                        };
                        let _ = tx.send(msg);
                    });
                }
            }
        }
    }

    /// Stops every live poller and waits for them to wind down.
    pub async fn shutdown(self) {
        for (_, handle) in self.pollers {
            handle.stop();
            handle.join().await;
        }
    }
}

async fn download_to_disk(
    api: Arc<dyn ApiClient>,
    writer: Arc<AtomicFileWriter>,
    job_id: &JobId,
) -> Result<PathBuf, String> {
    let workbook = api.download(job_id).await.map_err(|err| err.message)?;
    let today = Local::now().date_naive();
    tokio::task::spawn_blocking(move || writer.save_workbook(&workbook, today))
        .await
        .map_err(|err| err.to_string())?
        .map_err(|err| err.to_string())
}

/// Backend rejections carry their own text; anything else gets the generic line.
fn submission_message(err: &ApiError) -> String {
    match err.kind {
        FailureKind::Rejected { .. } => err.message.clone(),
        _ => format!("{SUBMISSION_FALLBACK}: {}", err.message),
    }
}
