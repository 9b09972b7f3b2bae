use std::path::PathBuf;
use std::time::{Duration, Instant};

use consolidator_logging::{con_debug, con_info};

use crate::view_model::{
    format_duration, format_file_size, AppViewModel, FileRowView, ProgressView, ResultsView,
};
use crate::{
    AddSourcesOutcome, ConsolidationOptions, FileHandle, JobId, JobSnapshot, NotificationKind,
    NotificationQueue, SessionError, StagedInputs, SubmissionId,
};

/// The four mutually exclusive screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Section {
    #[default]
    Upload,
    Progress,
    Results,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
struct ActiveJob {
    id: JobId,
    accepted_files: u32,
    snapshot: Option<JobSnapshot>,
    polling: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct Completion {
    files_count: u32,
    elapsed: Duration,
}

/// Whole client session. Replaced wholesale by `update`; `reset` discards
/// everything tied to the current job in one step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    staged: StagedInputs,
    options: ConsolidationOptions,
    section: Section,
    next_submission: SubmissionId,
    pending_submission: Option<SubmissionId>,
    submitted_sources: u32,
    job: Option<ActiveJob>,
    submitted_at: Option<Instant>,
    clock: Option<Instant>,
    processed_log: Vec<String>,
    completion: Option<Completion>,
    error_message: Option<String>,
    downloaded_to: Option<PathBuf>,
    notifications: NotificationQueue,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn staged(&self) -> &StagedInputs {
        &self.staged
    }

    pub fn options(&self) -> ConsolidationOptions {
        self.options
    }

    pub fn current_job_id(&self) -> Option<&JobId> {
        self.job.as_ref().map(|job| &job.id)
    }

    pub fn snapshot(&self) -> Option<&JobSnapshot> {
        self.job.as_ref().and_then(|job| job.snapshot.as_ref())
    }

    pub fn is_polling(&self) -> bool {
        self.job.as_ref().is_some_and(|job| job.polling)
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// The only way to change the visible section.
    pub(crate) fn show(&mut self, section: Section) {
        if self.section != section {
            con_debug!("section {:?} -> {:?}", self.section, section);
        }
        self.section = section;
        self.mark_dirty();
    }

    pub(crate) fn notify(&mut self, title: &str, message: impl Into<String>, kind: NotificationKind) {
        self.notifications.notify(title, message, kind);
        self.mark_dirty();
    }

    pub(crate) fn set_template(&mut self, file: FileHandle) -> Result<(), SessionError> {
        let name = file.name.clone();
        match self.staged.set_template(file) {
            Ok(()) => {
                self.notify("Template Added", name, NotificationKind::Success);
                Ok(())
            }
            Err(err) => {
                self.notify(
                    "Invalid File Type",
                    "Please select a valid Excel file (.xlsx or .xls)",
                    NotificationKind::Error,
                );
                Err(err)
            }
        }
    }

    pub(crate) fn clear_template(&mut self) {
        self.staged.clear_template();
        self.mark_dirty();
    }

    pub(crate) fn add_sources(&mut self, files: Vec<FileHandle>) -> AddSourcesOutcome {
        let outcome = self.staged.add_sources(files);
        if outcome.added > 0 {
            self.notify(
                "Files Added",
                format!("{} file(s) added successfully", outcome.added),
                NotificationKind::Success,
            );
        } else if outcome.duplicates > 0 {
            self.notify(
                "Duplicate Files",
                "These files were already added",
                NotificationKind::Warning,
            );
        } else {
            self.notify(
                "Invalid Files",
                "Please select valid Excel files (.xlsx or .xls)",
                NotificationKind::Error,
            );
        }
        outcome
    }

    pub(crate) fn remove_source(&mut self, index: usize) {
        if let Some(removed) = self.staged.remove_source(index) {
            self.notify("File Removed", removed.name, NotificationKind::Warning);
        }
    }

    pub(crate) fn set_options(&mut self, options: ConsolidationOptions) {
        if self.options != options {
            self.options = options;
            self.mark_dirty();
        }
    }

    /// Moves to the progress section and hands out a new submission id.
    pub(crate) fn begin_submission(
        &mut self,
        at: Instant,
    ) -> Option<(SubmissionId, FileHandle, Vec<FileHandle>)> {
        let template = self.staged.template()?.clone();
        if self.staged.sources().is_empty() {
            return None;
        }
        let sources = self.staged.sources().to_vec();
        self.next_submission += 1;
        let submission = self.next_submission;
        self.pending_submission = Some(submission);
        self.submitted_sources = sources.len() as u32;
        self.submitted_at = Some(at);
        self.clock = Some(at);
        self.processed_log.clear();
        self.show(Section::Progress);
        Some((submission, template, sources))
    }

    pub(crate) fn is_pending_submission(&self, submission: SubmissionId) -> bool {
        self.pending_submission == Some(submission)
    }

    pub(crate) fn accept_submission(&mut self, job_id: JobId, total_files: u32) {
        con_info!("job {} accepted with {} file(s)", job_id, total_files);
        self.pending_submission = None;
        self.staged.clear();
        self.job = Some(ActiveJob {
            id: job_id,
            accepted_files: total_files,
            snapshot: None,
            polling: true,
        });
        self.notify(
            "Processing Started",
            format!("Processing {total_files} files..."),
            NotificationKind::Success,
        );
    }

    pub(crate) fn reject_submission(&mut self, message: String) {
        self.pending_submission = None;
        self.fail(SessionError::Submission(message));
    }

    /// True when `job_id` belongs to the live polling session.
    pub(crate) fn is_current_poll(&self, job_id: &JobId) -> bool {
        self.job
            .as_ref()
            .is_some_and(|job| job.polling && &job.id == job_id)
    }

    pub(crate) fn apply_snapshot(&mut self, snapshot: JobSnapshot) {
        if let Some(current) = snapshot.current_file.as_deref() {
            let already_logged = self.processed_log.iter().any(|item| item == current);
            if !already_logged && snapshot.processed_files > 0 {
                self.processed_log.push(current.to_string());
            }
        }
        if let Some(job) = self.job.as_mut() {
            job.snapshot = Some(snapshot);
        }
        self.mark_dirty();
    }

    pub(crate) fn complete(&mut self, snapshot: JobSnapshot) {
        self.apply_snapshot(snapshot);
        let files_count = match self.snapshot().map(|s| s.total_files) {
            Some(total) if total > 0 => total,
            _ => self.submitted_sources,
        };
        let elapsed = self.elapsed().unwrap_or_default();
        if let Some(job) = self.job.as_mut() {
            job.polling = false;
        }
        self.completion = Some(Completion {
            files_count,
            elapsed,
        });
        self.show(Section::Results);
        self.notify(
            "Consolidation Complete!",
            "Your file is ready to download",
            NotificationKind::Success,
        );
    }

    /// Terminal failure: stop tracking the poll and show the error section.
    /// Returns the job whose poller must be cancelled, if any.
    pub(crate) fn fail(&mut self, error: SessionError) -> Option<JobId> {
        con_info!("session failed: {}", error);
        let mut stop = None;
        if let Some(job) = self.job.as_mut() {
            if job.polling {
                job.polling = false;
                stop = Some(job.id.clone());
            }
        }
        self.error_message = Some(error.to_string());
        self.show(Section::Error);
        stop
    }

    pub(crate) fn finish_poll(&mut self) {
        if let Some(job) = self.job.as_mut() {
            job.polling = false;
        }
    }

    pub(crate) fn download_target(&self) -> Option<JobId> {
        match (&self.job, self.section) {
            (Some(job), Section::Results) => Some(job.id.clone()),
            _ => None,
        }
    }

    pub(crate) fn set_downloaded(&mut self, path: PathBuf) {
        self.notify(
            "Download Saved",
            path.display().to_string(),
            NotificationKind::Success,
        );
        self.downloaded_to = Some(path);
    }

    /// Clears everything tied to the current job and staging. Options, toasts,
    /// the clock and the submission counter survive so late replies stay detectable.
    /// Returns the job whose poller must be cancelled, if any.
    pub(crate) fn reset(&mut self) -> Option<JobId> {
        let stop = self
            .job
            .as_ref()
            .filter(|job| job.polling)
            .map(|job| job.id.clone());
        *self = Self {
            options: self.options,
            next_submission: self.next_submission,
            clock: self.clock,
            notifications: std::mem::take(&mut self.notifications),
            ..Self::default()
        };
        self.show(Section::Upload);
        stop
    }

    pub(crate) fn tick(&mut self, now: Instant) {
        let elapsed = self
            .clock
            .map(|previous| now.saturating_duration_since(previous))
            .unwrap_or_default();
        self.clock = Some(now);
        if self.notifications.advance(elapsed) || self.section == Section::Progress {
            self.mark_dirty();
        }
    }

    fn elapsed(&self) -> Option<Duration> {
        match (self.submitted_at, self.clock) {
            (Some(start), Some(now)) => Some(now.saturating_duration_since(start)),
            _ => None,
        }
    }

    pub fn view(&self) -> AppViewModel {
        let template = self.staged.template().map(FileRowView::from_handle);
        let sources = self
            .staged
            .sources()
            .iter()
            .map(FileRowView::from_handle)
            .collect();

        let snapshot = self.snapshot();
        let progress = ProgressView {
            total_files: snapshot
                .map(|s| s.total_files)
                .filter(|total| *total > 0)
                .or(self.job.as_ref().map(|job| job.accepted_files))
                .unwrap_or(self.submitted_sources),
            processed_files: snapshot.map(|s| s.processed_files).unwrap_or(0),
            percent: snapshot.map(JobSnapshot::progress_percent).unwrap_or(0),
            status_text: snapshot
                .and_then(|s| s.message.clone())
                .unwrap_or_else(|| "Processing...".to_string()),
            current_file: snapshot.and_then(|s| s.current_file.clone()),
            processed_log: self.processed_log.clone(),
            elapsed_label: self
                .elapsed()
                .map(|elapsed| format!("Elapsed time: {}", format_duration(elapsed.as_secs()))),
        };

        let results = match (&self.completion, &self.job) {
            (Some(done), Some(job)) => Some(ResultsView {
                files_count: done.files_count,
                message: format!(
                    "Successfully consolidated {} files into one workbook",
                    done.files_count
                ),
                process_time_label: format_duration(done.elapsed.as_secs()),
                download_url: job.id.download_path(),
                download_enabled: self.section == Section::Results,
                downloaded_to: self.downloaded_to.clone(),
            }),
            _ => None,
        };

        AppViewModel {
            section: self.section,
            template,
            sources,
            submit_enabled: self.staged.can_submit(),
            options: self.options,
            job_id: self.current_job_id().cloned(),
            progress,
            results,
            error_message: self.error_message.clone(),
            notifications: self.notifications.items().to_vec(),
            dirty: self.dirty,
        }
    }
}

impl FileRowView {
    fn from_handle(file: &FileHandle) -> Self {
        Self {
            name: file.name.clone(),
            size_label: format_file_size(file.size),
        }
    }
}
