use consolidator_core::{AppViewModel, Notification, Section};

const BAR_WIDTH: usize = 30;

/// Lines describing the visible section. Toasts are rendered separately so
/// each one is printed once.
pub fn render(view: &AppViewModel) -> Vec<String> {
    let mut lines = Vec::new();
    match view.section {
        Section::Upload => {
            match &view.template {
                Some(row) => lines.push(format!("Template: {} ({})", row.name, row.size_label)),
                None => lines.push("Template: (none)".to_string()),
            }
            lines.push(format!("Sources: {}", view.sources.len()));
            for (index, row) in view.sources.iter().enumerate() {
                lines.push(format!("  {}. {} ({})", index + 1, row.name, row.size_label));
            }
            let ready = if view.submit_enabled { "ready" } else { "not ready" };
            lines.push(format!("Submit: {ready}"));
        }
        Section::Progress => {
            let progress = &view.progress;
            lines.push(format!(
                "[{}] {:>3}%  {}/{} files",
                progress_bar(progress.percent),
                progress.percent,
                progress.processed_files,
                progress.total_files
            ));
            lines.push(progress.status_text.clone());
            if let Some(current) = &progress.current_file {
                lines.push(format!("Current: {current}"));
            }
            if let Some(elapsed) = &progress.elapsed_label {
                lines.push(elapsed.clone());
            }
            for item in &progress.processed_log {
                lines.push(format!("Processed: {item}"));
            }
        }
        Section::Results => {
            if let Some(results) = &view.results {
                lines.push(results.message.clone());
                lines.push(format!("Processing time: {}", results.process_time_label));
                match &results.downloaded_to {
                    Some(path) => lines.push(format!("Saved to {}", path.display())),
                    None => lines.push(format!("Download: {}", results.download_url)),
                }
            }
        }
        Section::Error => {
            let message = view.error_message.as_deref().unwrap_or("Unknown error");
            lines.push(format!("Consolidation failed: {message}"));
        }
    }
    lines
}

/// Toasts newer than `last_shown`, with the highest id rendered.
pub fn toast_lines(view: &AppViewModel, last_shown: u64) -> (Vec<String>, u64) {
    let fresh: Vec<&Notification> = view
        .notifications
        .iter()
        .filter(|toast| toast.id > last_shown)
        .collect();
    let newest = fresh.iter().map(|toast| toast.id).max().unwrap_or(last_shown);
    let lines = fresh
        .into_iter()
        .map(|toast| format!("{} {}: {}", toast.kind.icon(), toast.title, toast.message))
        .collect();
    (lines, newest)
}

fn progress_bar(percent: u32) -> String {
    let filled = (percent.min(100) as usize * BAR_WIDTH) / 100;
    format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}
