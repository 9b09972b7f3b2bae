use std::time::Duration;

pub const NOTIFICATION_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
}

impl NotificationKind {
    pub fn icon(self) -> &'static str {
        match self {
            NotificationKind::Success => "✓",
            NotificationKind::Error => "✕",
            NotificationKind::Warning => "⚠",
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            NotificationKind::Success => "toast-success",
            NotificationKind::Error => "toast-error",
            NotificationKind::Warning => "toast-warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    remaining: Duration,
}

impl Notification {
    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Toast fragment; title and message are escaped.
    pub fn markup(&self) -> String {
        format!(
            "<div class=\"toast {}\"><div class=\"toast-icon\">{}</div><div class=\"toast-content\"><div class=\"toast-title\">{}</div><div class=\"toast-message\">{}</div></div></div>",
            self.kind.css_class(),
            self.kind.icon(),
            escape_markup(&self.title),
            escape_markup(&self.message)
        )
    }
}

/// Concurrently visible toasts, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotificationQueue {
    next_id: u64,
    items: Vec<Notification>,
}

impl NotificationQueue {
    pub fn notify(
        &mut self,
        title: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationKind,
    ) -> u64 {
        self.next_id += 1;
        self.items.push(Notification {
            id: self.next_id,
            title: title.into(),
            message: message.into(),
            kind,
            remaining: NOTIFICATION_TTL,
        });
        self.next_id
    }

    /// Ages every toast by `elapsed` and drops the expired ones.
    /// Returns whether anything was dismissed.
    pub fn advance(&mut self, elapsed: Duration) -> bool {
        let before = self.items.len();
        for item in &mut self.items {
            item.remaining = item.remaining.saturating_sub(elapsed);
        }
        self.items.retain(|item| !item.remaining.is_zero());
        before != self.items.len()
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}
