//! Side channels a front end injects into the session.

use std::fmt;
use std::io;

use tracing::info;

/// A short user-facing notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// Headline, e.g. "History cleared".
    pub title: String,
    /// One sentence of detail.
    pub description: String,
}

impl Notice {
    /// Build a notice.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

/// Shows notices to the user.
pub trait Notifier: Send + Sync {
    /// Display `notice`. Must not block.
    fn notify(&self, notice: Notice);
}

/// Writes notices to the tracing log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        info!(title = %notice.title, "{}", notice.description);
    }
}

/// Discards every notice.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _notice: Notice) {}
}

/// Puts text on the system clipboard.
pub trait Clipboard: Send + Sync {
    /// Replace the clipboard contents with `text`.
    ///
    /// # Errors
    /// Returns an I/O error when the clipboard could not be written.
    fn write_text(&self, text: &str) -> io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_display() {
        let notice = Notice::new("History cleared", "Your search history has been cleared.");
        assert_eq!(
            notice.to_string(),
            "History cleared: Your search history has been cleared."
        );
    }
}
