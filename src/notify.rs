//! User-facing notifications.
//!
//! The core never notifies anyone itself; CLI commands report success,
//! failure and long-running work through a [`Notifier`].

use std::sync::atomic::{AtomicU64, Ordering};

use colored::Colorize;

/// Identifies a pending loading notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToastId(u64);

/// Notification sink.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);

    fn error(&self, message: &str);

    /// Show a pending notification and return a handle to settle it.
    fn loading(&self, message: &str) -> ToastId;

    /// Replace the text of a pending notification.
    fn update(&self, id: ToastId, message: &str);

    /// Remove a pending notification without a final message.
    fn dismiss(&self, id: ToastId);
}

/// Prints notifications to stderr.
///
/// Silent in quiet mode so stdout stays clean for piped JSON.
#[derive(Debug, Default)]
pub struct TerminalNotifier {
    quiet: bool,
    next_id: AtomicU64,
}

impl TerminalNotifier {
    #[must_use]
    pub const fn new(quiet: bool) -> Self {
        Self {
            quiet,
            next_id: AtomicU64::new(1),
        }
    }
}

impl Notifier for TerminalNotifier {
    fn success(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {message}", "✓".green());
        }
    }

    fn error(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {message}", "✗".red());
        }
    }

    fn loading(&self, message: &str) -> ToastId {
        let id = ToastId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if !self.quiet {
            eprintln!("{} {message}", "…".dimmed());
        }
        id
    }

    fn update(&self, _id: ToastId, message: &str) {
        if !self.quiet {
            eprintln!("  {}", message.dimmed());
        }
    }

    fn dismiss(&self, _id: ToastId) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{Notifier, ToastId};
    use std::sync::Mutex;

    /// Records every notification as `kind:message`.
    #[derive(Default)]
    pub struct Recorder {
        pub events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        pub fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    impl Notifier for Recorder {
        fn success(&self, message: &str) {
            self.push(format!("success:{message}"));
        }

        fn error(&self, message: &str) {
            self.push(format!("error:{message}"));
        }

        fn loading(&self, message: &str) -> ToastId {
            self.push(format!("loading:{message}"));
            ToastId(0)
        }

        fn update(&self, _id: ToastId, message: &str) {
            self.push(format!("update:{message}"));
        }

        fn dismiss(&self, _id: ToastId) {
            self.push("dismiss".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_ids_are_distinct() {
        let notifier = TerminalNotifier::new(true);
        let a = notifier.loading("Exporting orders");
        let b = notifier.loading("Exporting partners");
        assert_ne!(a, b);
    }
}
