//! User-facing notifications for request outcomes.
//!
//! The session reports mutation results through a `Notifier`; what the
//! user actually sees (a toast, a status line, a log) is up to the
//! implementation. No retry, queueing or dedup happens here.

use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
    Info,
    Warning,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Level::Success => "success",
            Level::Error => "error",
            Level::Info => "info",
            Level::Warning => "warning",
        };
        f.write_str(label)
    }
}

pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
}

/// Writes every notification to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        tracing::info!(level = %Level::Success, "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(level = %Level::Error, "{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!(level = %Level::Info, "{message}");
    }

    fn warning(&self, message: &str) {
        tracing::warn!(level = %Level::Warning, "{message}");
    }
}

/// Keeps every notification in arrival order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(Level, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, level: Level, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((level, message.to_string()));
    }

    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Returns the recorded notifications and forgets them.
    pub fn drain(&self) -> Vec<(Level, String)> {
        std::mem::take(&mut *self.messages.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.push(Level::Success, message);
    }

    fn error(&self, message: &str) {
        self.push(Level::Error, message);
    }

    fn info(&self, message: &str) {
        self.push(Level::Info, message);
    }

    fn warning(&self, message: &str) {
        self.push(Level::Warning, message);
    }
}
