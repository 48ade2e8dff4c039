//! Transient user notifications ("toasts").

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// How long a toast stays visible unless told otherwise.
pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Info,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Info => "info",
            Severity::Warning => "warning",
        };
        f.write_str(label)
    }
}

/// Sink for user-visible notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str);
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _severity: Severity, _message: &str) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    pub duration: Duration,
    shown_at: Instant,
}

impl Toast {
    pub fn is_expired(&self) -> bool {
        self.shown_at.elapsed() >= self.duration
    }
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: u64,
    toasts: Vec<Toast>,
}

/// An in-process toast list. Cloning shares the same queue.
///
/// Expired toasts are dropped lazily whenever the queue is read.
#[derive(Debug, Clone, Default)]
pub struct ToastQueue {
    state: Arc<Mutex<QueueState>>,
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&self, message: impl Into<String>, severity: Severity, duration: Duration) -> u64 {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.toasts.push(Toast {
            id,
            message: message.into(),
            severity,
            duration,
            shown_at: Instant::now(),
        });
        id
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.show(message, Severity::Success, DEFAULT_TOAST_DURATION)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.show(message, Severity::Error, DEFAULT_TOAST_DURATION)
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.show(message, Severity::Info, DEFAULT_TOAST_DURATION)
    }

    pub fn warning(&self, message: impl Into<String>) -> u64 {
        self.show(message, Severity::Warning, DEFAULT_TOAST_DURATION)
    }

    /// Dismiss a toast early. Returns false if it was already gone.
    pub fn remove(&self, id: u64) -> bool {
        let mut state = self.state.lock();
        let before = state.toasts.len();
        state.toasts.retain(|t| t.id != id);
        state.toasts.len() != before
    }

    /// Toasts that are still visible.
    pub fn active(&self) -> Vec<Toast> {
        let mut state = self.state.lock();
        state.toasts.retain(|t| !t.is_expired());
        state.toasts.clone()
    }

    /// Take every queued toast, expired or not.
    pub fn drain(&self) -> Vec<Toast> {
        std::mem::take(&mut self.state.lock().toasts)
    }

    pub fn len(&self) -> usize {
        self.state.lock().toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for ToastQueue {
    fn notify(&self, severity: Severity, message: &str) {
        self.show(message, severity, DEFAULT_TOAST_DURATION);
    }
}
