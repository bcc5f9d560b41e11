//! ---
//! halow_section: "04-ota-orchestration"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Operator-facing status events and sinks."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

/// Human-readable status reported to the operator shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// Informational progress or success message.
    Info(String),
    /// Failure message.
    Error(String),
}

impl StatusEvent {
    /// Build an informational event.
    pub fn info(message: impl Into<String>) -> Self {
        StatusEvent::Info(message.into())
    }

    /// Build an error event.
    pub fn error(message: impl Into<String>) -> Self {
        StatusEvent::Error(message.into())
    }

    /// Message text regardless of severity.
    pub fn message(&self) -> &str {
        match self {
            StatusEvent::Info(message) | StatusEvent::Error(message) => message,
        }
    }

    /// Whether this event reports a failure.
    pub fn is_error(&self) -> bool {
        matches!(self, StatusEvent::Error(_))
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::Info(message) => write!(f, "info: {message}"),
            StatusEvent::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// Receiver of asynchronous status callbacks.
pub trait StatusSink: Send + Sync + 'static {
    /// Deliver one status event. Must not block.
    fn emit(&self, event: StatusEvent);
}

impl StatusSink for mpsc::UnboundedSender<StatusEvent> {
    fn emit(&self, event: StatusEvent) {
        // A closed receiver means the shell stopped listening.
        let _ = self.send(event);
    }
}

impl<T: StatusSink + ?Sized> StatusSink for Arc<T> {
    fn emit(&self, event: StatusEvent) {
        (**self).emit(event);
    }
}
