//! ---
//! halow_section: "03-logging"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Structured logging adapters for OTA sessions and commands."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
#![warn(missing_docs)]

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for tests and development.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// OTA session identifier associated with the log event.
    pub session: Option<&'a str>,
    /// Supervised process the event refers to.
    pub process: Option<&'a str>,
    /// Polling attempt number, when inside the polling loop.
    pub attempt: Option<u32>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a session identifier.
    pub fn with_session(mut self, session: &'a str) -> Self {
        self.session = Some(session);
        self
    }

    /// Attach a supervised process name.
    pub fn with_process(mut self, process: &'a str) -> Self {
        self.process = Some(process);
        self
    }

    /// Attach a polling attempt number.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl SessionEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SessionEventOutcome::Success => "success",
            SessionEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event with a success/fault outcome.
pub fn log_session_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SessionEventOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    let session = ctx.session.unwrap_or("");
    let process = ctx.process.unwrap_or("");
    let attempt = ctx.attempt.unwrap_or_default();
    match outcome {
        SessionEventOutcome::Success => tracing::event!(
            Level::INFO,
            event = event,
            outcome = outcome.as_str(),
            session = session,
            process = process,
            attempt = attempt,
            message = %message
        ),
        SessionEventOutcome::Fault => tracing::event!(
            Level::ERROR,
            event = event,
            outcome = outcome.as_str(),
            session = session,
            process = process,
            attempt = attempt,
            message = %message
        ),
    }
}
