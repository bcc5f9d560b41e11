//! ---
//! halow_section: "06-process-supervision"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Process supervisor capability contract and error taxonomy."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
//! Narrow capability contract over an external process manager.
//!
//! The orchestrator only ever starts a named process and reads back the tail
//! of its output; everything else about supervision stays with the process
//! manager itself.
#![warn(missing_docs)]

use std::time::Duration;

use async_trait::async_trait;

pub mod pm2;

pub use pm2::Pm2Supervisor;

/// Shared result type for supervisor operations.
pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Failures reported by a [`ProcessSupervisor`].
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The process manager refused or failed to start the process.
    #[error("failed to start process '{process}': {detail}")]
    LaunchFailed {
        /// Name of the process that was requested.
        process: String,
        /// Diagnostic output from the process manager.
        detail: String,
    },
    /// Log retrieval returned a failure status.
    #[error("failed to fetch logs for '{process}': {detail}")]
    LogsUnavailable {
        /// Name of the process whose logs were requested.
        process: String,
        /// Diagnostic output from the process manager.
        detail: String,
    },
    /// The process manager command did not finish within the configured bound.
    #[error("supervisor command `{command}` timed out after {timeout:?}")]
    Timeout {
        /// Rendered command line.
        command: String,
        /// Bound that elapsed.
        timeout: Duration,
    },
    /// The process manager executable could not be spawned.
    #[error("unable to run supervisor command `{command}`: {source}")]
    Spawn {
        /// Rendered command line.
        command: String,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
}

impl SupervisorError {
    /// Human-readable detail without the error-kind prefix.
    pub fn detail(&self) -> String {
        match self {
            SupervisorError::LaunchFailed { detail, .. }
            | SupervisorError::LogsUnavailable { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

/// Capability to start named processes and read their recent output.
#[async_trait]
pub trait ProcessSupervisor: Send + Sync + 'static {
    /// Start (or restart) the named process.
    async fn start(&self, process: &str) -> Result<()>;

    /// Return the most recent `lines` lines of output produced by the process.
    async fn fetch_recent_logs(&self, process: &str, lines: usize) -> Result<String>;

    /// Human-readable backend name for logging.
    fn name(&self) -> &'static str;
}
