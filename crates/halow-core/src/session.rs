//! ---
//! halow_section: "04-ota-orchestration"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "OTA session state machine."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::orchestrator::OtaSettings;

/// Lifecycle status of one OTA session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OtaStatus {
    /// Created, nothing invoked yet.
    Idle,
    /// Launch of the update process requested.
    Started,
    /// Waiting for the completion marker.
    Polling,
    /// Marker observed; downstream start requested.
    Completed,
    /// Attempt budget exhausted without the marker.
    TimedOut,
    /// Launch or polling failed.
    Failed,
}

impl OtaStatus {
    /// Whether the session can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OtaStatus::Completed | OtaStatus::TimedOut | OtaStatus::Failed
        )
    }

    /// Stable lowercase label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            OtaStatus::Idle => "idle",
            OtaStatus::Started => "started",
            OtaStatus::Polling => "polling",
            OtaStatus::Completed => "completed",
            OtaStatus::TimedOut => "timed_out",
            OtaStatus::Failed => "failed",
        }
    }

    fn can_transition_to(self, next: OtaStatus) -> bool {
        use OtaStatus::*;
        match (self, next) {
            (Idle, Started) | (Started, Polling) => true,
            (Polling, Completed) | (Polling, TimedOut) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for OtaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected session operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The requested transition is not part of the state machine.
    #[error("invalid OTA session transition {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: OtaStatus,
        /// Requested status.
        to: OtaStatus,
    },
    /// Another polling cycle was requested after the budget ran out.
    #[error("polling budget of {max_attempts} attempts exhausted")]
    BudgetExhausted {
        /// Configured bound.
        max_attempts: u32,
    },
}

/// Summary produced once a session reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaReport {
    /// Session identifier.
    pub session_id: Uuid,
    /// Terminal status.
    pub status: OtaStatus,
    /// Number of log fetches performed.
    pub attempts: u32,
    /// Failure detail for `Failed`/`TimedOut` sessions.
    pub detail: Option<String>,
    /// When the session was created.
    pub started_at: DateTime<Utc>,
    /// When the terminal status was reached.
    pub finished_at: Option<DateTime<Utc>>,
}

/// Transient state of one `start_ota` invocation.
#[derive(Debug, Clone)]
pub struct OtaSession {
    id: Uuid,
    status: OtaStatus,
    attempt: u32,
    max_attempts: u32,
    poll_interval: Duration,
    completion_marker: String,
    detail: Option<String>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl OtaSession {
    /// Create an idle session bound to the given settings.
    pub fn new(settings: &OtaSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: OtaStatus::Idle,
            attempt: 0,
            max_attempts: settings.max_attempts,
            poll_interval: settings.poll_interval,
            completion_marker: settings.completion_marker.clone(),
            detail: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current status.
    pub fn status(&self) -> OtaStatus {
        self.status
    }

    /// Polling cycles performed so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Configured polling bound.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between polling cycles.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn transition(&mut self, next: OtaStatus) -> Result<(), SessionError> {
        if !self.status.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// `Idle -> Started`.
    pub fn mark_started(&mut self) -> Result<(), SessionError> {
        self.transition(OtaStatus::Started)
    }

    /// `Started -> Polling`.
    pub fn begin_polling(&mut self) -> Result<(), SessionError> {
        self.transition(OtaStatus::Polling)
    }

    /// Count one more polling cycle, returning its 1-based number.
    pub fn begin_attempt(&mut self) -> Result<u32, SessionError> {
        if self.status != OtaStatus::Polling {
            return Err(SessionError::InvalidTransition {
                from: self.status,
                to: OtaStatus::Polling,
            });
        }
        if self.attempt >= self.max_attempts {
            return Err(SessionError::BudgetExhausted {
                max_attempts: self.max_attempts,
            });
        }
        self.attempt += 1;
        Ok(self.attempt)
    }

    /// Whether another polling cycle may still run.
    pub fn has_budget(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Literal substring match of the completion marker.
    pub fn marker_observed(&self, logs: &str) -> bool {
        logs.contains(&self.completion_marker)
    }

    /// `Polling -> Completed`. Requires at least one polling cycle.
    pub fn complete(&mut self) -> Result<(), SessionError> {
        if self.attempt == 0 {
            return Err(SessionError::InvalidTransition {
                from: self.status,
                to: OtaStatus::Completed,
            });
        }
        self.transition(OtaStatus::Completed)
    }

    /// `Polling -> TimedOut`. Only legal once the budget is spent.
    pub fn time_out(&mut self, detail: impl Into<String>) -> Result<(), SessionError> {
        if self.has_budget() {
            return Err(SessionError::InvalidTransition {
                from: self.status,
                to: OtaStatus::TimedOut,
            });
        }
        self.transition(OtaStatus::TimedOut)?;
        self.detail = Some(detail.into());
        Ok(())
    }

    /// Any non-terminal status `-> Failed`.
    pub fn fail(&mut self, detail: impl Into<String>) -> Result<(), SessionError> {
        self.transition(OtaStatus::Failed)?;
        self.detail = Some(detail.into());
        Ok(())
    }

    /// Snapshot the session as a report.
    pub fn report(&self) -> OtaReport {
        OtaReport {
            session_id: self.id,
            status: self.status,
            attempts: self.attempt,
            detail: self.detail.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(max_attempts: u32) -> OtaSettings {
        OtaSettings {
            max_attempts,
            ..OtaSettings::default()
        }
    }

    #[test]
    fn happy_path_reaches_completed() {
        let mut session = OtaSession::new(&settings(60));
        session.mark_started().unwrap();
        session.begin_polling().unwrap();
        assert_eq!(session.begin_attempt().unwrap(), 1);
        assert!(session.marker_observed("0|ota-bridge | OTA_FINISHED\n"));
        session.complete().unwrap();

        let report = session.report();
        assert_eq!(report.status, OtaStatus::Completed);
        assert_eq!(report.attempts, 1);
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn attempts_never_exceed_bound() {
        let mut session = OtaSession::new(&settings(2));
        session.mark_started().unwrap();
        session.begin_polling().unwrap();
        session.begin_attempt().unwrap();
        assert!(session.has_budget());
        session.begin_attempt().unwrap();
        assert!(!session.has_budget());
        assert_eq!(
            session.begin_attempt(),
            Err(SessionError::BudgetExhausted { max_attempts: 2 })
        );
        assert_eq!(session.attempt(), 2);
        session.time_out("OTA did not complete in time.").unwrap();
        assert_eq!(session.status(), OtaStatus::TimedOut);
    }

    #[test]
    fn timeout_rejected_while_budget_remains() {
        let mut session = OtaSession::new(&settings(3));
        session.mark_started().unwrap();
        session.begin_polling().unwrap();
        session.begin_attempt().unwrap();
        assert!(session.time_out("too early").is_err());
        assert_eq!(session.status(), OtaStatus::Polling);
    }

    #[test]
    fn completion_requires_a_polling_cycle() {
        let mut session = OtaSession::new(&settings(3));
        session.mark_started().unwrap();
        session.begin_polling().unwrap();
        assert!(session.complete().is_err());
    }

    #[test]
    fn launch_failure_from_started() {
        let mut session = OtaSession::new(&settings(3));
        session.mark_started().unwrap();
        session.fail("Script not found").unwrap();
        let report = session.report();
        assert_eq!(report.status, OtaStatus::Failed);
        assert_eq!(report.attempts, 0);
        assert_eq!(report.detail.as_deref(), Some("Script not found"));
    }

    #[test]
    fn terminal_states_are_final() {
        let mut session = OtaSession::new(&settings(1));
        session.mark_started().unwrap();
        session.begin_polling().unwrap();
        session.begin_attempt().unwrap();
        session.complete().unwrap();
        assert!(session.fail("late failure").is_err());
        assert!(session.begin_polling().is_err());
        assert_eq!(session.status(), OtaStatus::Completed);
    }

    #[test]
    fn polling_cannot_be_skipped() {
        let mut session = OtaSession::new(&settings(1));
        assert!(session.begin_polling().is_err());
        assert!(session.begin_attempt().is_err());
        assert_eq!(session.status(), OtaStatus::Idle);
    }
}
