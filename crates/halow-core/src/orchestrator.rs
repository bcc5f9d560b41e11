//! ---
//! halow_section: "04-ota-orchestration"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "OTA rollout orchestration kernel."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use halow_common::config::OtaConfig;
use halow_logging::{log_session_event, LogContext, SessionEventOutcome};
use halow_supervisor::{ProcessSupervisor, SupervisorError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, warn};
use uuid::Uuid;

use crate::metrics::OtaMetrics;
use crate::session::{OtaReport, OtaSession, OtaStatus, SessionError};
use crate::status::{StatusEvent, StatusSink};

/// Reported once the update process is running.
pub const MSG_OTA_STARTED: &str = "OTA started. Waiting for completion...";
/// Reported when the completion marker is observed.
pub const MSG_OTA_COMPLETE: &str = "OTA complete. Starting influx bridge...";
/// Reported when the polling budget runs out.
pub const MSG_OTA_TIMEOUT: &str = "OTA did not complete in time.";
/// Reported for an invocation rejected by the session guard.
pub const MSG_OTA_BUSY: &str = "OTA already in progress.";

/// Immutable orchestration parameters, derived from the `[ota]` configuration section.
#[derive(Debug, Clone)]
pub struct OtaSettings {
    /// Supervised process that performs the update.
    pub process_name: String,
    /// Supervised process started once the update completes.
    pub downstream_process: String,
    /// Literal searched for in the update process output.
    pub completion_marker: String,
    /// Maximum number of log fetches.
    pub max_attempts: u32,
    /// Delay between log fetches.
    pub poll_interval: Duration,
    /// Number of trailing log lines fetched per cycle.
    pub log_lines: usize,
    /// Disable the session guard and allow overlapping sessions.
    pub allow_concurrent_sessions: bool,
}

impl From<&OtaConfig> for OtaSettings {
    fn from(config: &OtaConfig) -> Self {
        Self {
            process_name: config.process_name.clone(),
            downstream_process: config.downstream_process.clone(),
            completion_marker: config.completion_marker.clone(),
            max_attempts: config.max_attempts,
            poll_interval: config.poll_interval,
            log_lines: config.log_lines,
            allow_concurrent_sessions: config.allow_concurrent_sessions,
        }
    }
}

impl Default for OtaSettings {
    fn default() -> Self {
        Self::from(&OtaConfig::default())
    }
}

/// Errors returned to the caller of [`OtaOrchestrator::start_ota`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Another session holds the guard.
    #[error("an OTA session is already in progress")]
    SessionInFlight,
    /// The session task could not be joined.
    #[error("OTA session task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Failures that end a session as [`OtaStatus::Failed`].
#[derive(Debug, Error)]
enum SessionFailure {
    #[error("Failed to start OTA bridge:\n{}", .0.detail())]
    Launch(SupervisorError),
    #[error("{0}")]
    Supervisor(SupervisorError),
    #[error(transparent)]
    State(#[from] SessionError),
}

#[derive(Debug, Default)]
struct SessionGuard {
    in_flight: AtomicBool,
}

impl SessionGuard {
    fn try_acquire(self: &Arc<Self>) -> Option<SessionPermit> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SessionPermit {
                guard: Arc::clone(self),
            })
    }

    fn is_held(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Released on drop, including when the session task unwinds.
#[derive(Debug)]
struct SessionPermit {
    guard: Arc<SessionGuard>,
}

impl Drop for SessionPermit {
    fn drop(&mut self) {
        self.guard.in_flight.store(false, Ordering::Release);
    }
}

/// Handle to a running session. Dropping it detaches the session, which still
/// runs to its terminal status.
#[derive(Debug)]
pub struct OtaHandle {
    session_id: Uuid,
    task: JoinHandle<OtaReport>,
}

impl OtaHandle {
    /// Identifier of the session, as it appears in the logs.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Wait for the terminal report.
    pub async fn wait(self) -> Result<OtaReport, OrchestratorError> {
        Ok(self.task.await?)
    }
}

/// Drives OTA sessions against a process supervisor.
pub struct OtaOrchestrator {
    settings: Arc<OtaSettings>,
    supervisor: Arc<dyn ProcessSupervisor>,
    guard: Arc<SessionGuard>,
    metrics: Option<OtaMetrics>,
}

impl OtaOrchestrator {
    /// Create an orchestrator over the given supervisor.
    ///
    /// Every session performs at least one log fetch and asks for at least
    /// one line, so a zero `max_attempts` or `log_lines` is raised to one.
    pub fn new(mut settings: OtaSettings, supervisor: Arc<dyn ProcessSupervisor>) -> Self {
        if settings.max_attempts == 0 || settings.log_lines == 0 {
            warn!(
                max_attempts = settings.max_attempts,
                log_lines = settings.log_lines,
                "zero polling settings raised to one"
            );
            settings.max_attempts = settings.max_attempts.max(1);
            settings.log_lines = settings.log_lines.max(1);
        }
        Self {
            settings: Arc::new(settings),
            supervisor,
            guard: Arc::new(SessionGuard::default()),
            metrics: None,
        }
    }

    /// Record session metrics into `metrics`.
    pub fn with_metrics(mut self, metrics: OtaMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Whether a guarded session is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.guard.is_held()
    }

    /// Start an OTA session on a background task and return immediately.
    ///
    /// `sink` receives zero or more informational events followed by exactly
    /// one terminal event. A rejected invocation also receives exactly one
    /// error event. Must be called from within a tokio runtime.
    pub fn start_ota<S: StatusSink>(&self, sink: S) -> Result<OtaHandle, OrchestratorError> {
        let sink: Arc<dyn StatusSink> = Arc::new(sink);
        let permit = if self.settings.allow_concurrent_sessions {
            None
        } else {
            match self.guard.try_acquire() {
                Some(permit) => Some(permit),
                None => {
                    warn!(process = %self.settings.process_name, "OTA start rejected; session in flight");
                    if let Some(metrics) = &self.metrics {
                        metrics.observe_rejected();
                    }
                    sink.emit(StatusEvent::error(MSG_OTA_BUSY));
                    return Err(OrchestratorError::SessionInFlight);
                }
            }
        };

        let session = OtaSession::new(&self.settings);
        let session_id = session.id();
        let mut fallback = session.report();
        if let Some(metrics) = &self.metrics {
            metrics.observe_started();
        }

        let runner = SessionRunner {
            settings: Arc::clone(&self.settings),
            supervisor: Arc::clone(&self.supervisor),
            sink: Arc::clone(&sink),
            metrics: self.metrics.clone(),
        };
        let task = tokio::spawn(async move {
            let _permit = permit;
            match tokio::spawn(runner.run(session)).await {
                Ok(report) => report,
                Err(err) => {
                    let detail = format!("OTA session aborted: {err}");
                    error!(session = %session_id, error = %err, "OTA session task aborted");
                    sink.emit(StatusEvent::error(detail.clone()));
                    fallback.status = OtaStatus::Failed;
                    fallback.detail = Some(detail);
                    fallback.finished_at = Some(chrono::Utc::now());
                    fallback
                }
            }
        });

        Ok(OtaHandle { session_id, task })
    }
}

struct SessionRunner {
    settings: Arc<OtaSettings>,
    supervisor: Arc<dyn ProcessSupervisor>,
    sink: Arc<dyn StatusSink>,
    metrics: Option<OtaMetrics>,
}

impl SessionRunner {
    async fn run(self, mut session: OtaSession) -> OtaReport {
        let session_id = session.id().to_string();
        let ctx = LogContext::new()
            .with_session(&session_id)
            .with_process(&self.settings.process_name);

        if let Err(failure) = self.drive(&mut session, &ctx).await {
            let detail = failure.to_string();
            match session.fail(detail.clone()) {
                Ok(()) => self.sink.emit(StatusEvent::error(detail)),
                // Terminal status already reported; never report twice.
                Err(err) => halow_logging::ota_error!(
                    context = ctx,
                    "failure after terminal status ({}): {}",
                    err,
                    detail
                ),
            }
        }

        let report = session.report();
        let outcome = match report.status {
            OtaStatus::Completed => SessionEventOutcome::Success,
            _ => SessionEventOutcome::Fault,
        };
        let summary = format!(
            "OTA session {} after {} of {} attempts",
            report.status,
            report.attempts,
            session.max_attempts()
        );
        log_session_event(Some(&ctx), "ota.session", &summary, outcome);
        if let Some(metrics) = &self.metrics {
            metrics.observe_terminal(report.status);
        }
        report
    }

    async fn drive(
        &self,
        session: &mut OtaSession,
        ctx: &LogContext<'_>,
    ) -> Result<(), SessionFailure> {
        let settings = &self.settings;

        session.mark_started()?;
        halow_logging::ota_info!(context = ctx, "starting OTA process");
        self.supervisor
            .start(&settings.process_name)
            .await
            .map_err(SessionFailure::Launch)?;
        self.sink.emit(StatusEvent::info(MSG_OTA_STARTED));
        session.begin_polling()?;

        loop {
            let attempt = session.begin_attempt()?;
            let attempt_ctx = ctx.clone().with_attempt(attempt);
            let logs = self
                .supervisor
                .fetch_recent_logs(&settings.process_name, settings.log_lines)
                .await
                .map_err(SessionFailure::Supervisor)?;
            if let Some(metrics) = &self.metrics {
                metrics.observe_poll();
            }

            if session.marker_observed(&logs) {
                session.complete()?;
                halow_logging::ota_info!(context = attempt_ctx, "completion marker observed");
                self.sink.emit(StatusEvent::info(MSG_OTA_COMPLETE));
                if let Err(err) = self.supervisor.start(&settings.downstream_process).await {
                    halow_logging::ota_warn!(
                        context = attempt_ctx,
                        "downstream process {} did not start: {}",
                        settings.downstream_process,
                        err
                    );
                }
                return Ok(());
            }

            if !session.has_budget() {
                session.time_out(MSG_OTA_TIMEOUT)?;
                self.sink.emit(StatusEvent::error(MSG_OTA_TIMEOUT));
                return Ok(());
            }

            halow_logging::ota_debug!(
                context = attempt_ctx,
                "completion marker not yet observed; next poll in {:?}",
                session.poll_interval()
            );
            tokio::time::sleep(session.poll_interval()).await;
        }
    }
}
