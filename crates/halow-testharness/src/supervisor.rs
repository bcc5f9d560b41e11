//! ---
//! halow_section: "07-test-harness"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Process supervisor with scripted launch and log behaviour."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use halow_supervisor::{ProcessSupervisor, Result, SupervisorError};
use parking_lot::Mutex;
use tracing::debug;

/// One recorded supervisor invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorCall {
    /// `start(process)`.
    Start(String),
    /// `fetch_recent_logs(process, lines)`.
    FetchLogs {
        /// Process whose logs were requested.
        process: String,
        /// Requested tail length.
        lines: usize,
    },
}

#[derive(Debug, Clone)]
enum LogStep {
    Output(String),
    Fail(String),
}

#[derive(Debug, Default)]
struct Script {
    start_failures: HashMap<String, String>,
    steps: HashMap<u32, LogStep>,
    marker_from: Option<(u32, String)>,
    calls: Vec<SupervisorCall>,
    fetches: u32,
}

/// Supervisor whose responses are scripted per process and per log fetch.
///
/// Unless scripted otherwise every start succeeds and every fetch returns
/// progress output without a completion marker. Clones share the script and
/// the call record.
#[derive(Debug, Default, Clone)]
pub struct ScriptedSupervisor {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSupervisor {
    /// Supervisor where every call succeeds and the marker never appears.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `start(process)` fail with `detail`.
    pub fn fail_start(self, process: &str, detail: &str) -> Self {
        self.script
            .lock()
            .start_failures
            .insert(process.to_owned(), detail.to_owned());
        self
    }

    /// Include `marker` in the output of fetch number `attempt` and every later one.
    pub fn complete_on_attempt(self, attempt: u32, marker: &str) -> Self {
        self.script.lock().marker_from = Some((attempt, marker.to_owned()));
        self
    }

    /// Return exactly `output` from fetch number `attempt`.
    pub fn output_on_attempt(self, attempt: u32, output: &str) -> Self {
        self.script
            .lock()
            .steps
            .insert(attempt, LogStep::Output(output.to_owned()));
        self
    }

    /// Fail fetch number `attempt` with `detail`.
    pub fn fail_fetch_on_attempt(self, attempt: u32, detail: &str) -> Self {
        self.script
            .lock()
            .steps
            .insert(attempt, LogStep::Fail(detail.to_owned()));
        self
    }

    /// Every invocation so far, in order.
    pub fn calls(&self) -> Vec<SupervisorCall> {
        self.script.lock().calls.clone()
    }

    /// Number of `start` invocations for `process`.
    pub fn start_count(&self, process: &str) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, SupervisorCall::Start(name) if name == process))
            .count()
    }

    /// Number of log fetches so far.
    pub fn fetch_count(&self) -> u32 {
        self.script.lock().fetches
    }
}

#[async_trait]
impl ProcessSupervisor for ScriptedSupervisor {
    async fn start(&self, process: &str) -> Result<()> {
        let mut script = self.script.lock();
        script.calls.push(SupervisorCall::Start(process.to_owned()));
        debug!(process, "scripted start");
        match script.start_failures.get(process) {
            Some(detail) => Err(SupervisorError::LaunchFailed {
                process: process.to_owned(),
                detail: detail.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn fetch_recent_logs(&self, process: &str, lines: usize) -> Result<String> {
        let mut script = self.script.lock();
        script.calls.push(SupervisorCall::FetchLogs {
            process: process.to_owned(),
            lines,
        });
        script.fetches += 1;
        let fetch = script.fetches;

        match script.steps.get(&fetch) {
            Some(LogStep::Output(output)) => return Ok(output.clone()),
            Some(LogStep::Fail(detail)) => {
                return Err(SupervisorError::LogsUnavailable {
                    process: process.to_owned(),
                    detail: detail.clone(),
                })
            }
            None => {}
        }

        let mut output = format!("0|{process} | uploading image, pass {fetch}\n");
        if let Some((from, marker)) = &script.marker_from {
            if fetch >= *from {
                output.push_str(&format!("0|{process} | {marker}\n"));
            }
        }
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn marker_appears_from_scripted_attempt() {
        let supervisor = ScriptedSupervisor::new().complete_on_attempt(2, "OTA_FINISHED");
        let first = supervisor.fetch_recent_logs("ota-bridge", 50).await.unwrap();
        let second = supervisor.fetch_recent_logs("ota-bridge", 50).await.unwrap();
        assert!(!first.contains("OTA_FINISHED"));
        assert!(second.contains("OTA_FINISHED"));
        assert_eq!(supervisor.fetch_count(), 2);
    }

    #[tokio::test]
    async fn clones_share_the_call_record() {
        let supervisor = ScriptedSupervisor::new().fail_start("ota-bridge", "Script not found");
        let observer = supervisor.clone();
        assert!(supervisor.start("ota-bridge").await.is_err());
        assert!(supervisor.start("influx-bridge").await.is_ok());
        assert_eq!(observer.start_count("ota-bridge"), 1);
        assert_eq!(
            observer.calls()[1],
            SupervisorCall::Start("influx-bridge".into())
        );
    }
}
