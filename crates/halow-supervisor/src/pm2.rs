//! ---
//! halow_section: "06-process-supervision"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "pm2-backed process supervisor client."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use halow_common::config::SupervisorConfig;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{ProcessSupervisor, Result, SupervisorError};

/// Supervisor client driving the `pm2` command line.
#[derive(Debug, Clone)]
pub struct Pm2Supervisor {
    binary: String,
    command_timeout: Duration,
}

impl Pm2Supervisor {
    /// Create a client for the given executable.
    pub fn new(binary: impl Into<String>, command_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            command_timeout,
        }
    }

    /// Create a client from the `[supervisor]` configuration section.
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(config.binary.clone(), config.command_timeout)
    }

    async fn run(&self, args: &[&str]) -> Result<Output> {
        let rendered = format!("{} {}", self.binary, args.join(" "));
        debug!(command = %rendered, "invoking supervisor");

        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(self.command_timeout, command.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(source)) => Err(SupervisorError::Spawn {
                command: rendered,
                source,
            }),
            Err(_) => {
                warn!(command = %rendered, timeout = ?self.command_timeout, "supervisor command timed out");
                Err(SupervisorError::Timeout {
                    command: rendered,
                    timeout: self.command_timeout,
                })
            }
        }
    }
}

/// Prefer stderr for diagnostics, falling back to stdout and finally the exit status.
fn failure_detail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        return stderr.trim_end().to_owned();
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        return stdout.trim_end().to_owned();
    }
    format!("exited with {}", output.status)
}

#[async_trait]
impl ProcessSupervisor for Pm2Supervisor {
    async fn start(&self, process: &str) -> Result<()> {
        let output = self.run(&["start", process]).await?;
        if !output.status.success() {
            return Err(SupervisorError::LaunchFailed {
                process: process.to_owned(),
                detail: failure_detail(&output),
            });
        }
        debug!(process, "process started");
        Ok(())
    }

    async fn fetch_recent_logs(&self, process: &str, lines: usize) -> Result<String> {
        // Without --nostream pm2 keeps tailing and never exits.
        let lines = lines.to_string();
        let output = self
            .run(&["logs", process, "--lines", &lines, "--nostream"])
            .await?;
        if !output.status.success() {
            return Err(SupervisorError::LogsUnavailable {
                process: process.to_owned(),
                detail: failure_detail(&output),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn name(&self) -> &'static str {
        "pm2"
    }
}
