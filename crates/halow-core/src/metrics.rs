//! ---
//! halow_section: "04-ota-orchestration"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Prometheus counters for OTA sessions."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use prometheus::{IntCounter, Opts, Registry};

use crate::session::OtaStatus;

/// Prometheus metric handles for OTA session activity.
#[derive(Clone)]
pub struct OtaMetrics {
    started: IntCounter,
    rejected: IntCounter,
    completed: IntCounter,
    timed_out: IntCounter,
    failed: IntCounter,
    polls: IntCounter,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let counter = IntCounter::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl OtaMetrics {
    /// Register OTA metrics with the provided registry.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            started: counter(registry, "ota_sessions_started_total", "OTA sessions accepted")?,
            rejected: counter(
                registry,
                "ota_sessions_rejected_total",
                "OTA sessions rejected while another was in flight",
            )?,
            completed: counter(
                registry,
                "ota_sessions_completed_total",
                "OTA sessions that observed the completion marker",
            )?,
            timed_out: counter(
                registry,
                "ota_sessions_timed_out_total",
                "OTA sessions that exhausted the polling budget",
            )?,
            failed: counter(registry, "ota_sessions_failed_total", "OTA sessions that failed")?,
            polls: counter(registry, "ota_log_polls_total", "Log fetches performed")?,
        })
    }

    /// Record an accepted session.
    pub fn observe_started(&self) {
        self.started.inc();
    }

    /// Record a rejected session.
    pub fn observe_rejected(&self) {
        self.rejected.inc();
    }

    /// Record one log fetch.
    pub fn observe_poll(&self) {
        self.polls.inc();
    }

    /// Record a terminal status.
    pub fn observe_terminal(&self, status: OtaStatus) {
        match status {
            OtaStatus::Completed => self.completed.inc(),
            OtaStatus::TimedOut => self.timed_out.inc(),
            OtaStatus::Failed => self.failed.inc(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_map_to_counters() {
        let registry = Registry::new();
        let metrics = OtaMetrics::register(&registry).expect("register metrics");
        metrics.observe_started();
        metrics.observe_poll();
        metrics.observe_poll();
        metrics.observe_terminal(OtaStatus::TimedOut);
        metrics.observe_terminal(OtaStatus::Polling);

        let value = |name: &str| {
            registry
                .gather()
                .iter()
                .find(|f| f.get_name() == name)
                .map(|f| f.get_metric()[0].get_counter().get_value())
        };
        assert_eq!(value("ota_log_polls_total"), Some(2.0));
        assert_eq!(value("ota_sessions_timed_out_total"), Some(1.0));
        assert_eq!(value("ota_sessions_completed_total"), Some(0.0));
    }
}
