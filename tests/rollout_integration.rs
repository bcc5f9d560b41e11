//! ---
//! halow_section: "09-integration"
//! halow_subsection: "tests"
//! halow_type: "test"
//! halow_scope: "code"
//! halow_description: "Configuration-driven rollout followed by a fleet reconfiguration."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use halow_common::AppConfig;
use halow_core::{
    CommandSettings, ConfigCommandHandler, OtaOrchestrator, OtaSettings, OtaStatus, StatusEvent,
};
use halow_msg::InMemoryPublisher;
use halow_testharness::{CollectingSink, ScriptedSupervisor};

const SITE_CONFIG: &str = r#"
[topics]
config = "site-a/sensor/config"

[ota]
process_name = "site-a-ota"
downstream_process = "site-a-influx"
completion_marker = "FLASH_DONE"
max_attempts = 10
poll_interval = 5

[sleep]
min_seconds = 30
max_seconds = 7200
"#;

#[tokio::test(start_paused = true)]
async fn configured_rollout_then_reconfigure_fleet() {
    let config: AppConfig = SITE_CONFIG.parse().expect("valid config");
    let settings = OtaSettings::from(&config.ota);
    assert_eq!(settings.poll_interval, Duration::from_secs(5));

    let supervisor = ScriptedSupervisor::new().complete_on_attempt(4, "FLASH_DONE");
    let orchestrator = OtaOrchestrator::new(settings, Arc::new(supervisor.clone()));
    let sink = CollectingSink::new();
    let started = tokio::time::Instant::now();

    let report = orchestrator
        .start_ota(sink.clone())
        .expect("accepted")
        .wait()
        .await
        .expect("joined");

    assert_eq!(report.status, OtaStatus::Completed);
    assert_eq!(report.attempts, 4);
    assert!(started.elapsed() >= Duration::from_secs(15));
    assert_eq!(supervisor.start_count("site-a-ota"), 1);
    assert_eq!(supervisor.start_count("site-a-influx"), 1);
    assert_eq!(sink.errors(), Vec::<String>::new());

    let publisher = InMemoryPublisher::new();
    let handler = ConfigCommandHandler::new(
        Arc::new(publisher.clone()),
        CommandSettings::from_config(&config),
    );
    assert!(handler.send_sleep_interval(20).await.is_error());
    assert_eq!(
        handler.send_sleep_interval(3600).await,
        StatusEvent::info("Sleep interval sent: 3600s")
    );
    let messages = publisher.take();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].topic, "site-a/sensor/config");
    assert_eq!(messages[0].payload_str(), r#"{"sleep":3600}"#);
}

#[tokio::test(start_paused = true)]
async fn reduced_budget_times_out_without_cascading() {
    let config: AppConfig = "[ota]\nmax_attempts = 3\npoll_interval = 1\n"
        .parse()
        .expect("valid config");
    let supervisor = ScriptedSupervisor::new();
    let orchestrator =
        OtaOrchestrator::new(OtaSettings::from(&config.ota), Arc::new(supervisor.clone()));
    let sink = CollectingSink::new();

    let report = orchestrator
        .start_ota(sink.clone())
        .expect("accepted")
        .wait()
        .await
        .expect("joined");

    assert_eq!(report.status, OtaStatus::TimedOut);
    assert_eq!(supervisor.fetch_count(), 3);
    assert_eq!(supervisor.start_count("influx-bridge"), 0);
    assert_eq!(sink.errors(), vec!["OTA did not complete in time."]);
}
