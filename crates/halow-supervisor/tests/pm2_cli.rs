//! ---
//! halow_section: "06-process-supervision"
//! halow_subsection: "tests"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "pm2 client against a scripted stand-in executable."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use halow_supervisor::{Pm2Supervisor, ProcessSupervisor, SupervisorError};

const FAKE_PM2: &str = r#"#!/bin/sh
case "$1" in
  start)
    if [ "$2" = "broken" ]; then
      echo "[PM2][ERROR] Script not found: broken" >&2
      exit 1
    fi
    echo "[PM2] Starting $2"
    ;;
  logs)
    if [ "$2" = "unknown" ]; then
      echo "[PM2][ERROR] Process unknown not found" >&2
      exit 1
    fi
    if [ "$2" = "slow" ]; then
      sleep 5
    fi
    echo "args: $*"
    echo "0|ota-bridge | OTA_FINISHED"
    ;;
esac
"#;

fn install_script(dir: &Path) -> String {
    let path = dir.join("pm2");
    fs::write(&path, FAKE_PM2).expect("write script");
    let mut perms = fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod");
    path.display().to_string()
}

// Single test so the script is written once before any process is spawned.
#[tokio::test]
async fn pm2_client_maps_exit_status_and_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let binary = install_script(dir.path());
    let supervisor = Pm2Supervisor::new(binary.clone(), Duration::from_secs(5));

    supervisor.start("ota-bridge").await.expect("start succeeds");

    let err = supervisor.start("broken").await.expect_err("start fails");
    match err {
        SupervisorError::LaunchFailed { process, detail } => {
            assert_eq!(process, "broken");
            assert_eq!(detail, "[PM2][ERROR] Script not found: broken");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let logs = supervisor
        .fetch_recent_logs("ota-bridge", 50)
        .await
        .expect("logs available");
    assert!(logs.contains("args: logs ota-bridge --lines 50 --nostream"));
    assert!(logs.contains("OTA_FINISHED"));

    let err = supervisor
        .fetch_recent_logs("unknown", 50)
        .await
        .expect_err("logs unavailable");
    assert!(matches!(err, SupervisorError::LogsUnavailable { .. }));

    let impatient = Pm2Supervisor::new(binary, Duration::from_millis(200));
    let err = impatient
        .fetch_recent_logs("slow", 50)
        .await
        .expect_err("command times out");
    assert!(matches!(err, SupervisorError::Timeout { .. }));

    let missing = Pm2Supervisor::new(
        dir.path().join("does-not-exist").display().to_string(),
        Duration::from_secs(1),
    );
    let err = missing.start("ota-bridge").await.expect_err("spawn fails");
    assert!(matches!(err, SupervisorError::Spawn { .. }));
}
