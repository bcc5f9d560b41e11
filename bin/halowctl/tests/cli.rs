//! ---
//! halow_section: "08-operator-cli"
//! halow_subsection: "tests"
//! halow_type: "test"
//! halow_scope: "code"
//! halow_description: "End-to-end smoke tests for halowctl."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::fs;

use assert_cmd::Command;
use tempfile::TempDir;

fn halowctl(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("halowctl").expect("binary built");
    cmd.current_dir(dir.path())
        .env_remove("HALOW_CONFIG")
        .env("HALOW_LOG", "warn");
    cmd
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn config_show_renders_file_overrides() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("halow.toml");
    fs::write(&path, "[ota]\nmax_attempts = 5\n").expect("write config");

    let output = halowctl(&dir)
        .args(["config", "show", "--config"])
        .arg(&path)
        .output()
        .expect("run");

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("max_attempts = 5"), "{text}");
    assert!(text.contains("sensor/config"), "{text}");
}

#[test]
fn unusable_log_directory_falls_back_to_stderr_logging() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("occupied"), "").expect("write placeholder");
    let path = dir.path().join("halow.toml");
    fs::write(&path, "[logging]\ndirectory = \"occupied\"\n").expect("write config");

    let output = halowctl(&dir)
        .env_remove("RUST_LOG")
        .args(["--dry-run", "config", "sleep", "600", "--config"])
        .arg(&path)
        .output()
        .expect("run");

    assert!(output.status.success());
    assert!(stdout(&output).contains("Sleep interval sent: 600s"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("file logging unavailable"), "{stderr}");
}

#[test]
fn dry_run_sleep_reports_success() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = halowctl(&dir)
        .args(["--dry-run", "config", "sleep", "600"])
        .output()
        .expect("run");

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("dry-run: sensor/config"), "{text}");
    assert!(text.contains("Sleep interval sent: 600s"), "{text}");
}

#[test]
fn out_of_range_sleep_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = halowctl(&dir)
        .args(["--dry-run", "config", "sleep", "5"])
        .output()
        .expect("run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("outside the allowed range"), "{stderr}");
    assert!(!stdout(&output).contains("dry-run: sensor/config"));
}

#[test]
fn dry_run_ota_start_completes_and_records_metrics() {
    let dir = tempfile::tempdir().expect("tempdir");
    let metrics = dir.path().join("metrics.prom");
    let output = halowctl(&dir)
        .args(["--dry-run", "ota", "start", "--metrics"])
        .arg(&metrics)
        .output()
        .expect("run");

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("info: OTA started. Waiting for completion..."), "{text}");
    assert!(text.contains("info: OTA complete. Starting influx bridge..."), "{text}");
    assert!(text.contains("dry-run: start influx-bridge"), "{text}");
    let exported = fs::read_to_string(&metrics).expect("metrics file");
    assert!(exported.contains("ota_sessions_completed_total 1"), "{exported}");
}

#[test]
fn dry_run_upload_prints_completion_marker() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image = dir.path().join("firmware.bin");
    fs::write(&image, vec![0xA5u8; 200]).expect("write image");

    let output = halowctl(&dir)
        .args(["--dry-run", "ota", "upload"])
        .arg(&image)
        .output()
        .expect("run");

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Uploaded 200 bytes in 2 chunks"), "{text}");
    assert_eq!(text.lines().last(), Some("OTA_FINISHED"));
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    halowctl(&dir)
        .args(["config", "show", "--config", "does-not-exist.toml"])
        .assert()
        .failure();
}
