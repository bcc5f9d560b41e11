//! ---
//! halow_section: "01-core-functionality"
//! halow_subsection: "tests"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Configuration loading from disk."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::fs;
use std::time::Duration;

use halow_common::config::AppConfig;
use tempfile::tempdir;

#[test]
fn first_existing_candidate_wins() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("missing.toml");
    let present = dir.path().join("halow.toml");
    fs::write(
        &present,
        r#"
        [broker]
        host = "192.168.1.137"

        [topics]
        config = "fleet/config"

        [ota]
        poll_interval = 5
        "#,
    )
    .expect("write config");

    let loaded = AppConfig::load_or_default(&[missing, present.clone()]).expect("load");
    assert_eq!(loaded.source.as_deref(), Some(present.as_path()));
    assert_eq!(loaded.config.broker.host, "192.168.1.137");
    assert_eq!(loaded.config.topics.config, "fleet/config");
    assert_eq!(loaded.config.ota.poll_interval, Duration::from_secs(5));
}

#[test]
fn defaults_apply_when_nothing_exists() {
    let dir = tempdir().expect("tempdir");
    let loaded = AppConfig::load_or_default(&[dir.path().join("absent.toml")]).expect("load");
    assert!(loaded.source.is_none());
    assert_eq!(loaded.config.ota.max_attempts, 60);
}

#[test]
fn strict_load_requires_a_file() {
    let dir = tempdir().expect("tempdir");
    let err = AppConfig::load(&[dir.path().join("absent.toml")]).expect_err("no file");
    assert!(err.to_string().contains("no configuration files found"));
}

#[test]
fn invalid_file_reports_path() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[upload]\nchunk_size = 0\n").expect("write config");
    let err = AppConfig::load_or_default(&[path]).expect_err("invalid chunk size");
    assert!(err.to_string().contains("chunk_size"));
}
