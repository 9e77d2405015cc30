use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use pipeline_cli::config::{CliConfig, LogTarget};
use pipeline_logging::LogDestination;
use pretty_assertions::assert_eq;

#[test]
fn missing_path_gives_defaults() {
    let config = CliConfig::load(None).expect("defaults");
    assert_eq!(config, CliConfig::default());
    assert_eq!(config.api_base, "http://localhost:8000");

    let policy = config.poll_policy();
    assert_eq!(policy.interval, Duration::from_secs(2));
    assert_eq!(policy.max_consecutive_failures, None);
    assert_eq!(config.client_settings().request_timeout, None);
}

#[test]
fn partial_file_keeps_other_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("pipeline.ron");
    fs::write(
        &path,
        r#"(
            api_base: "http://worker:9000",
            poll_interval_ms: 500,
            max_consecutive_poll_failures: Some(5),
            max_backoff_ms: Some(8000),
            log_destination: Both,
            log_file: "logs/pipeline.log",
        )"#,
    )
    .expect("write config");

    let config = CliConfig::load(Some(&path)).expect("load");
    assert_eq!(config.api_base, "http://worker:9000");
    assert_eq!(config.connect_timeout_ms, 10_000);
    assert_eq!(config.log_destination, LogTarget::Both);

    let policy = config.poll_policy();
    assert_eq!(policy.interval, Duration::from_millis(500));
    assert_eq!(policy.max_consecutive_failures, Some(5));
    assert_eq!(policy.max_backoff, Some(Duration::from_secs(8)));

    assert_eq!(
        config.log_destination(),
        LogDestination::Both(PathBuf::from("logs/pipeline.log"))
    );
}

#[test]
fn request_timeout_maps_to_client_settings() {
    let config = CliConfig {
        request_timeout_ms: Some(1500),
        ..CliConfig::default()
    };
    let settings = config.client_settings();
    assert_eq!(settings.request_timeout, Some(Duration::from_millis(1500)));
    assert_eq!(settings.connect_timeout, Duration::from_secs(10));
}

#[test]
fn zero_failure_cap_means_retry_forever() {
    let config = CliConfig {
        max_consecutive_poll_failures: Some(0),
        ..CliConfig::default()
    };
    assert_eq!(config.poll_policy().max_consecutive_failures, None);
}

#[test]
fn unreadable_or_invalid_files_are_errors() {
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("nope.ron");
    let err = CliConfig::load(Some(&missing)).unwrap_err();
    assert!(err.to_string().contains("reading config file"));

    let broken = dir.path().join("broken.ron");
    fs::write(&broken, "(api_base: 42)").expect("write config");
    let err = CliConfig::load(Some(&broken)).unwrap_err();
    assert!(err.to_string().contains("parsing config file"));
}
