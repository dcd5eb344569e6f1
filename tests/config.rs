//! Loading configuration files from disk.

use std::io::Write;

use service_lifecycle::config::{load_config, load_or_default, ConfigError};
use service_lifecycle::ServiceConfig;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_file() {
    let file = write_config(
        r#"
        [http]
        port = "9000"
        request_timeout_secs = 10

        [grpc]
        enabled = true
        port = ":9001"
        reflection = false

        [shutdown]
        timeout_ms = 1500

        [observability]
        log_level = "debug"
        log_format = "json"
        "#,
    );

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.http.port, "9000");
    assert_eq!(config.http.request_timeout_secs, 10);
    assert!(config.grpc.enabled);
    assert!(!config.grpc.reflection);
    assert_eq!(config.shutdown.timeout_ms, 1500);
    assert_eq!(config.observability.log_format, "json");
}

#[test]
fn test_invalid_file_reports_every_problem() {
    let file = write_config(
        r#"
        [http]
        port = "8080"

        [grpc]
        enabled = true
        port = "8080"

        [shutdown]
        timeout_ms = 0
        "#,
    );

    match load_config(file.path()) {
        Err(ConfigError::Validation(errors)) => {
            assert_eq!(errors.len(), 2, "{:?}", errors);
        }
        other => panic!("expected validation errors, got {:?}", other),
    }
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let file = write_config("[http\nport = 1");
    assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(matches!(load_config(&path), Err(ConfigError::Io(_))));
}

#[test]
fn test_no_file_means_defaults() {
    let config = load_or_default(None, "SERVICE_LIFECYCLE_TEST_UNSET").unwrap();
    assert_eq!(config, ServiceConfig::default());
}
