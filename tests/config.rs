//! Configuration loading from YAML files.

use std::fs;

use dockhand::config::{AppConfig, ConfigError, RuntimeKind};
use dockhand::execution::TaskTimeout;
use dockhand::prompts::WorkStyle;
use dockhand::runner::AgentKind;

#[test]
fn test_partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dockhand.yaml");
    fs::write(
        &path,
        "max_containers: 8\nimage: node:20-alpine\nagent: claude-code\nwork_style: qa_tester\n",
    )
    .unwrap();

    let config = AppConfig::from_file(&path).unwrap();

    assert_eq!(config.max_containers, 8);
    assert_eq!(config.image, "node:20-alpine");
    assert_eq!(config.agent, AgentKind::ClaudeCode);
    assert_eq!(config.work_style, WorkStyle::QaTester);
    assert_eq!(config.timeout_secs, Some(300));
    assert_eq!(config.memory_mb, 512);
    assert_eq!(config.runtime, RuntimeKind::Cli);
    assert!(config.validate().is_ok());
}

#[test]
fn test_null_timeout_means_unlimited() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dockhand.yaml");
    fs::write(&path, "timeout_secs: null\nruntime: api\n").unwrap();

    let config = AppConfig::from_file(&path).unwrap();

    assert_eq!(config.task_timeout(), TaskTimeout::Unlimited);
    assert_eq!(config.runtime, RuntimeKind::Api);
    assert_eq!(config.execution_config().timeout, TaskTimeout::Unlimited);
}

#[test]
fn test_file_values_can_fail_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dockhand.yaml");
    fs::write(&path, "max_tasks: 2\nmin_tasks: 5\n").unwrap();

    let config = AppConfig::from_file(&path).unwrap();
    let err = config.validate().unwrap_err();

    assert!(matches!(err, ConfigError::ValidationFailed(_)));
}

#[test]
fn test_malformed_file_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dockhand.yaml");
    fs::write(&path, "max_containers: [not, a, number]\n").unwrap();

    let err = AppConfig::from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_missing_file_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");

    let err = AppConfig::from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
    assert!(err.to_string().contains("absent.yaml"));
}
