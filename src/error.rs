//! Error types for dockhand operations.
//!
//! Defines the error types for each subsystem:
//! - Container runtime clients (Docker CLI, Docker Engine API)
//! - Execution environment handles
//! - Per-task execution outcomes
//! - Orchestrator construction and lifecycle
//! - Codebase analysis

use std::time::Duration;

use thiserror::Error;

/// Errors reported by a container runtime client.
#[derive(Debug, Error)]
pub enum DockerError {
    #[error("Container runtime not available: {0}")]
    DaemonUnavailable(String),

    #[error("Failed to create container: {0}")]
    CreateFailed(String),

    #[error("Resources exhausted while creating container: {0}")]
    ResourceExhausted(String),

    #[error("Failed to pull image '{image}': {reason}")]
    PullFailed { image: String, reason: String },

    #[error("Container '{id}' not found")]
    ContainerNotFound { id: String },

    #[error("Failed to execute command in container: {0}")]
    ExecFailed(String),

    #[error("Failed to remove container: {0}")]
    RemoveFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DockerError {
    /// Returns true if the error means the host ran out of capacity for new
    /// environments rather than the request itself being bad.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, DockerError::ResourceExhausted(_))
    }
}

/// Errors from misusing an execution environment handle.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("Environment '{name}' is {state}, expected live")]
    NotLive { name: String, state: String },

    #[error("Provisioning failed: {0}")]
    Provision(#[from] DockerError),
}

/// Per-task execution failures.
///
/// These never propagate out of the orchestrator. Their `Display` text is
/// what ends up in a result's `error_detail`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Provisioning failed: {0}")]
    Provision(String),

    #[error("Command '{command}' exited with code {exit_code}")]
    Failure { command: String, exit_code: i64 },

    #[error("Runtime error while running '{command}': {reason}")]
    Runtime { command: String, reason: String },

    #[error("Timeout: operation exceeded {}", format_limit(*.limit))]
    Timeout { limit: Duration },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Could not derive commands for task: {0}")]
    Planning(String),

    #[error("Teardown failed: {0}")]
    Teardown(String),
}

/// Formats a timeout bound in seconds, keeping sub-second precision when present.
pub fn format_limit(limit: Duration) -> String {
    if limit.subsec_nanos() == 0 {
        format!("{} seconds", limit.as_secs())
    } else {
        format!("{:.3} seconds", limit.as_secs_f64())
    }
}

/// Raised by the task runner when a task cannot be admitted because the
/// runtime has no room for another environment.
#[derive(Debug, Error)]
#[error("Admission of task '{task_id}' failed: {source}")]
pub struct AdmissionError {
    pub task_id: String,
    #[source]
    pub source: DockerError,
}

/// Errors raised by the orchestrator itself.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid capacity {0}: max_capacity must be at least 1")]
    InvalidCapacity(usize),

    #[error("Invalid image reference: {0}")]
    InvalidImage(String),

    #[error("Task ID '{0}' was submitted more than once")]
    DuplicateTaskId(String),

    #[error("Orchestrator has already been started")]
    AlreadyStarted,

    #[error("Orchestrator has not been started")]
    NotStarted,
}

/// Errors that can occur while analyzing a codebase.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Environment error: {0}")]
    Environment(#[from] EnvironmentError),

    #[error("Agent run ended with status {status}: {detail}")]
    Execution { status: String, detail: String },

    #[error("No task list found in agent output: {0}")]
    NoTaskList(String),

    #[error("Failed to parse task list: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to render prompt: {0}")]
    Prompt(#[from] tera::Error),
}
