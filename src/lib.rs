//! dockhand: bounded-concurrency task execution in disposable containers.
//!
//! Each task runs in its own freshly provisioned environment, and the
//! orchestrator never keeps more than a configured number of environments
//! alive at once.

// Core modules
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod metrics;
pub mod orchestrator;
pub mod prompts;
pub mod runner;
pub mod task;
pub mod utils;

// Re-export commonly used types
pub use config::{AppConfig, ConfigError};
pub use error::{
    AdmissionError, AnalyzerError, DockerError, EnvironmentError, ExecutionError,
    OrchestratorError,
};
pub use orchestrator::{Orchestrator, OrchestratorState, OrchestratorStats};
pub use task::{Task, TaskResult, TaskStatus};
