//! Task runner: binds one task to one execution environment.
//!
//! # Architecture
//!
//! ```text
//! Task → CommandPlanner → EnvironmentHandle (provision → execute → teardown) → TaskResult
//! ```
//!
//! The runner:
//! 1. Derives a command sequence from the task
//! 2. Provisions a fresh environment
//! 3. Runs the sequence under the task deadline
//! 4. Tears the environment down and classifies the outcome

pub mod agent;
pub mod config;
pub mod executor;
pub mod planner;

pub use agent::{AgentKind, PROMPT_FILE, REPO_DIR, WORK_DIR};
pub use config::ExecutionConfig;
pub use executor::TaskRunner;
pub use planner::{AgentPlanner, CommandPlanner, ShellPlanner};
