//! Execution layer: container runtimes and environment lifecycle.
//!
//! # Architecture
//!
//! Environment states follow this lifecycle:
//! ```text
//! UNSTARTED → LIVE → TERMINATED
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dockhand::execution::{
//!     Command, CommandSequence, DockerCli, EnvironmentHandle, ProvisionSpec, TaskTimeout,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! let runtime = Arc::new(DockerCli::new());
//! let mut env = EnvironmentHandle::new(runtime, "dockhand-demo")
//!     .provision(&ProvisionSpec::new("alpine:3"))
//!     .await?;
//! let seq = CommandSequence::new().then(Command::shell("echo hello"));
//! let outcome = env.execute(&seq, TaskTimeout::seconds(30), &CancellationToken::new()).await?;
//! env.teardown().await;
//! ```

pub mod command;
pub mod docker_client;
pub mod environment;
pub mod resources;
pub mod runtime;
pub mod timeout;

pub use command::{Command, CommandSequence};
pub use docker_client::DockerApi;
pub use environment::{
    generate_name, EnvironmentCounters, EnvironmentHandle, ExecutionOutcome, LifecycleState,
};
pub use resources::ExecutionLimits;
pub use runtime::{ContainerRuntime, DockerCli, ExecResult, ProvisionSpec};
pub use timeout::TaskTimeout;
