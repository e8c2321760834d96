//! Container runtime abstraction and the CLI-backed implementation.
//!
//! The orchestrator only needs three operations from a runtime: create a
//! detached long-lived container, run a command in it, and force-remove it.
//! [`DockerCli`] drives the `docker` (or `podman`) executable; the
//! Engine-API client lives in [`super::docker_client`].

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command as ProcessCommand;
use tracing::debug;

use crate::error::DockerError;
use crate::execution::command::Command;
use crate::execution::resources::ExecutionLimits;

/// Everything a runtime needs to create one environment.
#[derive(Debug, Clone)]
pub struct ProvisionSpec {
    /// Image reference, e.g. `node:20-alpine`.
    pub image: String,
    pub limits: ExecutionLimits,
    /// Environment variables set for every command in the container.
    pub env: Vec<(String, String)>,
}

impl ProvisionSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            limits: ExecutionLimits::default(),
            env: Vec::new(),
        }
    }

    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }
}

/// Result of executing a command in a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Operations the orchestrator needs from a container runtime.
///
/// Implementations are shared across concurrent runners, so every method
/// takes `&self`. Dropping an in-flight `exec` future must stop waiting on
/// the command; the container itself is reclaimed by `remove`.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Creates and starts a detached container called `name`.
    async fn create(&self, name: &str, spec: &ProvisionSpec) -> Result<(), DockerError>;

    /// Runs one command inside the container.
    async fn exec(&self, name: &str, command: &Command) -> Result<ExecResult, DockerError>;

    /// Force-removes the container. Removing a missing container succeeds.
    async fn remove(&self, name: &str) -> Result<(), DockerError>;

    /// Short label for logs.
    fn kind(&self) -> &'static str;
}

/// Stderr fragments that mean the host is out of room for another container.
const EXHAUSTION_MARKERS: &[&str] = &[
    "no space left on device",
    "cannot allocate memory",
    "resource temporarily unavailable",
    "too many open files",
    "insufficient",
];

fn classify_create_failure(stderr: &str) -> DockerError {
    let lower = stderr.to_lowercase();
    if EXHAUSTION_MARKERS.iter().any(|m| lower.contains(m)) {
        DockerError::ResourceExhausted(stderr.trim().to_string())
    } else if lower.contains("cannot connect to the docker daemon") {
        DockerError::DaemonUnavailable(stderr.trim().to_string())
    } else {
        let reason = stderr.trim();
        DockerError::CreateFailed(if reason.is_empty() {
            "Unknown error".to_string()
        } else {
            reason.to_string()
        })
    }
}

/// Runtime that shells out to the `docker` executable (or a compatible one
/// such as `podman`).
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Checks that the runtime executable answers `version`.
    pub async fn is_available(&self) -> bool {
        ProcessCommand::new(&self.binary)
            .args(["version", "--format", "{{.Server.Version}}"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Arguments for `docker run` that start a detached, idle container.
    pub fn run_args(name: &str, spec: &ProvisionSpec) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            name.to_string(),
        ];
        args.extend(spec.limits.run_args());
        for (key, value) in &spec.env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push(spec.image.clone());
        args.push("sleep".to_string());
        args.push("infinity".to_string());
        args
    }

    /// Arguments for `docker exec` running `command` in `name`.
    pub fn exec_args(name: &str, command: &Command) -> Vec<String> {
        let mut args = vec!["exec".to_string()];
        if let Some(dir) = &command.workdir {
            args.push("-w".to_string());
            args.push(dir.clone());
        }
        for (key, value) in &command.env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push(name.to_string());
        args.extend(command.argv.iter().cloned());
        args
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn create(&self, name: &str, spec: &ProvisionSpec) -> Result<(), DockerError> {
        let output = ProcessCommand::new(&self.binary)
            .args(Self::run_args(name, spec))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| DockerError::DaemonUnavailable(format!("{}: {e}", self.binary)))?;

        if !output.status.success() {
            return Err(classify_create_failure(&String::from_utf8_lossy(
                &output.stderr,
            )));
        }

        debug!(environment = name, image = %spec.image, "Container started");
        Ok(())
    }

    async fn exec(&self, name: &str, command: &Command) -> Result<ExecResult, DockerError> {
        // kill_on_drop: when the caller's deadline fires and this future is
        // dropped, the client process goes with it.
        let output = ProcessCommand::new(&self.binary)
            .args(Self::exec_args(name, command))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DockerError::ExecFailed(format!("{}: {e}", self.binary)))?;

        Ok(ExecResult {
            exit_code: output.status.code().map(i64::from).unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn remove(&self, name: &str) -> Result<(), DockerError> {
        let output = ProcessCommand::new(&self.binary)
            .args(["rm", "-f", name])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| DockerError::RemoveFailed(format!("{}: {e}", self.binary)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No such container") || stderr.contains("no such container") {
            return Ok(());
        }
        Err(DockerError::RemoveFailed(stderr.trim().to_string()))
    }

    fn kind(&self) -> &'static str {
        "docker-cli"
    }
}
