//! Docker Engine API runtime using the bollard crate.
//!
//! Same contract as the CLI runtime, without spawning a client process per
//! command. Missing images are pulled before the container is created.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures::StreamExt;
use tracing::{debug, info};

use crate::error::DockerError;
use crate::execution::command::Command;
use crate::execution::runtime::{ContainerRuntime, ExecResult, ProvisionSpec};

/// Docker client wrapper for container operations.
pub struct DockerApi {
    docker: Docker,
}

impl DockerApi {
    /// Connects to the local Docker daemon.
    ///
    /// # Errors
    ///
    /// Returns `DockerError::DaemonUnavailable` if the Docker daemon is not accessible.
    pub fn new() -> Result<Self, DockerError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| DockerError::DaemonUnavailable(format!("Failed to connect: {e}")))?;

        Ok(Self { docker })
    }

    /// Wraps an existing bollard Docker instance.
    pub fn from_docker(docker: Docker) -> Self {
        Self { docker }
    }

    /// Checks if an image exists locally.
    pub async fn image_exists(&self, image: &str) -> bool {
        self.docker.inspect_image(image).await.is_ok()
    }

    /// Pulls an image from its registry.
    pub async fn pull_image(&self, image: &str) -> Result<(), DockerError> {
        info!(image, "Pulling image");
        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(result) = stream.next().await {
            result.map_err(|e| DockerError::PullFailed {
                image: image.to_string(),
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }

    fn host_config(spec: &ProvisionSpec) -> HostConfig {
        let limits = &spec.limits;
        HostConfig {
            memory: (limits.memory_mb > 0).then(|| limits.memory_bytes()),
            cpu_period: (limits.cpu_cores > 0.0).then(|| limits.cpu_period()),
            cpu_quota: (limits.cpu_cores > 0.0).then(|| limits.cpu_quota()),
            pids_limit: (limits.max_processes > 0).then_some(limits.max_processes as i64),
            ..Default::default()
        }
    }
}

fn map_create_error(e: bollard::errors::Error) -> DockerError {
    let message = e.to_string();
    let lower = message.to_lowercase();
    if lower.contains("no space left") || lower.contains("cannot allocate memory") {
        DockerError::ResourceExhausted(message)
    } else {
        DockerError::CreateFailed(message)
    }
}

#[async_trait]
impl ContainerRuntime for DockerApi {
    async fn create(&self, name: &str, spec: &ProvisionSpec) -> Result<(), DockerError> {
        if !self.image_exists(&spec.image).await {
            self.pull_image(&spec.image).await?;
        }

        let env: Vec<String> = spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let container_config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            env: if env.is_empty() { None } else { Some(env) },
            host_config: Some(Self::host_config(spec)),
            tty: Some(false),
            attach_stdin: Some(false),
            attach_stdout: Some(false),
            attach_stderr: Some(false),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: name.to_string(),
            platform: None,
        };

        self.docker
            .create_container(Some(options), container_config)
            .await
            .map_err(map_create_error)?;

        if let Err(e) = self
            .docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
        {
            // Created but not started: do not leave it behind.
            if let Err(cleanup) = self.remove(name).await {
                debug!(environment = name, error = %cleanup, "Cleanup after failed start");
            }
            return Err(map_create_error(e));
        }

        debug!(environment = name, image = %spec.image, "Container started");
        Ok(())
    }

    async fn exec(&self, name: &str, command: &Command) -> Result<ExecResult, DockerError> {
        let env: Vec<String> = command
            .env
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        let exec_options = CreateExecOptions {
            cmd: Some(command.argv.clone()),
            env: if env.is_empty() { None } else { Some(env) },
            working_dir: command.workdir.clone(),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(name, exec_options)
            .await
            .map_err(|e| {
                if e.to_string().contains("No such container") {
                    DockerError::ContainerNotFound {
                        id: name.to_string(),
                    }
                } else {
                    DockerError::ExecFailed(format!("Failed to create exec: {e}"))
                }
            })?;

        let start_result = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| DockerError::ExecFailed(format!("Failed to start exec: {e}")))?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        if let StartExecResults::Attached { mut output, .. } = start_result {
            while let Some(chunk) = output.next().await {
                match chunk {
                    Ok(LogOutput::StdOut { message }) => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(LogOutput::StdErr { message }) => {
                        stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        return Err(DockerError::ExecFailed(format!("Error reading output: {e}")));
                    }
                }
            }
        }

        let exec_info = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| DockerError::ExecFailed(format!("Failed to inspect exec: {e}")))?;

        Ok(ExecResult {
            exit_code: exec_info.exit_code.unwrap_or(-1),
            stdout,
            stderr,
        })
    }

    async fn remove(&self, name: &str) -> Result<(), DockerError> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };

        match self.docker.remove_container(name, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("No such container") => Ok(()),
            Err(e) => Err(DockerError::RemoveFailed(e.to_string())),
        }
    }

    fn kind(&self) -> &'static str {
        "docker-api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionLimits;

    #[test]
    fn test_host_config_applies_limits() {
        let spec = ProvisionSpec::new("python:3.12-slim")
            .with_limits(ExecutionLimits::new(1024, 2.0).with_max_processes(128));
        let host = DockerApi::host_config(&spec);

        assert_eq!(host.memory, Some(1024 * 1024 * 1024));
        assert_eq!(host.cpu_quota, Some(200_000));
        assert_eq!(host.pids_limit, Some(128));
    }

    #[test]
    fn test_host_config_unlimited() {
        let spec = ProvisionSpec::new("alpine").with_limits(ExecutionLimits::unlimited());
        let host = DockerApi::host_config(&spec);

        assert!(host.memory.is_none());
        assert!(host.cpu_quota.is_none());
        assert!(host.pids_limit.is_none());
    }
}
