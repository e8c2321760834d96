//! Application configuration.
//!
//! Layers, lowest to highest: built-in defaults, an optional YAML file,
//! `DOCKHAND_*` environment variables, then CLI flags (applied by the
//! binary).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::execution::{ExecutionLimits, TaskTimeout};
use crate::prompts::{coding_style, work_style_description, WorkStyle};
use crate::runner::{AgentKind, ExecutionConfig};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable or flag has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Which container runtime client to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// Shell out to the docker (or podman) executable.
    #[default]
    Cli,
    /// Talk to the Docker Engine API directly.
    Api,
}

impl std::str::FromStr for RuntimeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cli" => Ok(RuntimeKind::Cli),
            "api" => Ok(RuntimeKind::Api),
            other => Err(format!("Unknown runtime: {} (expected cli or api)", other)),
        }
    }
}

impl std::fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeKind::Cli => write!(f, "cli"),
            RuntimeKind::Api => write!(f, "api"),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Coding agent used by `analyze` and agent-driven runs.
    pub agent: AgentKind,
    /// Maximum number of simultaneously live containers.
    pub max_containers: usize,
    /// Image every container is created from.
    pub image: String,
    /// Per-task timeout in seconds. `None` means no limit.
    pub timeout_secs: Option<u64>,
    pub memory_mb: u64,
    pub cpu_cores: f64,
    /// Upper bound on tasks the analyzer keeps.
    pub max_tasks: usize,
    pub min_tasks: usize,
    pub work_style: WorkStyle,
    /// Free-form persona replacing the work style description.
    pub custom_work_style: Option<String>,
    /// 0 (conservative) to 3 (aggressive).
    pub coding_style_level: u8,
    pub runtime: RuntimeKind,
    /// Executable used by the CLI runtime.
    pub docker_binary: String,
    /// Prefix for container names.
    pub name_prefix: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent: AgentKind::GeminiCli,
            max_containers: 5,
            image: "ubuntu:latest".to_string(),
            timeout_secs: Some(300),
            memory_mb: 512,
            cpu_cores: 1.0,
            max_tasks: 10,
            min_tasks: 1,
            work_style: WorkStyle::Default,
            custom_work_style: None,
            coding_style_level: 0,
            runtime: RuntimeKind::Cli,
            docker_binary: "docker".to_string(),
            name_prefix: "dockhand".to_string(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a YAML file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `DOCKHAND_*` overrides read through `lookup`.
    ///
    /// # Environment Variables
    ///
    /// - `DOCKHAND_AGENT`: gemini-cli, claude-code or codex
    /// - `DOCKHAND_MAX_CONTAINERS`: maximum live containers
    /// - `DOCKHAND_IMAGE`: container image
    /// - `DOCKHAND_TIMEOUT_SECS`: per-task timeout, or `none`
    /// - `DOCKHAND_MEMORY_MB`: memory per container
    /// - `DOCKHAND_CPU_CORES`: CPU cores per container
    /// - `DOCKHAND_MAX_TASKS` / `DOCKHAND_MIN_TASKS`: analyzer task bounds
    /// - `DOCKHAND_WORK_STYLE`: work style name
    /// - `DOCKHAND_CODING_STYLE`: coding style level
    /// - `DOCKHAND_RUNTIME`: cli or api
    /// - `DOCKHAND_DOCKER_BINARY`: executable for the CLI runtime
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("DOCKHAND_AGENT") {
            self.agent = parse_value(&val, "DOCKHAND_AGENT")?;
        }
        if let Some(val) = lookup("DOCKHAND_MAX_CONTAINERS") {
            self.max_containers = parse_value(&val, "DOCKHAND_MAX_CONTAINERS")?;
        }
        if let Some(val) = lookup("DOCKHAND_IMAGE") {
            self.image = val;
        }
        if let Some(val) = lookup("DOCKHAND_TIMEOUT_SECS") {
            self.timeout_secs = match val.trim().to_lowercase().as_str() {
                "none" | "unlimited" => None,
                _ => Some(parse_value(&val, "DOCKHAND_TIMEOUT_SECS")?),
            };
        }
        if let Some(val) = lookup("DOCKHAND_MEMORY_MB") {
            self.memory_mb = parse_value(&val, "DOCKHAND_MEMORY_MB")?;
        }
        if let Some(val) = lookup("DOCKHAND_CPU_CORES") {
            self.cpu_cores = parse_value(&val, "DOCKHAND_CPU_CORES")?;
        }
        if let Some(val) = lookup("DOCKHAND_MAX_TASKS") {
            self.max_tasks = parse_value(&val, "DOCKHAND_MAX_TASKS")?;
        }
        if let Some(val) = lookup("DOCKHAND_MIN_TASKS") {
            self.min_tasks = parse_value(&val, "DOCKHAND_MIN_TASKS")?;
        }
        if let Some(val) = lookup("DOCKHAND_WORK_STYLE") {
            self.work_style = parse_value(&val, "DOCKHAND_WORK_STYLE")?;
        }
        if let Some(val) = lookup("DOCKHAND_CODING_STYLE") {
            self.coding_style_level = parse_value(&val, "DOCKHAND_CODING_STYLE")?;
        }
        if let Some(val) = lookup("DOCKHAND_RUNTIME") {
            self.runtime = parse_value(&val, "DOCKHAND_RUNTIME")?;
        }
        if let Some(val) = lookup("DOCKHAND_DOCKER_BINARY") {
            self.docker_binary = val;
        }
        Ok(self)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_containers == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_containers must be greater than 0".to_string(),
            ));
        }

        if self.image.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "image cannot be empty".to_string(),
            ));
        }

        if self.timeout_secs == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.memory_mb < 64 {
            return Err(ConfigError::ValidationFailed(
                "memory_mb must be at least 64 MB".to_string(),
            ));
        }

        if self.cpu_cores <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "cpu_cores must be greater than 0".to_string(),
            ));
        }

        if self.min_tasks > self.max_tasks {
            return Err(ConfigError::ValidationFailed(
                "min_tasks cannot exceed max_tasks".to_string(),
            ));
        }

        if self.docker_binary.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "docker_binary cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn task_timeout(&self) -> TaskTimeout {
        TaskTimeout::from_secs_opt(self.timeout_secs)
    }

    pub fn execution_limits(&self) -> ExecutionLimits {
        ExecutionLimits::new(self.memory_mb, self.cpu_cores)
    }

    /// Execution settings for the orchestrator. Secrets are not included;
    /// add them with [`ExecutionConfig::with_env`].
    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig::new(self.image.clone())
            .with_capacity(self.max_containers)
            .with_timeout(self.task_timeout())
            .with_limits(self.execution_limits())
            .with_name_prefix(self.name_prefix.clone())
    }

    /// Work style text for prompts, honoring `custom_work_style`.
    pub fn work_style_text(&self) -> String {
        work_style_description(self.work_style, self.custom_work_style.as_deref())
    }

    pub fn coding_style_text(&self) -> &'static str {
        coding_style(self.coding_style_level)
    }

    /// Reads the selected agent's API key from the process environment.
    pub fn agent_api_key(&self) -> Option<String> {
        std::env::var(self.agent.api_key_env())
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn with_max_containers(mut self, max: usize) -> Self {
        self.max_containers = max;
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_agent(mut self, agent: AgentKind) -> Self {
        self.agent = agent;
        self
    }
}

fn parse_value<T>(value: &str, key: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.agent, AgentKind::GeminiCli);
        assert_eq!(config.max_containers, 5);
        assert_eq!(config.image, "ubuntu:latest");
        assert_eq!(config.timeout_secs, Some(300));
        assert_eq!(config.memory_mb, 512);
        assert!((config.cpu_cores - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.max_tasks, 10);
        assert_eq!(config.min_tasks, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::default()
            .with_env_overrides(env(&[
                ("DOCKHAND_AGENT", "codex"),
                ("DOCKHAND_MAX_CONTAINERS", "2"),
                ("DOCKHAND_TIMEOUT_SECS", "none"),
                ("DOCKHAND_RUNTIME", "api"),
                ("DOCKHAND_WORK_STYLE", "bug_fixer"),
            ]))
            .unwrap();

        assert_eq!(config.agent, AgentKind::Codex);
        assert_eq!(config.max_containers, 2);
        assert_eq!(config.task_timeout(), TaskTimeout::Unlimited);
        assert_eq!(config.runtime, RuntimeKind::Api);
        assert_eq!(config.work_style, WorkStyle::BugFixer);
    }

    #[test]
    fn test_env_invalid_value() {
        let err = AppConfig::default()
            .with_env_overrides(env(&[("DOCKHAND_MAX_CONTAINERS", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("DOCKHAND_MAX_CONTAINERS"));
    }

    #[test]
    fn test_validation_failures() {
        let cases = [
            (AppConfig::default().with_max_containers(0), "max_containers"),
            (AppConfig::default().with_image(" "), "image"),
            (AppConfig::default().with_timeout_secs(Some(0)), "timeout_secs"),
            (
                AppConfig {
                    memory_mb: 32,
                    ..Default::default()
                },
                "memory_mb",
            ),
            (
                AppConfig {
                    cpu_cores: 0.0,
                    ..Default::default()
                },
                "cpu_cores",
            ),
            (
                AppConfig {
                    min_tasks: 11,
                    ..Default::default()
                },
                "min_tasks",
            ),
        ];

        for (config, field) in cases {
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains(field), "{field}: {err}");
        }
    }

    #[test]
    fn test_execution_config_conversion() {
        let config = AppConfig::default()
            .with_max_containers(3)
            .with_image("node:20")
            .with_timeout_secs(Some(45));
        let exec = config.execution_config();

        assert_eq!(exec.max_capacity, 3);
        assert_eq!(exec.image, "node:20");
        assert_eq!(exec.timeout.limit(), Some(Duration::from_secs(45)));
        assert_eq!(exec.limits.memory_mb, 512);
        assert!(exec.env.is_empty());
    }

    #[test]
    fn test_runtime_kind_parse() {
        assert_eq!("CLI".parse::<RuntimeKind>().unwrap(), RuntimeKind::Cli);
        assert!("grpc".parse::<RuntimeKind>().is_err());
    }
}
