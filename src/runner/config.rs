//! Per-run execution settings shared by every task.

use serde::{Deserialize, Serialize};

use crate::execution::{ExecutionLimits, ProvisionSpec, TaskTimeout};

/// Settings supplied once at orchestrator construction.
#[derive(Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Maximum number of simultaneously live environments.
    pub max_capacity: usize,
    /// Image every environment is created from.
    pub image: String,
    /// Deadline for each task's whole command sequence.
    pub timeout: TaskTimeout,
    pub limits: ExecutionLimits,
    /// Variables injected at provisioning time, e.g. agent API keys.
    #[serde(default)]
    pub env: Vec<(String, String)>,
    /// Prefix for generated environment names.
    pub name_prefix: String,
}

impl ExecutionConfig {
    /// Creates a configuration with capacity 5 and a 300 second timeout.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            max_capacity: 5,
            image: image.into(),
            timeout: TaskTimeout::default(),
            limits: ExecutionLimits::default(),
            env: Vec::new(),
            name_prefix: "dockhand".to_string(),
        }
    }

    pub fn with_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    pub fn with_timeout(mut self, timeout: TaskTimeout) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn provision_spec(&self) -> ProvisionSpec {
        ProvisionSpec::new(self.image.clone())
            .with_limits(self.limits.clone())
            .with_env(self.env.clone())
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self::new("ubuntu:latest")
    }
}

// Values in `env` are usually secrets.
impl std::fmt::Debug for ExecutionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("ExecutionConfig")
            .field("max_capacity", &self.max_capacity)
            .field("image", &self.image)
            .field("timeout", &self.timeout)
            .field("limits", &self.limits)
            .field("env", &env_keys)
            .field("name_prefix", &self.name_prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_execution_config_defaults() {
        let config = ExecutionConfig::default();
        assert_eq!(config.max_capacity, 5);
        assert_eq!(config.image, "ubuntu:latest");
        assert_eq!(config.timeout.limit(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_execution_config_builder() {
        let config = ExecutionConfig::new("node:20")
            .with_capacity(2)
            .with_timeout(TaskTimeout::Unlimited)
            .with_env("GEMINI_API_KEY", "secret-value")
            .with_name_prefix("ci");

        let spec = config.provision_spec();
        assert_eq!(spec.image, "node:20");
        assert_eq!(spec.env, vec![("GEMINI_API_KEY".to_string(), "secret-value".to_string())]);
        assert_eq!(config.name_prefix, "ci");
    }

    #[test]
    fn test_debug_hides_env_values() {
        let config = ExecutionConfig::default().with_env("OPENAI_API_KEY", "sk-very-secret");
        let shown = format!("{:?}", config);
        assert!(shown.contains("OPENAI_API_KEY"));
        assert!(!shown.contains("sk-very-secret"));
    }
}
