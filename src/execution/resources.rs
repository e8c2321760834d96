//! Resource limits for execution environments.

use serde::{Deserialize, Serialize};

/// Per-environment resource limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Memory limit in megabytes. Zero means unlimited.
    pub memory_mb: u64,
    /// CPU cores available (e.g., 0.5, 1.0, 2.0). Zero means unlimited.
    pub cpu_cores: f64,
    /// Maximum number of processes. Zero means unlimited.
    #[serde(default)]
    pub max_processes: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            memory_mb: 512,
            cpu_cores: 1.0,
            max_processes: 0,
        }
    }
}

impl ExecutionLimits {
    pub fn new(memory_mb: u64, cpu_cores: f64) -> Self {
        Self {
            memory_mb,
            cpu_cores,
            max_processes: 0,
        }
    }

    /// Limits that leave the runtime defaults untouched.
    pub fn unlimited() -> Self {
        Self::new(0, 0.0)
    }

    pub fn with_max_processes(mut self, max_processes: u64) -> Self {
        self.max_processes = max_processes;
        self
    }

    /// Returns memory limit in bytes.
    pub fn memory_bytes(&self) -> i64 {
        (self.memory_mb * 1024 * 1024) as i64
    }

    /// Returns CPU period in microseconds (fixed at 100ms).
    pub fn cpu_period(&self) -> i64 {
        100_000
    }

    /// Returns CPU quota based on cores allocated.
    ///
    /// quota = period * cores, so 1.0 core = 100000.
    pub fn cpu_quota(&self) -> i64 {
        (self.cpu_period() as f64 * self.cpu_cores) as i64
    }

    /// Flags for `docker run` enforcing these limits.
    pub fn run_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.memory_mb > 0 {
            args.push(format!("--memory={}m", self.memory_mb));
        }
        if self.cpu_cores > 0.0 {
            args.push(format!("--cpus={}", self.cpu_cores));
        }
        if self.max_processes > 0 {
            args.push(format!("--pids-limit={}", self.max_processes));
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = ExecutionLimits::default();
        assert_eq!(limits.memory_mb, 512);
        assert_eq!(limits.cpu_cores, 1.0);
        assert_eq!(limits.max_processes, 0);
    }

    #[test]
    fn test_memory_bytes_conversion() {
        let limits = ExecutionLimits::new(512, 1.0);
        assert_eq!(limits.memory_bytes(), 512 * 1024 * 1024);
    }

    #[test]
    fn test_cpu_quota_calculation() {
        let limits = ExecutionLimits::new(512, 2.0);
        assert_eq!(limits.cpu_period(), 100_000);
        assert_eq!(limits.cpu_quota(), 200_000);
    }

    #[test]
    fn test_run_args() {
        let args = ExecutionLimits::new(1024, 1.5)
            .with_max_processes(64)
            .run_args();
        assert_eq!(args, vec!["--memory=1024m", "--cpus=1.5", "--pids-limit=64"]);

        assert!(ExecutionLimits::unlimited().run_args().is_empty());
    }
}
