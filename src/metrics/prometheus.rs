//! Prometheus metrics for one orchestrator.
//!
//! Each [`OrchestratorMetrics`] owns its registry, so several orchestrators
//! (or tests) in one process never share counters.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::task::TaskStatus;

/// Metrics recorded while tasks run.
#[derive(Clone)]
pub struct OrchestratorMetrics {
    registry: Registry,
    tasks_total: IntCounterVec,
    live_environments: IntGauge,
    queued_tasks: IntGauge,
    task_duration: Histogram,
}

impl std::fmt::Debug for OrchestratorMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorMetrics")
            .field("live_environments", &self.live_environments.get())
            .field("queued_tasks", &self.queued_tasks.get())
            .finish()
    }
}

impl OrchestratorMetrics {
    /// Creates and registers every metric in a fresh registry.
    ///
    /// # Errors
    ///
    /// Returns a `prometheus::Error` if a metric definition is invalid.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let tasks_total = IntCounterVec::new(
            Opts::new("dockhand_tasks_total", "Tasks that reached a terminal status"),
            &["status"],
        )?;

        let live_environments = IntGauge::new(
            "dockhand_live_environments",
            "Execution environments currently live",
        )?;

        let queued_tasks = IntGauge::new("dockhand_queued_tasks", "Tasks waiting for admission")?;

        let task_duration = Histogram::with_opts(
            HistogramOpts::new(
                "dockhand_task_duration_seconds",
                "Wall-clock duration of a task from admission to result",
            )
            .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        )?;

        registry.register(Box::new(tasks_total.clone()))?;
        registry.register(Box::new(live_environments.clone()))?;
        registry.register(Box::new(queued_tasks.clone()))?;
        registry.register(Box::new(task_duration.clone()))?;

        Ok(Self {
            registry,
            tasks_total,
            live_environments,
            queued_tasks,
            task_duration,
        })
    }

    pub fn record_result(&self, status: TaskStatus, duration_ms: u64) {
        self.tasks_total.with_label_values(&[status.as_str()]).inc();
        self.task_duration.observe(duration_ms as f64 / 1000.0);
    }

    pub fn set_live_environments(&self, live: u64) {
        self.live_environments.set(live as i64);
    }

    pub fn set_queued(&self, queued: usize) {
        self.queued_tasks.set(queued as i64);
    }

    pub fn tasks_with_status(&self, status: TaskStatus) -> u64 {
        self.tasks_total.with_label_values(&[status.as_str()]).get()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Renders every metric in the Prometheus text exposition format.
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            return format!("# Error encoding metrics: {}\n", e);
        }

        String::from_utf8(buffer)
            .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registries_are_independent() {
        let a = OrchestratorMetrics::new().unwrap();
        let b = OrchestratorMetrics::new().unwrap();

        a.record_result(TaskStatus::Success, 1500);
        assert_eq!(a.tasks_with_status(TaskStatus::Success), 1);
        assert_eq!(b.tasks_with_status(TaskStatus::Success), 0);
    }

    #[test]
    fn test_export_contains_metric_names() {
        let metrics = OrchestratorMetrics::new().unwrap();
        metrics.record_result(TaskStatus::Timeout, 1000);
        metrics.set_live_environments(2);
        metrics.set_queued(3);

        let text = metrics.export();
        assert!(text.contains("dockhand_tasks_total{status=\"timeout\"} 1"));
        assert!(text.contains("dockhand_live_environments 2"));
        assert!(text.contains("dockhand_queued_tasks 3"));
        assert!(text.contains("dockhand_task_duration_seconds_count 1"));
    }
}
