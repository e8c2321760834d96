//! Prometheus metrics for orchestrator runs.
//!
//! # Example
//!
//! ```
//! use dockhand::metrics::OrchestratorMetrics;
//! use dockhand::task::TaskStatus;
//!
//! let metrics = OrchestratorMetrics::new().expect("metrics register");
//! metrics.record_result(TaskStatus::Success, 1200);
//! assert!(metrics.export().contains("dockhand_tasks_total"));
//! ```

pub mod prometheus;

pub use self::prometheus::OrchestratorMetrics;
