//! Bounded-concurrency orchestrator.
//!
//! Admits tasks in submission order, never letting more than
//! `max_capacity` environments be live at once, and collects one terminal
//! result per task.
//!
//! # Architecture
//!
//! ```text
//!              ┌──────────────┐
//!              │  Task queue  │  FIFO, fixed at construction
//!              └──────┬───────┘
//!                     │ acquire permit
//!              ┌──────▼───────┐
//!              │  Semaphore   │  max_capacity permits
//!              └──────┬───────┘
//!         ┌───────────┼───────────┐
//!         ▼           ▼           ▼
//!    ┌─────────┐ ┌─────────┐ ┌─────────┐
//!    │ Runner 1│ │ Runner 2│ │ Runner K│   permit dropped after teardown
//!    └────┬────┘ └────┬────┘ └────┬────┘
//!         └───────────┼───────────┘
//!              ┌──────▼───────┐
//!              │ Result store │
//!              └──────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dockhand::execution::DockerCli;
//! use dockhand::orchestrator::Orchestrator;
//! use dockhand::runner::ExecutionConfig;
//!
//! let config = ExecutionConfig::new("alpine:3").with_capacity(3);
//! let orchestrator = Orchestrator::new(tasks, config, Arc::new(DockerCli::new()))?;
//! orchestrator.start().await?;
//! orchestrator.wait_for_all_tasks().await?;
//! for result in orchestrator.get_task_results() {
//!     println!("{} {}", result.task_id, result.status);
//! }
//! ```

mod dispatch;
pub mod stats;

use std::sync::{Arc, RwLock};

use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::OrchestratorError;
use crate::execution::{ContainerRuntime, EnvironmentCounters};
use crate::metrics::OrchestratorMetrics;
use crate::runner::{CommandPlanner, ExecutionConfig, ShellPlanner, TaskRunner};
use crate::task::{ResultStore, Task, TaskResult, TaskStatus};

pub use stats::OrchestratorStats;

use stats::SharedStats;

/// Lifecycle of an orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    NotStarted,
    Running,
    Drained,
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestratorState::NotStarted => write!(f, "not_started"),
            OrchestratorState::Running => write!(f, "running"),
            OrchestratorState::Drained => write!(f, "drained"),
        }
    }
}

/// State shared between the orchestrator, its dispatcher and its runners.
pub(crate) struct Shared {
    tasks: Vec<Task>,
    config: ExecutionConfig,
    runner: TaskRunner,
    store: ResultStore,
    gate: Arc<Semaphore>,
    cancel: CancellationToken,
    counters: Arc<EnvironmentCounters>,
    stats: SharedStats,
    metrics: Option<OrchestratorMetrics>,
    done: watch::Sender<bool>,
}

impl Shared {
    /// Stores a terminal result; only the first one per task counts.
    fn record(&self, result: TaskResult) {
        let status = result.status;
        let duration_ms = result.duration_ms;
        if self.store.complete(result) {
            self.stats.record(duration_ms);
            if let Some(metrics) = &self.metrics {
                metrics.record_result(status, duration_ms);
            }
        }
    }

    fn publish_queue_depth(&self, queued: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.set_queued(queued);
        }
    }

    fn publish_live_environments(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.set_live_environments(self.counters.live());
        }
    }
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    tasks: Vec<Task>,
    config: ExecutionConfig,
    runtime: Arc<dyn ContainerRuntime>,
    planner: Arc<dyn CommandPlanner>,
    metrics: Option<OrchestratorMetrics>,
}

impl OrchestratorBuilder {
    /// Sets how tasks become commands. Defaults to [`ShellPlanner`].
    pub fn planner(mut self, planner: Arc<dyn CommandPlanner>) -> Self {
        self.planner = planner;
        self
    }

    /// Records Prometheus metrics for this run.
    pub fn metrics(mut self, metrics: OrchestratorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validates the configuration and registers every task as PENDING.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError` for a zero or oversized capacity, an
    /// empty image reference, or a task ID submitted twice.
    pub fn build(self) -> Result<Orchestrator, OrchestratorError> {
        let capacity = self.config.max_capacity;
        if capacity == 0 || capacity > Semaphore::MAX_PERMITS {
            return Err(OrchestratorError::InvalidCapacity(capacity));
        }
        if self.config.image.trim().is_empty() {
            return Err(OrchestratorError::InvalidImage(self.config.image.clone()));
        }

        let store = ResultStore::new();
        for task in &self.tasks {
            if !store.register(&task.id) {
                return Err(OrchestratorError::DuplicateTaskId(task.id.clone()));
            }
        }

        let counters = Arc::new(EnvironmentCounters::new());
        let runner = TaskRunner::new(self.runtime, self.planner).with_counters(Arc::clone(&counters));
        let (done, done_rx) = watch::channel(false);

        if let Some(metrics) = &self.metrics {
            metrics.set_queued(self.tasks.len());
        }

        Ok(Orchestrator {
            shared: Arc::new(Shared {
                tasks: self.tasks,
                config: self.config,
                runner,
                store,
                gate: Arc::new(Semaphore::new(capacity)),
                cancel: CancellationToken::new(),
                counters,
                stats: SharedStats::default(),
                metrics: self.metrics,
                done,
            }),
            state: RwLock::new(OrchestratorState::NotStarted),
            done: done_rx,
        })
    }
}

/// Runs a fixed list of tasks with bounded concurrency.
pub struct Orchestrator {
    shared: Arc<Shared>,
    state: RwLock<OrchestratorState>,
    done: watch::Receiver<bool>,
}

impl Orchestrator {
    /// Creates an orchestrator that runs task descriptions as shell scripts.
    pub fn new(
        tasks: Vec<Task>,
        config: ExecutionConfig,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Result<Self, OrchestratorError> {
        Self::builder(tasks, config, runtime).build()
    }

    pub fn builder(
        tasks: Vec<Task>,
        config: ExecutionConfig,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            tasks,
            config,
            runtime,
            planner: Arc::new(ShellPlanner),
            metrics: None,
        }
    }

    /// Starts admitting tasks. Returns immediately.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::AlreadyStarted` unless the orchestrator
    /// is NOT_STARTED.
    pub async fn start(&self) -> Result<(), OrchestratorError> {
        {
            let mut state = self.state.write().expect("orchestrator state lock poisoned");
            if *state != OrchestratorState::NotStarted {
                return Err(OrchestratorError::AlreadyStarted);
            }
            *state = OrchestratorState::Running;
        }

        info!(
            tasks = self.shared.tasks.len(),
            capacity = self.shared.config.max_capacity,
            image = %self.shared.config.image,
            timeout = %self.shared.config.timeout,
            "Orchestrator started"
        );
        tokio::spawn(dispatch::dispatch(Arc::clone(&self.shared)));
        Ok(())
    }

    /// Waits until every task is terminal and no runner is in flight.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::NotStarted` if called before
    /// [`start`](Self::start).
    pub async fn wait_for_all_tasks(&self) -> Result<(), OrchestratorError> {
        match self.state() {
            OrchestratorState::NotStarted => return Err(OrchestratorError::NotStarted),
            OrchestratorState::Drained => return Ok(()),
            OrchestratorState::Running => {}
        }

        self.wait_for_dispatcher().await;
        self.mark_drained();
        Ok(())
    }

    /// Cancels every queued and running task.
    ///
    /// Queued tasks are failed without being admitted. Running tasks have
    /// their command sequence interrupted and their environment torn down;
    /// this returns once that teardown has happened. A no-op once drained.
    pub async fn stop_all(&self) {
        let state = {
            let mut state = self.state.write().expect("orchestrator state lock poisoned");
            let current = *state;
            if current == OrchestratorState::NotStarted {
                *state = OrchestratorState::Drained;
            }
            current
        };

        match state {
            OrchestratorState::Drained => {
                debug!("stop_all on a drained orchestrator");
            }
            OrchestratorState::NotStarted => {
                info!(tasks = self.shared.tasks.len(), "Stopping before start");
                self.shared.cancel.cancel();
                for task in &self.shared.tasks {
                    self.shared.record(dispatch::cancelled_before_admission(&task.id));
                }
                self.shared.publish_queue_depth(0);
                self.shared.done.send_replace(true);
            }
            OrchestratorState::Running => {
                info!(
                    live = self.shared.counters.live(),
                    unfinished = self.shared.store.unfinished().len(),
                    "Stopping all tasks"
                );
                self.shared.cancel.cancel();
                self.wait_for_dispatcher().await;
                self.mark_drained();
            }
        }
    }

    /// Terminal results recorded so far, in admission order. Never blocks on
    /// running tasks.
    pub fn get_task_results(&self) -> Vec<TaskResult> {
        self.shared.store.snapshot()
    }

    pub fn state(&self) -> OrchestratorState {
        *self.state.read().expect("orchestrator state lock poisoned")
    }

    pub fn task_status(&self, task_id: &str) -> Option<TaskStatus> {
        self.shared.store.status(task_id)
    }

    pub fn stats(&self) -> OrchestratorStats {
        let store = &self.shared.store;
        let counters = &self.shared.counters;
        self.shared.publish_live_environments();

        OrchestratorStats {
            total: store.len(),
            pending: store.count(TaskStatus::Pending),
            running: store.count(TaskStatus::Running),
            succeeded: store.count(TaskStatus::Success),
            failed: store.count(TaskStatus::Failure),
            timed_out: store.count(TaskStatus::Timeout),
            live_environments: counters.live(),
            peak_live_environments: counters.peak(),
            provisioned: counters.provisioned(),
            torn_down: counters.torn_down(),
            admission_failures: self.shared.stats.admission_failures(),
            panics: self.shared.stats.panics(),
            average_task_duration: self.shared.stats.average_duration(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.shared.tasks
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.shared.config
    }

    pub fn metrics(&self) -> Option<&OrchestratorMetrics> {
        self.shared.metrics.as_ref()
    }

    async fn wait_for_dispatcher(&self) {
        let mut done = self.done.clone();
        // The sender lives in `shared`, so this only fails if it was dropped
        // mid-run, which cannot happen while `self` is alive.
        let _ = done.wait_for(|finished| *finished).await;
    }

    fn mark_drained(&self) {
        let mut state = self.state.write().expect("orchestrator state lock poisoned");
        if *state == OrchestratorState::Running {
            *state = OrchestratorState::Drained;
            let stats = &self.shared.store;
            info!(
                total = stats.len(),
                succeeded = stats.count(TaskStatus::Success),
                failed = stats.count(TaskStatus::Failure),
                timed_out = stats.count(TaskStatus::Timeout),
                "All tasks finished"
            );
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if self.state() == OrchestratorState::Running && !*self.done.borrow() {
            debug!("Orchestrator dropped while running, cancelling tasks");
            self.shared.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::DockerCli;

    fn runtime() -> Arc<dyn ContainerRuntime> {
        Arc::new(DockerCli::new())
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = ExecutionConfig::new("alpine").with_capacity(0);
        let err = Orchestrator::new(vec![], config, runtime()).err().unwrap();
        assert!(matches!(err, OrchestratorError::InvalidCapacity(0)));
    }

    #[test]
    fn test_rejects_empty_image() {
        let err = Orchestrator::new(vec![], ExecutionConfig::new("  "), runtime())
            .err()
            .unwrap();
        assert!(matches!(err, OrchestratorError::InvalidImage(_)));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let tasks = vec![
            Task::new("a", "one", "echo 1"),
            Task::new("a", "two", "echo 2"),
        ];
        let err = Orchestrator::new(tasks, ExecutionConfig::default(), runtime())
            .err()
            .unwrap();
        assert!(matches!(err, OrchestratorError::DuplicateTaskId(id) if id == "a"));
    }

    #[tokio::test]
    async fn test_lifecycle_errors() {
        let orchestrator =
            Orchestrator::new(vec![], ExecutionConfig::default(), runtime()).unwrap();
        assert_eq!(orchestrator.state(), OrchestratorState::NotStarted);
        assert!(matches!(
            orchestrator.wait_for_all_tasks().await,
            Err(OrchestratorError::NotStarted)
        ));

        orchestrator.start().await.unwrap();
        assert!(matches!(
            orchestrator.start().await,
            Err(OrchestratorError::AlreadyStarted)
        ));

        orchestrator.wait_for_all_tasks().await.unwrap();
        assert_eq!(orchestrator.state(), OrchestratorState::Drained);
        assert!(orchestrator.get_task_results().is_empty());
    }

    #[tokio::test]
    async fn test_stop_before_start_cancels_everything() {
        let tasks = vec![Task::new("a", "a", "echo a"), Task::new("b", "b", "echo b")];
        let orchestrator = Orchestrator::new(tasks, ExecutionConfig::default(), runtime()).unwrap();

        orchestrator.stop_all().await;
        assert_eq!(orchestrator.state(), OrchestratorState::Drained);

        let results = orchestrator.get_task_results();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == TaskStatus::Failure));
        assert!(results[0]
            .error_detail
            .as_deref()
            .unwrap()
            .contains("before admission"));

        assert!(matches!(
            orchestrator.start().await,
            Err(OrchestratorError::AlreadyStarted)
        ));
        orchestrator.wait_for_all_tasks().await.unwrap();
        assert_eq!(orchestrator.stats().provisioned, 0);
    }
}
