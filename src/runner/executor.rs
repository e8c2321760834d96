//! Task runner: one task, one environment, one result.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AdmissionError, EnvironmentError, ExecutionError};
use crate::execution::{generate_name, ContainerRuntime, EnvironmentCounters, EnvironmentHandle};
use crate::task::{Task, TaskResult, TaskStatus};

use super::config::ExecutionConfig;
use super::planner::CommandPlanner;

/// Binds a task to a fresh environment and classifies the outcome.
pub struct TaskRunner {
    runtime: Arc<dyn ContainerRuntime>,
    planner: Arc<dyn CommandPlanner>,
    counters: Option<Arc<EnvironmentCounters>>,
}

impl TaskRunner {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, planner: Arc<dyn CommandPlanner>) -> Self {
        Self {
            runtime,
            planner,
            counters: None,
        }
    }

    /// Attaches live/peak environment counters to every handle this runner creates.
    pub fn with_counters(mut self, counters: Arc<EnvironmentCounters>) -> Self {
        self.counters = Some(counters);
        self
    }

    /// Runs `task` to a terminal result.
    ///
    /// Every failure becomes a FAILURE or TIMEOUT result. The one exception
    /// is a runtime out of room for another environment, which is returned
    /// as an [`AdmissionError`]. The environment is torn down on every path
    /// that provisioned one.
    pub async fn run(
        &self,
        task: &Task,
        config: &ExecutionConfig,
        cancel: &CancellationToken,
    ) -> Result<TaskResult, AdmissionError> {
        let clock = Instant::now();
        let elapsed_ms = || clock.elapsed().as_millis() as u64;

        let commands = match self.planner.plan(task) {
            Ok(commands) => commands,
            Err(e) => {
                warn!(task_id = %task.id, planner = self.planner.name(), error = %e, "Planning failed");
                return Ok(TaskResult::failure(&task.id, e.to_string(), elapsed_ms()));
            }
        };

        if cancel.is_cancelled() {
            let err = ExecutionError::Cancelled("task cancelled before provisioning".to_string());
            return Ok(TaskResult::failure(&task.id, err.to_string(), elapsed_ms()));
        }

        let name = generate_name(&config.name_prefix);
        let mut handle = EnvironmentHandle::new(Arc::clone(&self.runtime), name);
        if let Some(counters) = &self.counters {
            handle = handle.with_counters(Arc::clone(counters));
        }

        debug!(task_id = %task.id, environment = handle.name(), commands = commands.len(), "Provisioning environment");
        let mut env = match handle.provision(&config.provision_spec()).await {
            Ok(env) => env,
            Err(EnvironmentError::Provision(e)) if e.is_resource_exhaustion() => {
                return Err(AdmissionError {
                    task_id: task.id.clone(),
                    source: e,
                });
            }
            Err(EnvironmentError::Provision(e)) => {
                let err = ExecutionError::Provision(e.to_string());
                warn!(task_id = %task.id, error = %err, "Provisioning failed");
                return Ok(TaskResult::failure(&task.id, err.to_string(), elapsed_ms()));
            }
            Err(e) => {
                let err = ExecutionError::Provision(e.to_string());
                return Ok(TaskResult::failure(&task.id, err.to_string(), elapsed_ms()));
            }
        };

        let outcome = AssertUnwindSafe(env.execute(&commands, config.timeout, cancel))
            .catch_unwind()
            .await;
        env.teardown().await;
        // Teardown has finished, so the caller may release capacity when it
        // records the panic.
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(panic) => std::panic::resume_unwind(panic),
        };

        let result = match outcome {
            Ok(outcome) => {
                let status = outcome.status();
                let detail = outcome.error_detail();
                let mut result = TaskResult::new(&task.id, status, elapsed_ms())
                    .with_report(outcome.output);
                if let Some(detail) = detail {
                    result = result.with_error(detail);
                }
                result
            }
            Err(e) => TaskResult::failure(&task.id, e.to_string(), elapsed_ms()),
        }
        .with_environment(env.name());

        match result.status {
            TaskStatus::Success => info!(
                task_id = %task.id,
                status = %result.status,
                duration_ms = result.duration_ms,
                "Task finished"
            ),
            _ => warn!(
                task_id = %task.id,
                status = %result.status,
                duration_ms = result.duration_ms,
                error = result.error_detail.as_deref().unwrap_or(""),
                "Task finished"
            ),
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DockerError;
    use crate::execution::{Command, ExecResult, ProvisionSpec, TaskTimeout};
    use crate::runner::ShellPlanner;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes the script back. Scripts starting with `fail` exit 1.
    struct EchoRuntime {
        create_error: Option<fn() -> DockerError>,
        removes: AtomicUsize,
    }

    impl EchoRuntime {
        fn new() -> Self {
            Self {
                create_error: None,
                removes: AtomicUsize::new(0),
            }
        }

        fn failing(make: fn() -> DockerError) -> Self {
            Self {
                create_error: Some(make),
                removes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ContainerRuntime for EchoRuntime {
        async fn create(&self, _name: &str, _spec: &ProvisionSpec) -> Result<(), DockerError> {
            match self.create_error {
                Some(make) => Err(make()),
                None => Ok(()),
            }
        }

        async fn exec(&self, _name: &str, command: &Command) -> Result<ExecResult, DockerError> {
            let script = command.argv.last().cloned().unwrap_or_default();
            if script.starts_with("panic") {
                panic!("exec blew up");
            }
            if script.starts_with("fail") {
                return Ok(ExecResult {
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: "failed on purpose".into(),
                });
            }
            Ok(ExecResult {
                exit_code: 0,
                stdout: format!("{script}\n"),
                stderr: String::new(),
            })
        }

        async fn remove(&self, _name: &str) -> Result<(), DockerError> {
            self.removes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn kind(&self) -> &'static str {
            "echo"
        }
    }

    fn runner(runtime: Arc<EchoRuntime>) -> TaskRunner {
        TaskRunner::new(runtime, Arc::new(ShellPlanner))
    }

    #[tokio::test]
    async fn test_success_result() {
        let runtime = Arc::new(EchoRuntime::new());
        let config = ExecutionConfig::new("alpine").with_timeout(TaskTimeout::seconds(10));
        let task = Task::new("t1", "echo", "hello");

        let result = runner(runtime.clone())
            .run(&task, &config, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status, TaskStatus::Success);
        assert!(result.report.contains("$ hello\nhello"));
        assert!(result.environment.as_deref().unwrap().starts_with("dockhand-"));
        assert_eq!(runtime.removes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_result_still_tears_down() {
        let runtime = Arc::new(EchoRuntime::new());
        let config = ExecutionConfig::new("alpine");
        let task = Task::new("t2", "fail", "fail now");

        let result = runner(runtime.clone())
            .run(&task, &config, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status, TaskStatus::Failure);
        assert!(result.error_detail.unwrap().contains("failed on purpose"));
        assert_eq!(runtime.removes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panic_during_execution_tears_down_before_unwinding() {
        let runtime = Arc::new(EchoRuntime::new());
        let counters = Arc::new(EnvironmentCounters::new());
        let runner = runner(runtime.clone()).with_counters(counters.clone());
        let task = Task::new("t7", "panic", "panic now");
        let config = ExecutionConfig::default();
        let cancel = CancellationToken::new();

        let outcome = AssertUnwindSafe(runner.run(&task, &config, &cancel))
            .catch_unwind()
            .await;

        assert!(outcome.is_err());
        // Removed inline, not by a task spawned from `Drop`.
        assert_eq!(runtime.removes.load(Ordering::SeqCst), 1);
        assert_eq!(counters.live(), 0);
        assert_eq!(counters.torn_down(), 1);
    }

    #[tokio::test]
    async fn test_resource_exhaustion_is_admission_error() {
        let runtime = Arc::new(EchoRuntime::failing(|| {
            DockerError::ResourceExhausted("no space left on device".into())
        }));
        let task = Task::new("t3", "x", "echo x");

        let err = runner(runtime)
            .run(&task, &ExecutionConfig::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.task_id, "t3");
        assert!(err.source.is_resource_exhaustion());
    }

    #[tokio::test]
    async fn test_other_provision_errors_are_failures() {
        let runtime = Arc::new(EchoRuntime::failing(|| {
            DockerError::CreateFailed("pull access denied".into())
        }));
        let task = Task::new("t4", "x", "echo x");

        let result = runner(runtime)
            .run(&task, &ExecutionConfig::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.status, TaskStatus::Failure);
        assert!(result.error_detail.unwrap().contains("pull access denied"));
        assert!(result.environment.is_none());
    }

    #[tokio::test]
    async fn test_planning_error_skips_provisioning() {
        let runtime = Arc::new(EchoRuntime::new());
        let counters = Arc::new(EnvironmentCounters::new());
        let task = Task::new("t5", "empty", "");

        let result = runner(runtime)
            .with_counters(counters.clone())
            .run(&task, &ExecutionConfig::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.status, TaskStatus::Failure);
        assert_eq!(counters.provisioned(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_provisioning() {
        let runtime = Arc::new(EchoRuntime::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = runner(runtime.clone())
            .run(&Task::new("t6", "x", "echo"), &ExecutionConfig::default(), &cancel)
            .await
            .unwrap();
        assert_eq!(result.status, TaskStatus::Failure);
        assert!(result.error_detail.unwrap().starts_with("Cancelled"));
        assert_eq!(runtime.removes.load(Ordering::SeqCst), 0);
    }
}
