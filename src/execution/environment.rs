//! Lifecycle of one execution environment.
//!
//! A handle moves UNSTARTED -> LIVE -> TERMINATED. The creator owns it and
//! must call [`EnvironmentHandle::teardown`] on every exit path; `Drop`
//! only catches the panic path.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{EnvironmentError, ExecutionError};
use crate::execution::command::CommandSequence;
use crate::execution::runtime::{ContainerRuntime, ProvisionSpec};
use crate::execution::timeout::TaskTimeout;
use crate::task::TaskStatus;

/// Lifecycle state of an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unstarted,
    Live,
    Terminated,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Unstarted => write!(f, "unstarted"),
            LifecycleState::Live => write!(f, "live"),
            LifecycleState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Live/peak/provisioned/torn-down counters shared by every handle of one
/// orchestrator.
#[derive(Debug, Default)]
pub struct EnvironmentCounters {
    live: AtomicU64,
    peak: AtomicU64,
    provisioned: AtomicU64,
    torn_down: AtomicU64,
}

impl EnvironmentCounters {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_provisioned(&self) {
        self.provisioned.fetch_add(1, Ordering::SeqCst);
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);
    }

    fn record_torn_down(&self) {
        self.torn_down.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn live(&self) -> u64 {
        self.live.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> u64 {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn provisioned(&self) -> u64 {
        self.provisioned.load(Ordering::SeqCst)
    }

    pub fn torn_down(&self) -> u64 {
        self.torn_down.load(Ordering::SeqCst)
    }
}

/// What a command sequence produced.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Stdout of every command that ran, each prefixed by `$ <command>`.
    pub output: String,
    /// Stderr of the failing command, if any.
    pub errors: String,
    /// `Ok` when every command exited zero in time.
    pub verdict: Result<(), ExecutionError>,
    pub elapsed: Duration,
}

impl ExecutionOutcome {
    fn new(output: String, errors: String, verdict: Result<(), ExecutionError>, elapsed: Duration) -> Self {
        Self {
            output,
            errors,
            verdict,
            elapsed,
        }
    }

    /// Maps the verdict onto a terminal task status.
    pub fn status(&self) -> TaskStatus {
        match &self.verdict {
            Ok(()) => TaskStatus::Success,
            Err(ExecutionError::Timeout { .. }) => TaskStatus::Timeout,
            Err(_) => TaskStatus::Failure,
        }
    }

    /// Error channel plus the classification message; `None` on success.
    pub fn error_detail(&self) -> Option<String> {
        let err = self.verdict.as_ref().err()?;
        let errors = self.errors.trim();
        if errors.is_empty() {
            Some(err.to_string())
        } else {
            Some(format!("{errors}\n{err}"))
        }
    }
}

/// Handle to one isolated environment.
pub struct EnvironmentHandle {
    name: String,
    state: LifecycleState,
    runtime: Arc<dyn ContainerRuntime>,
    counters: Option<Arc<EnvironmentCounters>>,
}

impl std::fmt::Debug for EnvironmentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentHandle")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("runtime", &self.runtime.kind())
            .finish()
    }
}

/// Generates a unique environment name such as `dockhand-3f2a9c81d4e0`.
pub fn generate_name(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..12])
}

impl EnvironmentHandle {
    /// Creates an UNSTARTED handle. Nothing exists in the runtime yet.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: LifecycleState::Unstarted,
            runtime,
            counters: None,
        }
    }

    pub fn with_counters(mut self, counters: Arc<EnvironmentCounters>) -> Self {
        self.counters = Some(counters);
        self
    }

    /// Creates the environment and returns a LIVE handle.
    ///
    /// On failure the name is force-removed in case the runtime created the
    /// container but could not start it.
    pub async fn provision(
        mut self,
        spec: &ProvisionSpec,
    ) -> Result<Self, EnvironmentError> {
        if self.state != LifecycleState::Unstarted {
            return Err(EnvironmentError::NotLive {
                name: self.name.clone(),
                state: self.state.to_string(),
            });
        }

        match self.runtime.create(&self.name, spec).await {
            Ok(()) => {
                self.state = LifecycleState::Live;
                if let Some(counters) = &self.counters {
                    counters.record_provisioned();
                }
                info!(environment = %self.name, image = %spec.image, runtime = self.runtime.kind(), "Environment provisioned");
                Ok(self)
            }
            Err(e) => {
                if let Err(cleanup) = self.runtime.remove(&self.name).await {
                    debug!(environment = %self.name, error = %cleanup, "Cleanup after failed provision");
                }
                self.state = LifecycleState::Terminated;
                Err(EnvironmentError::Provision(e))
            }
        }
    }

    /// Runs `commands` in order under one deadline.
    ///
    /// Classification: a non-zero exit stops the sequence as a failure; a
    /// missed deadline is a timeout and wins over a failure observed after
    /// the deadline; cancellation wins over everything.
    pub async fn execute(
        &self,
        commands: &CommandSequence,
        timeout: TaskTimeout,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, EnvironmentError> {
        self.ensure_live()?;

        let started = Instant::now();
        if timeout.is_already_expired() {
            return Ok(ExecutionOutcome::new(
                String::new(),
                String::new(),
                Err(ExecutionError::Timeout {
                    limit: Duration::ZERO,
                }),
                Duration::ZERO,
            ));
        }

        let deadline = timeout.deadline_from(started);
        let mut output = String::new();
        let mut errors = String::new();

        let verdict = {
            let run = self.run_sequence(commands, &mut output, &mut errors);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ExecutionError::Cancelled(
                    "environment stopped while commands were running".to_string(),
                )),
                res = with_deadline(deadline, run) => res.unwrap_or_else(|| {
                    Err(ExecutionError::Timeout {
                        limit: timeout.limit().unwrap_or_default(),
                    })
                }),
            }
        };

        let verdict = match (verdict, deadline, timeout.limit()) {
            (
                Err(ExecutionError::Failure { .. } | ExecutionError::Runtime { .. }),
                Some(deadline),
                Some(limit),
            ) if Instant::now() >= deadline => Err(ExecutionError::Timeout { limit }),
            (verdict, _, _) => verdict,
        };

        let elapsed = started.elapsed();
        match &verdict {
            Ok(()) => debug!(environment = %self.name, elapsed_ms = elapsed.as_millis() as u64, "Command sequence completed"),
            Err(e) => info!(environment = %self.name, elapsed_ms = elapsed.as_millis() as u64, error = %e, "Command sequence did not complete"),
        }

        Ok(ExecutionOutcome::new(output, errors, verdict, elapsed))
    }

    async fn run_sequence(
        &self,
        commands: &CommandSequence,
        output: &mut String,
        errors: &mut String,
    ) -> Result<(), ExecutionError> {
        for command in commands {
            let shown = command.display();
            debug!(environment = %self.name, command = %shown, "Running command");

            match self.runtime.exec(&self.name, command).await {
                Ok(result) => {
                    output.push_str(&format!("\n$ {}\n{}", shown, result.stdout));
                    if !result.is_success() {
                        let stderr = result.stderr.trim();
                        errors.push_str(&format!(
                            "\nError running '{}': {}",
                            shown,
                            if stderr.is_empty() { "Unknown error" } else { stderr }
                        ));
                        return Err(ExecutionError::Failure {
                            command: shown,
                            exit_code: result.exit_code,
                        });
                    }
                }
                Err(e) => {
                    output.push_str(&format!("\n$ {}\n", shown));
                    errors.push_str(&format!("\nError running '{}': {}", shown, e));
                    return Err(ExecutionError::Runtime {
                        command: shown,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Force-removes the environment.
    ///
    /// Idempotent and infallible: UNSTARTED and TERMINATED handles are left
    /// alone, and removal errors are logged. Returns true if this call moved
    /// the handle from LIVE to TERMINATED.
    pub async fn teardown(&mut self) -> bool {
        if self.state != LifecycleState::Live {
            return false;
        }

        self.state = LifecycleState::Terminated;
        if let Some(counters) = &self.counters {
            counters.record_torn_down();
        }

        match self.runtime.remove(&self.name).await {
            Ok(()) => debug!(environment = %self.name, "Environment removed"),
            Err(e) => warn!(
                environment = %self.name,
                error = %ExecutionError::Teardown(e.to_string()),
                "Environment removal failed"
            ),
        }
        true
    }

    fn ensure_live(&self) -> Result<(), EnvironmentError> {
        if self.state == LifecycleState::Live {
            Ok(())
        } else {
            Err(EnvironmentError::NotLive {
                name: self.name.clone(),
                state: self.state.to_string(),
            })
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == LifecycleState::Live
    }
}

impl Drop for EnvironmentHandle {
    fn drop(&mut self) {
        if self.state != LifecycleState::Live {
            return;
        }

        warn!(environment = %self.name, "Environment dropped while live, scheduling removal");
        self.state = LifecycleState::Terminated;
        if let Some(counters) = &self.counters {
            counters.record_torn_down();
        }

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let runtime = Arc::clone(&self.runtime);
            let name = self.name.clone();
            handle.spawn(async move {
                if let Err(e) = runtime.remove(&name).await {
                    warn!(environment = %name, error = %e, "Deferred removal failed");
                }
            });
        }
    }
}

async fn with_deadline<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}
