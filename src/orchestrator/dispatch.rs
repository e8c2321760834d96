//! Admission loop and per-task runner wrapper.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{watch, OwnedSemaphorePermit};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::ExecutionError;
use crate::task::TaskResult;

use super::Shared;

/// Marks the run finished when the dispatcher exits, however it exits.
struct DoneGuard<'a>(&'a watch::Sender<bool>);

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(true);
    }
}

/// Admits tasks in submission order as capacity frees up, then waits for
/// every admitted runner.
pub(super) async fn dispatch(shared: Arc<Shared>) {
    let _done = DoneGuard(&shared.done);
    let mut running = JoinSet::new();
    let mut admitted = 0;

    for (index, task) in shared.tasks.iter().enumerate() {
        let permit = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            permit = Arc::clone(&shared.gate).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        shared.store.mark_running(&task.id);
        admitted = index + 1;
        shared.publish_queue_depth(shared.tasks.len() - admitted);
        debug!(task_id = %task.id, available = shared.gate.available_permits(), "Task admitted");

        running.spawn(run_admitted(Arc::clone(&shared), index, permit));
    }

    let skipped = &shared.tasks[admitted..];
    if !skipped.is_empty() {
        info!(count = skipped.len(), "Cancelling tasks that were never admitted");
        for task in skipped {
            shared.record(cancelled_before_admission(&task.id));
        }
        shared.publish_queue_depth(0);
    }

    while let Some(joined) = running.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Runner task ended abnormally");
        }
    }
}

/// Runs one admitted task and records its result. The permit is released
/// only after the runner returns, which is after teardown.
async fn run_admitted(shared: Arc<Shared>, index: usize, permit: OwnedSemaphorePermit) {
    let task = &shared.tasks[index];
    let clock = Instant::now();

    let outcome = AssertUnwindSafe(shared.runner.run(task, &shared.config, &shared.cancel))
        .catch_unwind()
        .await;

    let result = match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(admission)) => {
            warn!(task_id = %task.id, error = %admission, "Admission failed");
            shared.stats.record_admission_failure();
            TaskResult::failure(&task.id, admission.to_string(), elapsed_ms(clock))
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(task_id = %task.id, panic = %message, "Task runner panicked");
            shared.stats.record_panic();
            TaskResult::failure(
                &task.id,
                format!("Task runner panicked: {}", message),
                elapsed_ms(clock),
            )
        }
    };

    shared.record(result);
    shared.publish_live_environments();
    drop(permit);
}

pub(super) fn cancelled_before_admission(task_id: &str) -> TaskResult {
    let err = ExecutionError::Cancelled("task cancelled before admission".to_string());
    TaskResult::failure(task_id, err.to_string(), 0)
}

fn elapsed_ms(clock: Instant) -> u64 {
    clock.elapsed().as_millis() as u64
}
