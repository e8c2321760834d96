//! Run statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Point-in-time view of an orchestrator run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrchestratorStats {
    /// Tasks submitted.
    pub total: usize,
    /// Tasks still waiting for a capacity slot.
    pub pending: usize,
    /// Tasks admitted and not yet finished.
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    /// Environments currently live.
    pub live_environments: u64,
    /// Highest number of environments live at once.
    pub peak_live_environments: u64,
    pub provisioned: u64,
    pub torn_down: u64,
    /// Tasks refused because the runtime ran out of room.
    pub admission_failures: u64,
    /// Runners that panicked.
    pub panics: u64,
    /// Mean duration of finished tasks.
    pub average_task_duration: Duration,
}

impl OrchestratorStats {
    /// Tasks with a terminal result.
    pub fn finished(&self) -> usize {
        self.succeeded + self.failed + self.timed_out
    }

    /// Returns the success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        let finished = self.finished();
        if finished == 0 {
            return 0.0;
        }
        (self.succeeded as f64 / finished as f64) * 100.0
    }
}

/// Counters updated by runner tasks.
#[derive(Debug, Default)]
pub(crate) struct SharedStats {
    recorded: AtomicU64,
    total_duration_ms: AtomicU64,
    admission_failures: AtomicU64,
    panics: AtomicU64,
}

impl SharedStats {
    pub(crate) fn record(&self, duration_ms: u64) {
        self.recorded.fetch_add(1, Ordering::SeqCst);
        self.total_duration_ms.fetch_add(duration_ms, Ordering::SeqCst);
    }

    pub(crate) fn record_admission_failure(&self) {
        self.admission_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_panic(&self) {
        self.panics.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn admission_failures(&self) -> u64 {
        self.admission_failures.load(Ordering::SeqCst)
    }

    pub(crate) fn panics(&self) -> u64 {
        self.panics.load(Ordering::SeqCst)
    }

    pub(crate) fn average_duration(&self) -> Duration {
        let recorded = self.recorded.load(Ordering::SeqCst);
        if recorded == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.total_duration_ms.load(Ordering::SeqCst) / recorded)
    }
}
