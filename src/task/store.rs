//! Result store keyed by task ID.
//!
//! Every submitted task is registered up front, in submission order, so
//! enumeration follows admission order regardless of which task finishes
//! first. Each entry accepts exactly one terminal result.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::warn;

use super::types::{TaskResult, TaskStatus};

#[derive(Debug)]
struct Entry {
    status: TaskStatus,
    result: Option<TaskResult>,
}

#[derive(Debug, Default)]
struct StoreInner {
    order: Vec<String>,
    entries: HashMap<String, Entry>,
}

/// Append-only collection of task outcomes.
#[derive(Debug, Default)]
pub struct ResultStore {
    inner: RwLock<StoreInner>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task as PENDING. Returns false if the ID is already known.
    pub fn register(&self, task_id: &str) -> bool {
        let mut inner = self.inner.write().expect("result store lock poisoned");
        if inner.entries.contains_key(task_id) {
            return false;
        }
        inner.order.push(task_id.to_string());
        inner.entries.insert(
            task_id.to_string(),
            Entry {
                status: TaskStatus::Pending,
                result: None,
            },
        );
        true
    }

    /// Moves a task from PENDING to RUNNING.
    pub fn mark_running(&self, task_id: &str) -> bool {
        let mut inner = self.inner.write().expect("result store lock poisoned");
        match inner.entries.get_mut(task_id) {
            Some(entry) if entry.status.can_transition_to(TaskStatus::Running) => {
                entry.status = TaskStatus::Running;
                true
            }
            Some(entry) => {
                warn!(task_id, status = %entry.status, "Refusing to mark task running");
                false
            }
            None => {
                warn!(task_id, "Unknown task marked running");
                false
            }
        }
    }

    /// Records a terminal result.
    ///
    /// The first terminal result for a task wins. Later writes, writes for
    /// unknown tasks and non-terminal results are rejected.
    pub fn complete(&self, result: TaskResult) -> bool {
        if !result.status.is_terminal() {
            warn!(task_id = %result.task_id, status = %result.status, "Ignoring non-terminal result");
            return false;
        }

        let mut inner = self.inner.write().expect("result store lock poisoned");
        match inner.entries.get_mut(&result.task_id) {
            Some(entry) if entry.status.can_transition_to(result.status) => {
                entry.status = result.status;
                entry.result = Some(result);
                true
            }
            Some(entry) => {
                warn!(
                    task_id = %result.task_id,
                    current = %entry.status,
                    rejected = %result.status,
                    "Task already has a terminal result"
                );
                false
            }
            None => {
                warn!(task_id = %result.task_id, "Result for unknown task");
                false
            }
        }
    }

    /// Current status of a task.
    pub fn status(&self, task_id: &str) -> Option<TaskStatus> {
        let inner = self.inner.read().expect("result store lock poisoned");
        inner.entries.get(task_id).map(|e| e.status)
    }

    /// IDs of tasks that have not reached a terminal state, in order.
    pub fn unfinished(&self) -> Vec<String> {
        let inner = self.inner.read().expect("result store lock poisoned");
        inner
            .order
            .iter()
            .filter(|id| {
                inner
                    .entries
                    .get(*id)
                    .map(|e| !e.status.is_terminal())
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Terminal results recorded so far, in admission order.
    pub fn snapshot(&self) -> Vec<TaskResult> {
        let inner = self.inner.read().expect("result store lock poisoned");
        inner
            .order
            .iter()
            .filter_map(|id| inner.entries.get(id).and_then(|e| e.result.clone()))
            .collect()
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.inner.read().expect("result store lock poisoned").order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tasks currently in `status`.
    pub fn count(&self, status: TaskStatus) -> usize {
        let inner = self.inner.read().expect("result store lock poisoned");
        inner.entries.values().filter(|e| e.status == status).count()
    }

    /// Number of tasks holding a terminal result.
    pub fn completed(&self) -> usize {
        let inner = self.inner.read().expect("result store lock poisoned");
        inner.entries.values().filter(|e| e.result.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_register_rejects_duplicates() {
        let store = ResultStore::new();
        assert!(store.register("a"));
        assert!(!store.register("a"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.status("a"), Some(TaskStatus::Pending));
    }

    #[test]
    fn test_snapshot_follows_registration_order() {
        let store = ResultStore::new();
        for id in ["first", "second", "third"] {
            store.register(id);
            store.mark_running(id);
        }

        // Finish out of order.
        store.complete(TaskResult::success("third", "3", 1));
        store.complete(TaskResult::success("first", "1", 1));

        let snapshot = store.snapshot();
        let ids: Vec<_> = snapshot.iter().map(|r| r.task_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "third"]);
        assert_eq!(store.unfinished(), vec!["second".to_string()]);
    }

    #[test]
    fn test_first_terminal_result_wins() {
        let store = ResultStore::new();
        store.register("a");
        store.mark_running("a");

        assert!(store.complete(TaskResult::timeout("a", "Timeout", 1000)));
        assert!(!store.complete(TaskResult::success("a", "late", 1001)));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].status, TaskStatus::Timeout);
        assert!(!store.mark_running("a"));
    }

    #[test]
    fn test_rejects_unknown_and_non_terminal() {
        let store = ResultStore::new();
        assert!(!store.complete(TaskResult::success("ghost", "", 0)));

        store.register("a");
        assert!(!store.complete(TaskResult::new("a", TaskStatus::Running, 0)));
        assert_eq!(store.completed(), 0);
    }

    #[test]
    fn test_pending_task_can_be_cancelled() {
        let store = ResultStore::new();
        store.register("queued");
        assert!(store.complete(TaskResult::failure("queued", "cancelled", 0)));
        assert_eq!(store.status("queued"), Some(TaskStatus::Failure));
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Arc::new(ResultStore::new());
        for i in 0..32 {
            store.register(&format!("t-{i}"));
        }

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let id = format!("t-{i}");
                    store.mark_running(&id);
                    store.complete(TaskResult::success(id, "ok", 1))
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(store.completed(), 32);
        assert!(store.unfinished().is_empty());
    }
}
