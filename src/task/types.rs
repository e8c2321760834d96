//! Task, status and result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of work handed to the orchestrator.
///
/// The JSON shape matches what coding agents are asked to produce, so a
/// task list read back from an environment deserializes directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Externally assigned identifier, unique within one submission.
    #[serde(rename = "ID")]
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub related_files: Vec<String>,
    /// Follow-up work. Carried along but never scheduled by the orchestrator.
    #[serde(default)]
    pub following_tasks: Vec<Task>,
    /// Informational only; admission is FIFO.
    #[serde(default)]
    pub priority: i64,
}

impl Task {
    /// Creates a task with no related files, no follow-ups and priority 0.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            related_files: Vec::new(),
            following_tasks: Vec::new(),
            priority: 0,
        }
    }

    pub fn with_related_files(mut self, files: Vec<String>) -> Self {
        self.related_files = files;
        self
    }

    pub fn with_following_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.following_tasks = tasks;
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failure,
    Timeout,
}

impl TaskStatus {
    /// Returns true for SUCCESS, FAILURE and TIMEOUT.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failure | TaskStatus::Timeout
        )
    }

    /// Checks whether moving from `self` to `next` respects
    /// PENDING -> RUNNING -> terminal.
    ///
    /// PENDING may jump straight to a terminal state when a task is
    /// cancelled before it is admitted.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match (self, next) {
            (TaskStatus::Pending, TaskStatus::Running) => true,
            (TaskStatus::Pending, s) | (TaskStatus::Running, s) => s.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failure => "failure",
            TaskStatus::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub status: TaskStatus,
    /// Captured stdout, each command's output prefixed by `$ <command>`.
    pub report: String,
    #[serde(default)]
    pub error_detail: Option<String>,
    /// Name of the environment that ran the task, if one was provisioned.
    #[serde(default)]
    pub environment: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl TaskResult {
    /// Builds a result that started `duration_ms` before now.
    pub fn new(task_id: impl Into<String>, status: TaskStatus, duration_ms: u64) -> Self {
        let finished_at = Utc::now();
        let started_at = finished_at - chrono::Duration::milliseconds(duration_ms as i64);
        Self {
            task_id: task_id.into(),
            status,
            report: String::new(),
            error_detail: None,
            environment: None,
            started_at,
            finished_at,
            duration_ms,
        }
    }

    pub fn success(task_id: impl Into<String>, report: impl Into<String>, duration_ms: u64) -> Self {
        Self::new(task_id, TaskStatus::Success, duration_ms).with_report(report)
    }

    pub fn failure(task_id: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self::new(task_id, TaskStatus::Failure, duration_ms).with_error(error)
    }

    pub fn timeout(task_id: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self::new(task_id, TaskStatus::Timeout, duration_ms).with_error(error)
    }

    pub fn with_report(mut self, report: impl Into<String>) -> Self {
        self.report = report.into();
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        let error = error.into();
        self.error_detail = if error.is_empty() { None } else { Some(error) };
        self
    }

    pub fn with_environment(mut self, name: impl Into<String>) -> Self {
        self.environment = Some(name.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}
