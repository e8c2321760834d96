//! Per-task wall-clock limit.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Wall-clock bound on a whole command sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskTimeout {
    Limited(Duration),
    Unlimited,
}

impl Default for TaskTimeout {
    fn default() -> Self {
        TaskTimeout::Limited(Duration::from_secs(300))
    }
}

impl TaskTimeout {
    pub fn seconds(secs: u64) -> Self {
        TaskTimeout::Limited(Duration::from_secs(secs))
    }

    /// Maps an optional seconds value, `None` meaning no limit.
    pub fn from_secs_opt(secs: Option<u64>) -> Self {
        secs.map(Self::seconds).unwrap_or(TaskTimeout::Unlimited)
    }

    pub fn limit(&self) -> Option<Duration> {
        match self {
            TaskTimeout::Limited(d) => Some(*d),
            TaskTimeout::Unlimited => None,
        }
    }

    /// A limit of zero can never be met by a command that has to run.
    pub fn is_already_expired(&self) -> bool {
        matches!(self, TaskTimeout::Limited(d) if d.is_zero())
    }

    /// Deadline for a run starting at `start`. A limit too large to
    /// represent as an instant has no deadline.
    pub fn deadline_from(&self, start: Instant) -> Option<Instant> {
        self.limit().and_then(|d| start.checked_add(d))
    }
}

impl std::fmt::Display for TaskTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskTimeout::Limited(d) => f.write_str(&crate::error::format_limit(*d)),
            TaskTimeout::Unlimited => f.write_str("no limit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_secs_opt() {
        assert_eq!(TaskTimeout::from_secs_opt(None), TaskTimeout::Unlimited);
        assert_eq!(
            TaskTimeout::from_secs_opt(Some(30)).limit(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_expired() {
        assert!(TaskTimeout::Limited(Duration::ZERO).is_already_expired());
        assert!(!TaskTimeout::Limited(Duration::from_millis(1)).is_already_expired());
        assert!(!TaskTimeout::Unlimited.is_already_expired());
    }

    #[test]
    fn test_deadline_saturates_to_none() {
        let start = Instant::now();
        assert_eq!(
            TaskTimeout::seconds(5).deadline_from(start),
            Some(start + Duration::from_secs(5))
        );
        assert_eq!(TaskTimeout::seconds(u64::MAX).deadline_from(start), None);
        assert_eq!(TaskTimeout::Unlimited.deadline_from(start), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(TaskTimeout::seconds(300).to_string(), "300 seconds");
        assert_eq!(TaskTimeout::Unlimited.to_string(), "no limit");
    }
}
