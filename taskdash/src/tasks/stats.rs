//! Dashboard statistics computed over the filtered view.

use chrono::{DateTime, Utc};
use serde::Serialize;
use taskdash_proto::task::{Task, TaskStatus};

/// Counts shown in the dashboard's statistics row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    /// Not done, with a due date strictly before the evaluation time.
    pub overdue: usize,
}

impl TaskStats {
    /// Computes the counts for `tasks` as of `now`.
    #[must_use]
    pub fn compute(tasks: &[Task], now: DateTime<Utc>) -> Self {
        tasks.iter().fold(
            Self {
                total: tasks.len(),
                ..Self::default()
            },
            |mut stats, task| {
                match task.status {
                    Some(TaskStatus::Done) => stats.completed += 1,
                    Some(TaskStatus::InProgress) => stats.in_progress += 1,
                    _ => {}
                }
                if task.is_overdue(now) {
                    stats.overdue += 1;
                }
                stats
            },
        )
    }
}
