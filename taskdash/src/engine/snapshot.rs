//! Immutable view of the engine state handed to presentation.

use serde::Serialize;
use taskdash_proto::task::{Task, TaskStatus};

use crate::tasks::{FilterPredicate, TaskStats};

/// Published state after one transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Increases by one with every published transition.
    pub revision: u64,
    /// Collection entries matching `filters`, in collection order.
    pub filtered_tasks: Vec<Task>,
    pub is_loading: bool,
    /// Message of the most recent failure, cleared by the next success.
    pub error: Option<String>,
    pub filters: FilterPredicate,
    pub stats: TaskStats,
    /// Operations issued but not yet settled.
    pub in_flight: usize,
}

impl Snapshot {
    /// Filtered tasks in one board column.
    #[must_use]
    pub fn column(&self, status: TaskStatus) -> Vec<&Task> {
        self.filtered_tasks
            .iter()
            .filter(|task| task.status == Some(status))
            .collect()
    }

    /// All board columns in display order: to do, in progress, done.
    #[must_use]
    pub fn columns(&self) -> Vec<(TaskStatus, Vec<&Task>)> {
        TaskStatus::ALL
            .iter()
            .map(|&status| (status, self.column(status)))
            .collect()
    }
}
