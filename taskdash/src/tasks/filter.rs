//! Filter predicate over task status, priority and category.
//!
//! Each field is either `all` or one exact value; a task is in the view when
//! every field matches. A task missing an attribute only matches `all` for
//! that field.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use taskdash_proto::task::{Category, Priority, Task, TaskStatus};

/// One field of the filter predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterValue<T> {
    /// No constraint.
    All,
    /// Exactly this value.
    Only(T),
}

impl<T> Default for FilterValue<T> {
    fn default() -> Self {
        Self::All
    }
}

impl<T: PartialEq> FilterValue<T> {
    /// Whether an attribute value satisfies this field.
    pub fn matches(&self, value: Option<&T>) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => value == Some(wanted),
        }
    }
}

impl<T> FilterValue<T> {
    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl<T: fmt::Display> fmt::Display for FilterValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(value) => fmt::Display::fmt(value, f),
        }
    }
}

impl<T: FromStr> FromStr for FilterValue<T> {
    type Err = T::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Only)
        }
    }
}

impl<T: fmt::Display> Serialize for FilterValue<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Partial update of the predicate; `None` fields are left as they are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterPatch {
    pub status: Option<FilterValue<TaskStatus>>,
    pub priority: Option<FilterValue<Priority>>,
    pub category: Option<FilterValue<Category>>,
}

impl FilterPatch {
    #[must_use]
    pub fn with_status(mut self, status: FilterValue<TaskStatus>) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: FilterValue<Priority>) -> Self {
        self.priority = Some(priority);
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: FilterValue<Category>) -> Self {
        self.category = Some(category);
        self
    }
}

/// Conjunction of per-field constraints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterPredicate {
    pub status: FilterValue<TaskStatus>,
    pub priority: FilterValue<Priority>,
    pub category: FilterValue<Category>,
}

impl FilterPredicate {
    /// Overwrites the fields present in `patch`.
    pub fn merge(&mut self, patch: &FilterPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
    }

    /// `true` when every field is `all`.
    #[must_use]
    pub const fn is_unfiltered(&self) -> bool {
        self.status.is_all() && self.priority.is_all() && self.category.is_all()
    }

    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.status.matches(task.status.as_ref())
            && self.priority.matches(task.priority.as_ref())
            && self.category.matches(task.category.as_ref())
    }

    /// Builds a fresh list of the matching tasks, preserving input order.
    pub fn select<'a>(&self, tasks: impl IntoIterator<Item = &'a Task>) -> Vec<Task> {
        tasks
            .into_iter()
            .filter(|task| self.matches(task))
            .cloned()
            .collect()
    }
}

impl fmt::Display for FilterPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status={} priority={} category={}",
            self.status, self.priority, self.category
        )
    }
}
