//! Task model and request payloads exchanged with the task service.
//!
//! Field names follow the service's JSON contract: the identifier is
//! carried as `_id` and the due date as `dueDate`. Enumerations travel as
//! their lowercase names (`todo`, `inprogress`, `done`, ...).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Maximum allowed task title length in characters.
pub const MAX_TASK_TITLE_LENGTH: usize = 256;

/// Server-assigned opaque task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps an identifier string issued by the task service.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Error returned when a wire string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseVariantError {
    /// Which enumeration was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Declares the string forms of a wire enumeration once and derives
/// `as_str`, `Display`, `FromStr` and the `ALL` list from them.
macro_rules! wire_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in display order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Returns the wire name of this variant.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseVariantError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseVariantError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Board column a task sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Not started.
    Todo,
    /// Actively being worked on.
    InProgress,
    /// Finished.
    Done,
}

wire_enum!(TaskStatus, "status", {
    Todo => "todo",
    InProgress => "inprogress",
    Done => "done",
});

/// Task urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

wire_enum!(Priority, "priority", {
    High => "high",
    Medium => "medium",
    Low => "low",
});

/// Task grouping label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Work,
    Personal,
    Urgent,
    #[default]
    Other,
}

wire_enum!(Category, "category", {
    Work => "work",
    Personal => "personal",
    Urgent => "urgent",
    Other => "other",
});

/// A task record as confirmed by the task service.
///
/// Status, priority and category are optional because the service may
/// return records where they are missing or `null`; such records are kept
/// verbatim rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Server-assigned identifier, immutable after creation.
    #[serde(rename = "_id")]
    pub id: TaskId,
    /// Task title.
    pub title: String,
    /// Free-form description, empty when the service omits it.
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub category: Option<Category>,
    /// Optional deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates a `todo` task with default priority and category.
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status: Some(TaskStatus::Todo),
            priority: Some(Priority::default()),
            category: Some(Category::default()),
            due_date: None,
        }
    }

    /// Builds the record the service would return for a freshly created draft.
    #[must_use]
    pub fn from_draft(id: TaskId, draft: TaskDraft) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            status: Some(TaskStatus::Todo),
            priority: Some(draft.priority),
            category: Some(draft.category),
            due_date: draft.due_date,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    /// A task is overdue when it has a due date strictly before `now` and
    /// is not done.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != Some(TaskStatus::Done) && self.due_date.is_some_and(|due| due < now)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Validation failures for outgoing task payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Task title cannot be empty.
    #[error("task title cannot be empty")]
    TitleEmpty,
    /// Task title exceeds the maximum length.
    #[error("task title too long (max {} characters)", MAX_TASK_TITLE_LENGTH)]
    TitleTooLong,
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::TitleEmpty);
    }
    if title.chars().count() > MAX_TASK_TITLE_LENGTH {
        return Err(ValidationError::TitleTooLong);
    }
    Ok(())
}

/// Body of a create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskDraft {
    /// Creates a draft with an empty description and default priority and category.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            priority: Priority::default(),
            category: Category::default(),
            due_date: None,
        }
    }

    /// Checks the draft before it is sent.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TitleEmpty`] for a blank title, or
    /// [`ValidationError::TitleTooLong`] if it exceeds
    /// [`MAX_TASK_TITLE_LENGTH`] characters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)
    }
}

/// Body of an update request. Absent fields are left unchanged.
///
/// `due_date` distinguishes "leave as is" (`None`) from "clear"
/// (`Some(None)`, sent as `null`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    /// Patch that only moves the task to another column.
    #[must_use]
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Returns `true` when the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.category.is_none()
            && self.due_date.is_none()
    }

    /// Checks the fields the patch sets.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if a new title is blank or too long.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.title {
            Some(title) => validate_title(title),
            None => Ok(()),
        }
    }

    /// Writes the patched fields into `task`.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            task.description.clone_from(description);
        }
        if let Some(status) = self.status {
            task.status = Some(status);
        }
        if let Some(priority) = self.priority {
            task.priority = Some(priority);
        }
        if let Some(category) = self.category {
            task.category = Some(category);
        }
        if let Some(due) = self.due_date {
            task.due_date = due;
        }
    }
}

/// Error body returned by the task service on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
