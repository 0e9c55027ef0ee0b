//! In-memory task storage behind the HTTP API.
//!
//! Tasks are kept in creation order. New tasks get a random hex id and
//! start in the `todo` column.

use taskdash_proto::task::{Task, TaskDraft, TaskId, TaskPatch, ValidationError};
use tokio::sync::RwLock;

/// Message returned for unknown task ids.
pub const NOT_FOUND_MESSAGE: &str = "Task not found";

/// Failures of store operations, mapped to HTTP statuses by the API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The request payload failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// No task has the given id.
    #[error("{}", NOT_FOUND_MESSAGE)]
    NotFound(TaskId),
}

/// Thread-safe task list.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: RwLock<Vec<Task>>,
}

impl TaskStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `tasks`.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: RwLock::new(tasks),
        }
    }

    /// All tasks in creation order.
    pub async fn list(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Validates `draft`, assigns an id and stores the new task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if the title is blank or too long.
    pub async fn create(&self, draft: TaskDraft) -> Result<Task, StoreError> {
        draft.validate()?;
        let id = TaskId::new(uuid::Uuid::now_v7().simple().to_string());
        let task = Task::from_draft(id, draft);
        self.tasks.write().await.push(task.clone());
        Ok(task)
    }

    /// Applies `patch` to the task with `id` and returns the updated task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for an invalid new title, or
    /// [`StoreError::NotFound`] if no task has `id`.
    pub async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, StoreError> {
        patch.validate()?;
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == *id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        patch.apply_to(task);
        Ok(task.clone())
    }

    /// Removes the task with `id` and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no task has `id`.
    pub async fn delete(&self, id: &TaskId) -> Result<Task, StoreError> {
        let mut tasks = self.tasks.write().await;
        let pos = tasks
            .iter()
            .position(|t| t.id == *id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        Ok(tasks.remove(pos))
    }
}
