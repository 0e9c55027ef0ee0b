//! Canonical collection of server-confirmed tasks.
//!
//! Tasks are kept in the order the service returned them (creates append),
//! with an id index alongside for constant-time lookup.

use std::collections::HashMap;

use taskdash_proto::task::{Task, TaskId};

use super::StoreError;

/// Ordered, id-unique list of confirmed tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskCollection {
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
}

impl TaskCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole collection with `tasks`.
    ///
    /// When an id appears more than once only its first occurrence is kept.
    /// Returns the ids that were dropped.
    pub fn replace_all(&mut self, tasks: Vec<Task>) -> Vec<TaskId> {
        self.tasks.clear();
        self.index.clear();
        let mut dropped = Vec::new();
        for task in tasks {
            if self.index.contains_key(&task.id) {
                dropped.push(task.id);
                continue;
            }
            self.index.insert(task.id.clone(), self.tasks.len());
            self.tasks.push(task);
        }
        dropped
    }

    /// Appends a newly created task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateIdentity`] if the id is already present.
    pub fn insert(&mut self, task: Task) -> Result<(), StoreError> {
        if self.index.contains_key(&task.id) {
            return Err(StoreError::DuplicateIdentity(task.id));
        }
        self.index.insert(task.id.clone(), self.tasks.len());
        self.tasks.push(task);
        Ok(())
    }

    /// Replaces the entry sharing `task`'s id, keeping its position.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingIdentity`] if no entry has that id.
    pub fn replace(&mut self, task: Task) -> Result<(), StoreError> {
        match self.index.get(&task.id) {
            Some(&pos) => {
                self.tasks[pos] = task;
                Ok(())
            }
            None => Err(StoreError::MissingIdentity(task.id)),
        }
    }

    /// Removes the task with `id`, returning it if it was present.
    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let pos = self.index.remove(id)?;
        let task = self.tasks.remove(pos);
        for (offset, shifted) in self.tasks[pos..].iter().enumerate() {
            if let Some(slot) = self.index.get_mut(&shifted.id) {
                *slot = pos + offset;
            }
        }
        Some(task)
    }

    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.index.get(id).map(|&pos| &self.tasks[pos])
    }

    #[must_use]
    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks in collection order.
    #[must_use]
    pub fn as_slice(&self) -> &[Task] {
        &self.tasks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Task> {
        self.tasks.iter()
    }
}

impl<'a> IntoIterator for &'a TaskCollection {
    type Item = &'a Task;
    type IntoIter = std::slice::Iter<'a, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
