//! Synchronous core of the engine.
//!
//! [`TaskState`] owns the canonical collection, the filter predicate, the
//! derived view and the lifecycle tracker. Every mutating method finishes
//! with the view recomputed, so a [`Snapshot`] taken after any call is
//! consistent. The actor in [`super`] is the only owner at runtime; tests
//! drive this type directly.

use chrono::{DateTime, Utc};
use taskdash_proto::task::{Task, TaskId};

use super::snapshot::Snapshot;
use crate::gateway::GatewayError;
use crate::lifecycle::{LifecycleError, LifecycleEvent, LifecycleTracker, OperationId, OperationKind};
use crate::tasks::{FilterPatch, FilterPredicate, StoreError, TaskCollection, TaskStats};

/// Payload of a successful gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Fetched(Vec<Task>),
    Created(Task),
    Updated(Task),
    Deleted(TaskId),
}

impl Confirmation {
    /// The operation kind this payload settles.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Fetched(_) => OperationKind::FetchAll,
            Self::Created(_) => OperationKind::Create,
            Self::Updated(_) => OperationKind::Update,
            Self::Deleted(_) => OperationKind::Delete,
        }
    }
}

/// Collection, predicate, view and tracker under a single owner.
#[derive(Debug, Default)]
pub struct TaskState {
    collection: TaskCollection,
    filters: FilterPredicate,
    view: Vec<Task>,
    tracker: LifecycleTracker,
    revision: u64,
}

impl TaskState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Collection store
    // -----------------------------------------------------------------------

    /// Replaces the collection with a fetched list.
    pub fn apply_fetch_all(&mut self, tasks: Vec<Task>) {
        let dropped = self.collection.replace_all(tasks);
        for id in &dropped {
            tracing::warn!(task = %id, "fetched list repeats task id, keeping first occurrence");
        }
        self.recompute();
    }

    /// Appends a created task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateIdentity`] if the id already exists;
    /// the collection is left unchanged.
    pub fn apply_create(&mut self, task: Task) -> Result<(), StoreError> {
        let result = self.collection.insert(task);
        if let Err(err) = &result {
            tracing::warn!(error = %err, "ignoring created task");
        }
        self.recompute();
        result
    }

    /// Replaces the entry with the updated task's id, in place.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingIdentity`] if no entry has that id; the
    /// collection is left unchanged.
    pub fn apply_update(&mut self, task: Task) -> Result<(), StoreError> {
        let result = self.collection.replace(task);
        if let Err(err) = &result {
            tracing::warn!(error = %err, "ignoring updated task");
        }
        self.recompute();
        result
    }

    /// Removes the task with `id`. Returns `false` if it was not present.
    pub fn apply_delete(&mut self, id: &TaskId) -> bool {
        let removed = self.collection.remove(id).is_some();
        if !removed {
            tracing::debug!(task = %id, "deleted task was not in the collection");
        }
        self.recompute();
        removed
    }

    // -----------------------------------------------------------------------
    // Filter engine
    // -----------------------------------------------------------------------

    /// Merges `patch` into the predicate and rebuilds the view.
    pub fn set_filter(&mut self, patch: &FilterPatch) {
        self.filters.merge(patch);
        tracing::debug!(filters = %self.filters, "filter changed");
        self.recompute();
    }

    /// Resets every field to `all` and rebuilds the view.
    pub fn clear_filter(&mut self) {
        self.filters = FilterPredicate::default();
        tracing::debug!("filter cleared");
        self.recompute();
    }

    fn recompute(&mut self) {
        self.view = self.filters.select(&self.collection);
        self.revision += 1;
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Registers a new pending operation.
    pub fn begin(&mut self, kind: OperationKind) -> LifecycleEvent {
        let event = self.tracker.begin(kind);
        self.revision += 1;
        tracing::debug!(op = %event.id, kind = %kind, "operation pending");
        event
    }

    /// Settles an operation with the gateway's result.
    ///
    /// A confirmation is forwarded to the matching store operation and then
    /// the operation is marked fulfilled; a failure records its message and
    /// leaves the collection untouched.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotInFlight`] if `id` is unknown or already
    /// settled, and [`LifecycleError::KindMismatch`] if a confirmation does
    /// not belong to the operation's kind. Nothing changes in either case.
    pub fn settle(
        &mut self,
        id: OperationId,
        result: Result<Confirmation, GatewayError>,
    ) -> Result<LifecycleEvent, LifecycleError> {
        let Some(kind) = self.tracker.kind_of(id) else {
            tracing::warn!(op = %id, "ignoring result for operation that is not in flight");
            return Err(LifecycleError::NotInFlight(id));
        };

        let event = match result {
            Ok(confirmation) => {
                let actual = confirmation.kind();
                if actual != kind {
                    tracing::warn!(
                        op = %id,
                        expected = %kind,
                        actual = %actual,
                        "ignoring mismatched confirmation"
                    );
                    return Err(LifecycleError::KindMismatch {
                        id,
                        expected: kind,
                        actual,
                    });
                }
                // Advances the revision through the store update.
                self.confirm(confirmation);
                let event = self.tracker.fulfill(id)?;
                tracing::debug!(op = %id, kind = %kind, "operation fulfilled");
                event
            }
            Err(err) => {
                let event = self.tracker.reject(id, err.message())?;
                tracing::warn!(op = %id, kind = %kind, error = %err, "operation rejected");
                self.revision += 1;
                event
            }
        };
        Ok(event)
    }

    fn confirm(&mut self, confirmation: Confirmation) {
        // Store conditions are logged inside the apply operations and never
        // fail the operation itself.
        match confirmation {
            Confirmation::Fetched(tasks) => self.apply_fetch_all(tasks),
            Confirmation::Created(task) => {
                let _ = self.apply_create(task);
            }
            Confirmation::Updated(task) => {
                let _ = self.apply_update(task);
            }
            Confirmation::Deleted(id) => {
                self.apply_delete(&id);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[must_use]
    pub const fn collection(&self) -> &TaskCollection {
        &self.collection
    }

    #[must_use]
    pub const fn filters(&self) -> &FilterPredicate {
        &self.filters
    }

    /// The derived filtered view.
    #[must_use]
    pub fn view(&self) -> &[Task] {
        &self.view
    }

    #[must_use]
    pub const fn tracker(&self) -> &LifecycleTracker {
        &self.tracker
    }

    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Captures the current state, evaluating overdue tasks against `now`.
    #[must_use]
    pub fn snapshot(&self, now: DateTime<Utc>) -> Snapshot {
        Snapshot {
            revision: self.revision,
            filtered_tasks: self.view.clone(),
            is_loading: self.tracker.is_loading(),
            error: self.tracker.error().map(str::to_string),
            filters: self.filters,
            stats: TaskStats::compute(&self.view, now),
            in_flight: self.tracker.in_flight(),
        }
    }
}
