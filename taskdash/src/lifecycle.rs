//! Request lifecycle tracking.
//!
//! Every gateway call is registered as an operation that moves from
//! `pending` to exactly one of `fulfilled` or `rejected`. The tracker keeps
//! the loading flag (driven by fetch-all only) and the single latest error
//! message, and refuses to settle an operation twice.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

/// Identifier assigned to an operation when it becomes pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OperationId(u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// The gateway call an operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    FetchAll,
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FetchAll => "fetch_all",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Lifecycle phase of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Pending,
    Fulfilled,
    Rejected,
}

impl Phase {
    /// `true` for `fulfilled` and `rejected`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Fulfilled => "fulfilled",
            Self::Rejected => "rejected",
        })
    }
}

/// A single lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LifecycleEvent {
    pub id: OperationId,
    pub kind: OperationKind,
    pub phase: Phase,
}

/// Errors returned by [`LifecycleTracker`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// The operation is unknown or has already settled.
    #[error("operation {0} is not in flight")]
    NotInFlight(OperationId),
    /// The confirmation payload belongs to a different kind of operation.
    #[error("operation {id} is a {expected} but was confirmed as {actual}")]
    KindMismatch {
        id: OperationId,
        expected: OperationKind,
        actual: OperationKind,
    },
}

/// Tracks in-flight operations, the loading flag and the latest error.
#[derive(Debug, Default)]
pub struct LifecycleTracker {
    next_id: u64,
    in_flight: HashMap<OperationId, OperationKind>,
    loading: bool,
    error: Option<String>,
}

impl LifecycleTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new pending operation.
    ///
    /// A pending fetch-all raises the loading flag. The recorded error is
    /// left in place until some operation succeeds.
    pub fn begin(&mut self, kind: OperationKind) -> LifecycleEvent {
        self.next_id += 1;
        let id = OperationId(self.next_id);
        self.in_flight.insert(id, kind);
        if kind == OperationKind::FetchAll {
            self.loading = true;
        }
        LifecycleEvent {
            id,
            kind,
            phase: Phase::Pending,
        }
    }

    /// Marks an operation as fulfilled and clears the latest error.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotInFlight`] if `id` is unknown or has
    /// already settled; nothing changes in that case.
    pub fn fulfill(&mut self, id: OperationId) -> Result<LifecycleEvent, LifecycleError> {
        let kind = self.settle(id)?;
        self.error = None;
        Ok(LifecycleEvent {
            id,
            kind,
            phase: Phase::Fulfilled,
        })
    }

    /// Marks an operation as rejected and records `message` as the latest
    /// error, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotInFlight`] if `id` is unknown or has
    /// already settled; nothing changes in that case.
    pub fn reject(
        &mut self,
        id: OperationId,
        message: impl Into<String>,
    ) -> Result<LifecycleEvent, LifecycleError> {
        let kind = self.settle(id)?;
        self.error = Some(message.into());
        Ok(LifecycleEvent {
            id,
            kind,
            phase: Phase::Rejected,
        })
    }

    fn settle(&mut self, id: OperationId) -> Result<OperationKind, LifecycleError> {
        let kind = self
            .in_flight
            .remove(&id)
            .ok_or(LifecycleError::NotInFlight(id))?;
        // A single flag: any settled fetch-all clears it, even when another
        // fetch-all is still outstanding.
        if kind == OperationKind::FetchAll {
            self.loading = false;
        }
        Ok(kind)
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Kind of an in-flight operation, `None` once it has settled.
    #[must_use]
    pub fn kind_of(&self, id: OperationId) -> Option<OperationKind> {
        self.in_flight.get(&id).copied()
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}
