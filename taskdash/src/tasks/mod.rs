//! Client-side task state: the canonical collection, the filter predicate
//! and the statistics derived from the filtered view.

pub mod filter;
pub mod stats;
pub mod store;

pub use filter::{FilterPatch, FilterPredicate, FilterValue};
pub use stats::TaskStats;
pub use store::TaskCollection;

use taskdash_proto::task::TaskId;

/// Defensive conditions raised by the collection store.
///
/// These never reach the published state; the engine logs them and leaves
/// the collection untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A created task carries an id already in the collection.
    #[error("task {0} is already in the collection")]
    DuplicateIdentity(TaskId),

    /// An updated task has no counterpart in the collection.
    #[error("task {0} is not in the collection")]
    MissingIdentity(TaskId),
}
