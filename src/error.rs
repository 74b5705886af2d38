//! Error taxonomy of the versioned-object core.

use std::collections::TryReserveError;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Memory reservation failed on a write path.
///
/// Kept as its own type so callers can never confuse an out-of-memory
/// condition with the logical error kinds in [`StoreError`].
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("memory reservation failed: {0}")]
pub struct AllocError(#[from] pub TryReserveError);

/// Errors surfaced by the versioned-object core.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum StoreError {
    /// The engine configuration disables properties on this object kind.
    #[error("properties are disabled on this object kind")]
    PropertiesDisabled,
    /// Another transaction owns the uncommitted head of the delta chain.
    /// First-writer-wins; the caller should retry in a fresh transaction.
    #[error("write-write conflict on a pending object")]
    Serialization,
    /// The visible version of the object is a tombstone. Stale values can
    /// still be read through an include-deleted accessor.
    #[error("object is deleted under the requested view")]
    DeletedObject,
    /// Chain replay shows no version of the object at the requested view,
    /// commonly a stale id.
    #[error("object has no visible version under the requested view")]
    NonexistentObject,
    /// The vertex still has edges attached; detach them first.
    #[error("vertex still has edges attached")]
    VertexHasEdges,
    /// Fatal allocation failure, never produced by logical validation.
    #[error(transparent)]
    Alloc(#[from] AllocError),
}
