use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::storage::property::PropertyValue;
use crate::types::{EdgeTypeId, Gid, LabelId, PropId, Timestamp, TXN_ID_FLOOR};

/// State read out of a [`CommitCell`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CellState {
    /// The owning transaction has not committed; the value is its id.
    Owned(Timestamp),
    /// The owning transaction committed at this timestamp.
    Committed(Timestamp),
}

/// Shared timestamp cell, one per transaction.
///
/// Every delta a transaction creates holds a handle to the same cell. While
/// the transaction runs, the cell carries its reserved id (at or above
/// [`TXN_ID_FLOOR`]); commit swaps it exactly once to the commit timestamp,
/// making all of that transaction's deltas visible in one step.
#[derive(Debug)]
pub struct CommitCell(AtomicU64);

impl CommitCell {
    /// Creates a cell owned by the given transaction id.
    pub fn owned_by(txn_id: Timestamp) -> Self {
        debug_assert!(txn_id >= TXN_ID_FLOOR);
        Self(AtomicU64::new(txn_id))
    }

    /// Reads the cell with acquire ordering.
    pub fn load(&self) -> CellState {
        let raw = self.0.load(Ordering::Acquire);
        if raw >= TXN_ID_FLOOR {
            CellState::Owned(raw)
        } else {
            CellState::Committed(raw)
        }
    }

    /// Performs the one-time owned-to-committed transition.
    ///
    /// Returns `false` when the cell was already committed; the stored
    /// timestamp is left untouched in that case.
    pub fn commit(&self, txn_id: Timestamp, commit_ts: Timestamp) -> bool {
        debug_assert!(commit_ts < TXN_ID_FLOOR);
        self.0
            .compare_exchange(txn_id, commit_ts, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// One entry of a vertex adjacency list: the edge type, the opposite vertex,
/// and the edge object itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AdjacencyEntry {
    /// Type of the edge.
    pub edge_type: EdgeTypeId,
    /// The vertex on the other end.
    pub vertex: Gid,
    /// The edge object.
    pub edge: Gid,
}

/// Undo payload of one [`Delta`].
#[derive(Clone, Debug)]
pub enum DeltaAction {
    /// Undo of object creation: replaying it means no version of the object
    /// exists at the viewer's horizon.
    DeleteObject,
    /// Undo of object deletion: replaying it clears the tombstone.
    RecreateObject,
    /// Undo of a label removal: the prior state carried this label.
    AddLabel(LabelId),
    /// Undo of a label addition: the prior state lacked this label.
    RemoveLabel(LabelId),
    /// Undo of a property write: the prior value of `key`, `Null` when the
    /// key did not exist.
    SetProperty {
        /// Property key the write touched.
        key: PropId,
        /// Value the key held before the write.
        value: PropertyValue,
    },
    /// Undo of an in-edge removal.
    AddInEdge(AdjacencyEntry),
    /// Undo of an out-edge removal.
    AddOutEdge(AdjacencyEntry),
    /// Undo of an in-edge addition.
    RemoveInEdge(AdjacencyEntry),
    /// Undo of an out-edge addition.
    RemoveOutEdge(AdjacencyEntry),
}

/// Cross-reference carried by deltas linked on edge objects, consumed by the
/// anchor archive collaborator.
#[derive(Clone, Copy, Debug)]
pub struct EdgeProvenance {
    /// Source vertex of the edge.
    pub from: Gid,
    /// Destination vertex of the edge.
    pub to: Gid,
    /// Start timestamp of the transaction that produced the delta.
    pub start_ts: Timestamp,
}

/// Undo-log record for one change to a versioned object.
///
/// Chains are newest-first and append-only: `next` points at the
/// chronologically preceding delta and never changes after construction, so
/// readers walk the chain without holding the object lock.
#[derive(Debug)]
pub struct Delta {
    /// The undo operation itself.
    pub action: DeltaAction,
    /// Cross-reference present on edge-object deltas.
    pub provenance: Option<EdgeProvenance>,
    timestamp: Arc<CommitCell>,
    next: Option<Arc<Delta>>,
}

impl Delta {
    pub(crate) fn link(
        action: DeltaAction,
        timestamp: Arc<CommitCell>,
        next: Option<Arc<Delta>>,
        provenance: Option<EdgeProvenance>,
    ) -> Self {
        Self {
            action,
            provenance,
            timestamp,
            next,
        }
    }

    /// Current commit state of the owning transaction.
    pub fn state(&self) -> CellState {
        self.timestamp.load()
    }

    /// The chronologically preceding delta, if any.
    pub fn next(&self) -> Option<&Arc<Delta>> {
        self.next.as_ref()
    }
}
