use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::error::AllocError;
use crate::storage::delta::{CommitCell, Delta};
use crate::storage::property::PropertyValue;
use crate::types::{Gid, ObjectKind, PropId, Timestamp, TXN_ID_FLOOR};

/// Full property snapshot captured by the anchor machinery.
pub type AnchorSnapshot = BTreeMap<PropId, PropertyValue>;

/// Key of one anchor archive entry: object id plus the commit timestamp of
/// the delta that headed the chain when the snapshot was taken.
pub type AnchorKey = (Gid, Timestamp);

/// Outgoing summary of a committed property edit, handed to an external
/// change-feed consumer.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeRecord {
    /// Kind of the edited object.
    pub kind: ObjectKind,
    /// Identifier of the edited object.
    pub gid: Gid,
    /// Endpoint ids for edges, `None` for vertices.
    pub endpoints: Option<(Gid, Gid)>,
    /// Effective timestamp: the commit that produced the summarized state.
    pub timestamp: Timestamp,
    /// Property map of the era that just ended.
    pub props: AnchorSnapshot,
}

/// A client transaction as seen by the versioned-object core.
///
/// The core consumes the id, start timestamp and commit cell as given facts;
/// assigning the final commit timestamp is the commit orchestrator's job. The
/// transaction additionally buffers the anchor archive and the change feed
/// until external collaborators drain them.
#[derive(Debug)]
pub struct Transaction {
    id: Timestamp,
    start_ts: Timestamp,
    commit_cell: Arc<CommitCell>,
    deltas: Mutex<Vec<Arc<Delta>>>,
    vertex_anchors: Mutex<FxHashMap<AnchorKey, AnchorSnapshot>>,
    edge_anchors: Mutex<FxHashMap<AnchorKey, AnchorSnapshot>>,
    changes: Mutex<Vec<ChangeRecord>>,
}

impl Transaction {
    pub(crate) fn new(id: Timestamp, start_ts: Timestamp) -> Self {
        debug_assert!(id >= TXN_ID_FLOOR);
        Self {
            id,
            start_ts,
            commit_cell: Arc::new(CommitCell::owned_by(id)),
            deltas: Mutex::new(Vec::new()),
            vertex_anchors: Mutex::new(FxHashMap::default()),
            edge_anchors: Mutex::new(FxHashMap::default()),
            changes: Mutex::new(Vec::new()),
        }
    }

    /// The reserved transaction id.
    pub fn id(&self) -> Timestamp {
        self.id
    }

    /// The start timestamp defining this transaction's snapshot horizon.
    pub fn start_timestamp(&self) -> Timestamp {
        self.start_ts
    }

    /// The shared commit-timestamp cell every delta of this transaction
    /// points at.
    pub fn commit_cell(&self) -> &Arc<CommitCell> {
        &self.commit_cell
    }

    /// Appends a delta to the transaction's delta list, keeping it alive for
    /// the out-of-scope reclamation collaborator.
    pub(crate) fn hold_delta(&self, delta: Arc<Delta>) -> Result<(), AllocError> {
        let mut deltas = self.deltas.lock();
        deltas.try_reserve(1)?;
        deltas.push(delta);
        Ok(())
    }

    pub(crate) fn record_vertex_anchor(
        &self,
        gid: Gid,
        at: Timestamp,
        snapshot: AnchorSnapshot,
    ) -> Result<(), AllocError> {
        trace!(gid = gid.0, at, "vertex anchor snapshot captured");
        let mut anchors = self.vertex_anchors.lock();
        anchors.try_reserve(1)?;
        anchors.insert((gid, at), snapshot);
        Ok(())
    }

    pub(crate) fn record_edge_anchor(
        &self,
        gid: Gid,
        at: Timestamp,
        snapshot: AnchorSnapshot,
    ) -> Result<(), AllocError> {
        trace!(gid = gid.0, at, "edge anchor snapshot captured");
        let mut anchors = self.edge_anchors.lock();
        anchors.try_reserve(1)?;
        anchors.insert((gid, at), snapshot);
        Ok(())
    }

    pub(crate) fn record_change(&self, record: ChangeRecord) -> Result<(), AllocError> {
        let mut changes = self.changes.lock();
        changes.try_reserve(1)?;
        changes.push(record);
        Ok(())
    }

    /// Drains the vertex anchor archive for the durability collaborator.
    pub fn take_vertex_anchors(&self) -> FxHashMap<AnchorKey, AnchorSnapshot> {
        std::mem::take(&mut *self.vertex_anchors.lock())
    }

    /// Drains the edge anchor archive for the durability collaborator.
    pub fn take_edge_anchors(&self) -> FxHashMap<AnchorKey, AnchorSnapshot> {
        std::mem::take(&mut *self.edge_anchors.lock())
    }

    /// Drains the change-notification buffer for the change-feed consumer.
    pub fn take_changes(&self) -> Vec<ChangeRecord> {
        std::mem::take(&mut *self.changes.lock())
    }

    /// Number of deltas this transaction has created so far.
    pub fn delta_count(&self) -> usize {
        self.deltas.lock().len()
    }
}
