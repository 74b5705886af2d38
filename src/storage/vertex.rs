use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;

use crate::storage::delta::AdjacencyEntry;
use crate::storage::mvcc::VersionCore;
use crate::storage::property::PropertyStore;
use crate::types::{Gid, LabelId, Timestamp};

/// Core vertex record: live state plus the head of its undo chain.
///
/// Owned by the store for the vertex's full lifetime; a `DeleteObject`
/// tombstone makes it invisible but never removes the record while deltas
/// referencing it may still be read.
#[derive(Debug)]
pub struct Vertex {
    /// Stable identifier, never reused.
    pub gid: Gid,
    state: Mutex<VertexState>,
}

#[derive(Debug)]
pub(crate) struct VertexState {
    pub core: VersionCore,
    pub labels: SmallVec<[LabelId; 4]>,
    pub props: PropertyStore,
    pub in_edges: SmallVec<[AdjacencyEntry; 4]>,
    pub out_edges: SmallVec<[AdjacencyEntry; 4]>,
}

impl Vertex {
    pub(crate) fn new(gid: Gid, created_st: Timestamp) -> Self {
        Self {
            gid,
            state: Mutex::new(VertexState {
                core: VersionCore::new(created_st),
                labels: SmallVec::new(),
                props: PropertyStore::default(),
                in_edges: SmallVec::new(),
                out_edges: SmallVec::new(),
            }),
        }
    }

    /// Acquires the per-object lock. Critical sections stay short: snapshot
    /// for reads, validate-link-mutate for writes.
    pub(crate) fn lock(&self) -> MutexGuard<'_, VertexState> {
        self.state.lock()
    }
}
