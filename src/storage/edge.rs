use parking_lot::{Mutex, MutexGuard};

use crate::storage::mvcc::VersionCore;
use crate::storage::property::PropertyStore;
use crate::types::{EdgeTypeId, Gid, Timestamp};

/// Core edge record: endpoints, live property state and the undo chain head.
#[derive(Debug)]
pub struct Edge {
    /// Stable identifier, never reused.
    pub gid: Gid,
    /// Source vertex.
    pub from: Gid,
    /// Destination vertex.
    pub to: Gid,
    /// Type of the edge.
    pub edge_type: EdgeTypeId,
    state: Mutex<EdgeState>,
}

#[derive(Debug)]
pub(crate) struct EdgeState {
    pub core: VersionCore,
    pub props: PropertyStore,
}

impl Edge {
    pub(crate) fn new(
        gid: Gid,
        from: Gid,
        to: Gid,
        edge_type: EdgeTypeId,
        created_st: Timestamp,
    ) -> Self {
        Self {
            gid,
            from,
            to,
            edge_type,
            state: Mutex::new(EdgeState {
                core: VersionCore::new(created_st),
                props: PropertyStore::default(),
            }),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, EdgeState> {
        self.state.lock()
    }
}
