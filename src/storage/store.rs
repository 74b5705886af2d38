use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AllocError, Result, StoreError};
use crate::storage::delta::{AdjacencyEntry, CellState, DeltaAction, EdgeProvenance};
use crate::storage::edge::Edge;
use crate::storage::edge_accessor::EdgeAccessor;
use crate::storage::mvcc::{self, AccessMode, View};
use crate::storage::transaction::Transaction;
use crate::storage::vertex::Vertex;
use crate::storage::vertex_accessor::VertexAccessor;
use crate::types::{EdgeTypeId, Gid, Timestamp, TXN_ID_FLOOR};

#[derive(Clone, Copy)]
enum Side {
    In,
    Out,
}

/// Registry of versioned objects plus the transaction plumbing needed to
/// drive them.
///
/// The store owns every vertex and edge record from creation until an
/// out-of-scope garbage collector reclaims it; deletion only plants a
/// tombstone. Commit here is the minimal orchestration the core needs: a
/// fresh timestamp and the one-time swap of the transaction's commit cell.
pub struct Store {
    config: Config,
    vertices: Mutex<FxHashMap<Gid, Arc<Vertex>>>,
    edges: Mutex<FxHashMap<Gid, Arc<Edge>>>,
    next_gid: AtomicU64,
    clock: AtomicU64,
    next_txn_id: AtomicU64,
}

impl Store {
    /// Creates an empty store with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            vertices: Mutex::new(FxHashMap::default()),
            edges: Mutex::new(FxHashMap::default()),
            next_gid: AtomicU64::new(0),
            clock: AtomicU64::new(1),
            next_txn_id: AtomicU64::new(TXN_ID_FLOOR),
        }
    }

    /// The configuration handed to every accessor.
    pub fn config(&self) -> Config {
        self.config
    }

    /// Starts a transaction with a fresh start timestamp and reserved id.
    pub fn begin_transaction(&self) -> Transaction {
        let start = self.clock.fetch_add(1, Ordering::SeqCst);
        let id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        debug!(txn = id, start, "transaction started");
        Transaction::new(id, start)
    }

    /// Commits `txn`: assigns a commit timestamp and swaps the shared cell,
    /// making every delta of the transaction visible in one step.
    pub fn commit(&self, txn: &Transaction) -> Timestamp {
        let ts = self.clock.fetch_add(1, Ordering::SeqCst);
        if txn.commit_cell().commit(txn.id(), ts) {
            debug!(txn = txn.id(), commit = ts, "transaction committed");
            return ts;
        }
        warn!(txn = txn.id(), "commit cell already swapped");
        match txn.commit_cell().load() {
            CellState::Committed(prev) => prev,
            CellState::Owned(_) => ts,
        }
    }

    /// Creates a vertex owned by `txn`, invisible to everyone else until the
    /// transaction commits.
    pub fn create_vertex<'t>(&self, txn: &'t Transaction) -> Result<VertexAccessor<'t>> {
        let gid = Gid(self.next_gid.fetch_add(1, Ordering::SeqCst));
        let vertex = Arc::new(Vertex::new(gid, txn.start_timestamp()));
        {
            let mut state = vertex.lock();
            mvcc::create_and_link_delta(txn, &mut state.core, DeltaAction::DeleteObject, None)?;
        }
        let mut vertices = self.vertices.lock();
        vertices.try_reserve(1).map_err(AllocError::from)?;
        vertices.insert(gid, Arc::clone(&vertex));
        drop(vertices);
        debug!(gid = gid.0, txn = txn.id(), "vertex created");
        Ok(VertexAccessor::new(vertex, txn, self.config, AccessMode::Live))
    }

    /// Creates an edge between two vertices, maintaining both adjacency
    /// lists. Fails with `Serialization` when either endpoint is pending
    /// under another transaction, leaving no trace on either vertex.
    pub fn create_edge<'t>(
        &self,
        txn: &'t Transaction,
        from: Gid,
        to: Gid,
        edge_type: EdgeTypeId,
    ) -> Result<EdgeAccessor<'t>> {
        let from_vertex = self
            .vertex_record(from)
            .ok_or(StoreError::NonexistentObject)?;
        let to_vertex = self.vertex_record(to).ok_or(StoreError::NonexistentObject)?;
        let gid = Gid(self.next_gid.fetch_add(1, Ordering::SeqCst));
        let out_entry = AdjacencyEntry {
            edge_type,
            vertex: to,
            edge: gid,
        };
        let in_entry = AdjacencyEntry {
            edge_type,
            vertex: from,
            edge: gid,
        };

        // One endpoint at a time; a rejection on the second side rolls the
        // first back with the inverse adjacency delta.
        self.link_adjacency(txn, &from_vertex, Side::Out, out_entry)?;
        if let Err(err) = self.link_adjacency(txn, &to_vertex, Side::In, in_entry) {
            self.unlink_adjacency(txn, &from_vertex, Side::Out, out_entry)?;
            return Err(err);
        }

        let edge = Arc::new(Edge::new(gid, from, to, edge_type, txn.start_timestamp()));
        let provenance = EdgeProvenance {
            from,
            to,
            start_ts: txn.start_timestamp(),
        };
        let created = {
            let mut state = edge.lock();
            mvcc::create_and_link_delta(
                txn,
                &mut state.core,
                DeltaAction::DeleteObject,
                Some(provenance),
            )
        };
        if let Err(err) = created {
            self.unlink_adjacency(txn, &to_vertex, Side::In, in_entry)?;
            self.unlink_adjacency(txn, &from_vertex, Side::Out, out_entry)?;
            return Err(err);
        }
        let mut edges = self.edges.lock();
        edges.try_reserve(1).map_err(AllocError::from)?;
        edges.insert(gid, Arc::clone(&edge));
        drop(edges);
        debug!(gid = gid.0, from = from.0, to = to.0, txn = txn.id(), "edge created");
        Ok(EdgeAccessor::new(
            edge,
            from_vertex,
            to_vertex,
            txn,
            self.config,
            AccessMode::Live,
        ))
    }

    /// Looks up a vertex and wraps it for `txn`, filtered by visibility
    /// under `view`.
    pub fn vertex<'t>(
        &self,
        txn: &'t Transaction,
        gid: Gid,
        mode: AccessMode,
        view: View,
    ) -> Option<VertexAccessor<'t>> {
        let vertex = self.vertex_record(gid)?;
        let accessor = VertexAccessor::new(vertex, txn, self.config, mode);
        accessor.is_visible(view).then_some(accessor)
    }

    /// Looks up an edge and wraps it for `txn`, filtered by visibility under
    /// `view`.
    pub fn edge<'t>(
        &self,
        txn: &'t Transaction,
        gid: Gid,
        mode: AccessMode,
        view: View,
    ) -> Option<EdgeAccessor<'t>> {
        let edge = self.edges.lock().get(&gid).cloned()?;
        let from_vertex = self.vertex_record(edge.from)?;
        let to_vertex = self.vertex_record(edge.to)?;
        let accessor = EdgeAccessor::new(edge, from_vertex, to_vertex, txn, self.config, mode);
        accessor.is_visible(view).then_some(accessor)
    }

    /// Plants a tombstone on the vertex. The vertex must have no edges
    /// attached; detach them first.
    pub fn delete_vertex(&self, accessor: &VertexAccessor<'_>) -> Result<()> {
        let txn = accessor.txn;
        let vertex = &accessor.vertex;
        let mut state = vertex.lock();
        let admission = mvcc::prepare_for_write(txn, &state.core)?;
        if state.core.deleted {
            return Err(StoreError::DeletedObject);
        }
        if !state.in_edges.is_empty() || !state.out_edges.is_empty() {
            return Err(StoreError::VertexHasEdges);
        }
        let effects = mvcc::register_write(&self.config, &mut state.core, admission);
        if let Some(at) = effects.anchor_at {
            txn.record_vertex_anchor(vertex.gid, at, state.props.properties())?;
        }
        mvcc::create_and_link_delta(txn, &mut state.core, DeltaAction::RecreateObject, None)?;
        state.core.deleted = true;
        debug!(gid = vertex.gid.0, txn = txn.id(), "vertex deleted");
        Ok(())
    }

    /// Plants a tombstone on the edge and detaches it from both endpoints.
    pub fn delete_edge(&self, accessor: &EdgeAccessor<'_>) -> Result<()> {
        let txn = accessor.txn;
        let edge = &accessor.edge;
        {
            let state = edge.lock();
            mvcc::prepare_for_write(txn, &state.core)?;
            if state.core.deleted {
                return Err(StoreError::DeletedObject);
            }
        }
        let out_entry = AdjacencyEntry {
            edge_type: edge.edge_type,
            vertex: edge.to,
            edge: edge.gid,
        };
        let in_entry = AdjacencyEntry {
            edge_type: edge.edge_type,
            vertex: edge.from,
            edge: edge.gid,
        };

        self.unlink_adjacency(txn, &accessor.from_vertex, Side::Out, out_entry)?;
        if let Err(err) = self.unlink_adjacency(txn, &accessor.to_vertex, Side::In, in_entry) {
            self.link_adjacency(txn, &accessor.from_vertex, Side::Out, out_entry)?;
            return Err(err);
        }

        // The tombstone itself has no inverse, so it goes last; if the edge
        // was taken or deleted in the meantime, restore both endpoints.
        let mut state = edge.lock();
        let admission = match mvcc::prepare_for_write(txn, &state.core) {
            Ok(admission) if !state.core.deleted => admission,
            outcome => {
                drop(state);
                self.link_adjacency(txn, &accessor.to_vertex, Side::In, in_entry)?;
                self.link_adjacency(txn, &accessor.from_vertex, Side::Out, out_entry)?;
                return Err(match outcome {
                    Err(err) => err,
                    Ok(_) => StoreError::DeletedObject,
                });
            }
        };
        let effects = mvcc::register_write(&self.config, &mut state.core, admission);
        if let Some(at) = effects.anchor_at {
            txn.record_edge_anchor(edge.gid, at, state.props.properties())?;
        }
        mvcc::create_and_link_delta(
            txn,
            &mut state.core,
            DeltaAction::RecreateObject,
            Some(accessor.provenance()),
        )?;
        state.core.deleted = true;
        debug!(gid = edge.gid.0, txn = txn.id(), "edge deleted");
        Ok(())
    }

    fn vertex_record(&self, gid: Gid) -> Option<Arc<Vertex>> {
        self.vertices.lock().get(&gid).cloned()
    }

    /// Adds one adjacency entry under the vertex lock: validate, link the
    /// inverse undo delta, mutate the live list.
    fn link_adjacency(
        &self,
        txn: &Transaction,
        vertex: &Arc<Vertex>,
        side: Side,
        entry: AdjacencyEntry,
    ) -> Result<()> {
        let mut state = vertex.lock();
        let admission = mvcc::prepare_for_write(txn, &state.core)?;
        if state.core.deleted {
            return Err(StoreError::DeletedObject);
        }
        let effects = mvcc::register_write(&self.config, &mut state.core, admission);
        if let Some(at) = effects.anchor_at {
            txn.record_vertex_anchor(vertex.gid, at, state.props.properties())?;
        }
        let action = match side {
            Side::Out => DeltaAction::RemoveOutEdge(entry),
            Side::In => DeltaAction::RemoveInEdge(entry),
        };
        mvcc::create_and_link_delta(txn, &mut state.core, action, None)?;
        match side {
            Side::Out => state.out_edges.push(entry),
            Side::In => state.in_edges.push(entry),
        }
        Ok(())
    }

    /// Removes one adjacency entry under the vertex lock. Fails with
    /// `DeletedObject` when the entry is already gone, which means the edge
    /// was detached by a committed concurrent deletion.
    fn unlink_adjacency(
        &self,
        txn: &Transaction,
        vertex: &Arc<Vertex>,
        side: Side,
        entry: AdjacencyEntry,
    ) -> Result<()> {
        let mut state = vertex.lock();
        let admission = mvcc::prepare_for_write(txn, &state.core)?;
        let present = match side {
            Side::Out => state.out_edges.contains(&entry),
            Side::In => state.in_edges.contains(&entry),
        };
        if !present {
            return Err(StoreError::DeletedObject);
        }
        let effects = mvcc::register_write(&self.config, &mut state.core, admission);
        if let Some(at) = effects.anchor_at {
            txn.record_vertex_anchor(vertex.gid, at, state.props.properties())?;
        }
        let action = match side {
            Side::Out => DeltaAction::AddOutEdge(entry),
            Side::In => DeltaAction::AddInEdge(entry),
        };
        mvcc::create_and_link_delta(txn, &mut state.core, action, None)?;
        match side {
            Side::Out => state.out_edges.retain(|e| *e != entry),
            Side::In => state.in_edges.retain(|e| *e != entry),
        }
        Ok(())
    }
}
