use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::storage::delta::{DeltaAction, EdgeProvenance};
use crate::storage::edge::{Edge, EdgeState};
use crate::storage::mvcc::{self, AccessMode, Resolution, View, WriteAdmission};
use crate::storage::property::{self, PropertyValue};
use crate::storage::transaction::{ChangeRecord, Transaction};
use crate::storage::vertex::Vertex;
use crate::storage::vertex_accessor::VertexAccessor;
use crate::types::{EdgeTypeId, Gid, ObjectKind, PropId};

/// Transaction-bound façade over one edge.
///
/// Holds both endpoint records so vertex accessors can be constructed without
/// going back to the store.
#[derive(Clone)]
pub struct EdgeAccessor<'t> {
    pub(crate) edge: Arc<Edge>,
    pub(crate) from_vertex: Arc<Vertex>,
    pub(crate) to_vertex: Arc<Vertex>,
    pub(crate) txn: &'t Transaction,
    config: Config,
    mode: AccessMode,
}

impl<'t> EdgeAccessor<'t> {
    pub(crate) fn new(
        edge: Arc<Edge>,
        from_vertex: Arc<Vertex>,
        to_vertex: Arc<Vertex>,
        txn: &'t Transaction,
        config: Config,
        mode: AccessMode,
    ) -> Self {
        Self {
            edge,
            from_vertex,
            to_vertex,
            txn,
            config,
            mode,
        }
    }

    /// The edge identifier.
    pub fn gid(&self) -> Gid {
        self.edge.gid
    }

    /// The edge type.
    pub fn edge_type(&self) -> EdgeTypeId {
        self.edge.edge_type
    }

    /// The access mode this accessor was constructed with.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Accessor for the source vertex, bound to the same transaction.
    pub fn from_vertex(&self) -> VertexAccessor<'t> {
        VertexAccessor::new(
            Arc::clone(&self.from_vertex),
            self.txn,
            self.config,
            AccessMode::Live,
        )
    }

    /// Accessor for the destination vertex, bound to the same transaction.
    pub fn to_vertex(&self) -> VertexAccessor<'t> {
        VertexAccessor::new(
            Arc::clone(&self.to_vertex),
            self.txn,
            self.config,
            AccessMode::Live,
        )
    }

    /// Returns `true` when a version of the edge is observable under `view`
    /// and, in [`AccessMode::Live`], is not a tombstone.
    pub fn is_visible(&self, view: View) -> bool {
        let snapshot = self.edge.lock().core.chain_snapshot();
        let res = mvcc::apply_deltas_for_read(self.txn, &snapshot, view, |_| {});
        res.exists && (self.mode == AccessMode::IncludeDeleted || !res.deleted)
    }

    /// The value of one property under the requested view.
    ///
    /// Yields `Null` without touching the object when edge properties are
    /// configured off.
    pub fn get_property(&self, key: PropId, view: View) -> Result<PropertyValue> {
        if !self.config.properties_on_edges {
            return Ok(PropertyValue::Null);
        }
        let (mut value, snapshot) = {
            let state = self.edge.lock();
            (state.props.get(key), state.core.chain_snapshot())
        };
        let res = mvcc::apply_deltas_for_read(self.txn, &snapshot, view, |action| {
            if let DeltaAction::SetProperty { key: k, value: v } = action {
                if *k == key {
                    value = v.clone();
                }
            }
        });
        self.finish_read(res)?;
        Ok(value)
    }

    /// The full property map under the requested view, empty when edge
    /// properties are configured off.
    pub fn properties(&self, view: View) -> Result<BTreeMap<PropId, PropertyValue>> {
        if !self.config.properties_on_edges {
            return Ok(BTreeMap::new());
        }
        let (mut props, snapshot) = {
            let state = self.edge.lock();
            (state.props.properties(), state.core.chain_snapshot())
        };
        let res = mvcc::apply_deltas_for_read(self.txn, &snapshot, view, |action| {
            if let DeltaAction::SetProperty { key, value } = action {
                property::fold_property_undo(&mut props, *key, value);
            }
        });
        self.finish_read(res)?;
        Ok(props)
    }

    /// Sets a property and returns the prior value.
    ///
    /// Fails with `PropertiesDisabled` before taking any lock when edge
    /// properties are configured off.
    pub fn set_property(&self, key: PropId, value: PropertyValue) -> Result<PropertyValue> {
        if !self.config.properties_on_edges {
            return Err(StoreError::PropertiesDisabled);
        }
        let mut state = self.edge.lock();
        let admission = self.validate(&state)?;
        self.account(&mut state, admission)?;
        let prior = state.props.get(key);
        mvcc::create_and_link_delta(
            self.txn,
            &mut state.core,
            DeltaAction::SetProperty {
                key,
                value: prior.clone(),
            },
            Some(self.provenance()),
        )?;
        state.props.set(key, value);
        Ok(prior)
    }

    /// Removes all properties, returning the removed map.
    pub fn clear_properties(&self) -> Result<BTreeMap<PropId, PropertyValue>> {
        if !self.config.properties_on_edges {
            return Err(StoreError::PropertiesDisabled);
        }
        let mut state = self.edge.lock();
        let admission = self.validate(&state)?;
        self.account(&mut state, admission)?;
        let props = state.props.properties();
        for (key, value) in &props {
            mvcc::create_and_link_delta(
                self.txn,
                &mut state.core,
                DeltaAction::SetProperty {
                    key: *key,
                    value: value.clone(),
                },
                Some(self.provenance()),
            )?;
        }
        state.props.clear();
        Ok(props)
    }

    pub(crate) fn provenance(&self) -> EdgeProvenance {
        EdgeProvenance {
            from: self.edge.from,
            to: self.edge.to,
            start_ts: self.txn.start_timestamp(),
        }
    }

    fn validate(&self, state: &EdgeState) -> Result<WriteAdmission> {
        let admission = mvcc::prepare_for_write(self.txn, &state.core)?;
        if state.core.deleted {
            return Err(StoreError::DeletedObject);
        }
        Ok(admission)
    }

    fn account(&self, state: &mut EdgeState, admission: WriteAdmission) -> Result<()> {
        let effects = mvcc::register_write(&self.config, &mut state.core, admission);
        if let Some(at) = effects.anchor_at {
            self.txn
                .record_edge_anchor(self.edge.gid, at, state.props.properties())?;
        }
        if self.config.change_feed {
            if let Some(at) = effects.notify_at {
                self.txn.record_change(ChangeRecord {
                    kind: ObjectKind::Edge,
                    gid: self.edge.gid,
                    endpoints: Some((self.edge.from, self.edge.to)),
                    timestamp: at,
                    props: state.props.properties(),
                })?;
            }
        }
        Ok(())
    }

    fn finish_read(&self, res: Resolution) -> Result<()> {
        if !res.exists {
            return Err(StoreError::NonexistentObject);
        }
        if res.deleted && self.mode == AccessMode::Live {
            return Err(StoreError::DeletedObject);
        }
        Ok(())
    }
}

impl PartialEq for EdgeAccessor<'_> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.edge, &other.edge) && self.txn.id() == other.txn.id()
    }
}

impl Eq for EdgeAccessor<'_> {}
