use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::storage::delta::{AdjacencyEntry, DeltaAction};
use crate::storage::mvcc::{self, AccessMode, Resolution, View, WriteAdmission};
use crate::storage::property::{self, PropertyValue};
use crate::storage::transaction::{ChangeRecord, Transaction};
use crate::storage::vertex::{Vertex, VertexState};
use crate::types::{Gid, LabelId, ObjectKind, PropId};

/// Transaction-bound façade over one vertex.
///
/// Reads snapshot the live state and chain head under the vertex lock, then
/// reconstruct the requested view without it. Writes validate, link an undo
/// delta, and mutate the live state as one unit under the lock.
#[derive(Clone, Debug)]
pub struct VertexAccessor<'t> {
    pub(crate) vertex: Arc<Vertex>,
    pub(crate) txn: &'t Transaction,
    config: Config,
    mode: AccessMode,
}

impl<'t> VertexAccessor<'t> {
    pub(crate) fn new(
        vertex: Arc<Vertex>,
        txn: &'t Transaction,
        config: Config,
        mode: AccessMode,
    ) -> Self {
        Self {
            vertex,
            txn,
            config,
            mode,
        }
    }

    /// The vertex identifier.
    pub fn gid(&self) -> Gid {
        self.vertex.gid
    }

    /// The access mode this accessor was constructed with.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Returns `true` when a version of the vertex is observable under
    /// `view` and, in [`AccessMode::Live`], is not a tombstone.
    pub fn is_visible(&self, view: View) -> bool {
        let snapshot = self.vertex.lock().core.chain_snapshot();
        let res = mvcc::apply_deltas_for_read(self.txn, &snapshot, view, |_| {});
        res.exists && (self.mode == AccessMode::IncludeDeleted || !res.deleted)
    }

    /// Adds a label, returning `false` if it was already present.
    pub fn add_label(&self, label: LabelId) -> Result<bool> {
        let mut state = self.vertex.lock();
        let admission = self.validate(&state)?;
        if state.labels.contains(&label) {
            return Ok(false);
        }
        self.account(&mut state, admission, false)?;
        mvcc::create_and_link_delta(
            self.txn,
            &mut state.core,
            DeltaAction::RemoveLabel(label),
            None,
        )?;
        state.labels.push(label);
        Ok(true)
    }

    /// Removes a label, returning `false` if the vertex did not carry it.
    pub fn remove_label(&self, label: LabelId) -> Result<bool> {
        let mut state = self.vertex.lock();
        let admission = self.validate(&state)?;
        if !state.labels.contains(&label) {
            return Ok(false);
        }
        self.account(&mut state, admission, false)?;
        mvcc::create_and_link_delta(
            self.txn,
            &mut state.core,
            DeltaAction::AddLabel(label),
            None,
        )?;
        state.labels.retain(|l| *l != label);
        Ok(true)
    }

    /// Whether the vertex carries `label` under the requested view.
    pub fn has_label(&self, label: LabelId, view: View) -> Result<bool> {
        let (mut has_label, snapshot) = {
            let state = self.vertex.lock();
            (state.labels.contains(&label), state.core.chain_snapshot())
        };
        let res = mvcc::apply_deltas_for_read(self.txn, &snapshot, view, |action| match action {
            DeltaAction::AddLabel(l) if *l == label => has_label = true,
            DeltaAction::RemoveLabel(l) if *l == label => has_label = false,
            _ => {}
        });
        self.finish_read(res)?;
        Ok(has_label)
    }

    /// The label set under the requested view.
    pub fn labels(&self, view: View) -> Result<Vec<LabelId>> {
        let (mut labels, snapshot) = {
            let state = self.vertex.lock();
            (state.labels.to_vec(), state.core.chain_snapshot())
        };
        let res = mvcc::apply_deltas_for_read(self.txn, &snapshot, view, |action| match action {
            DeltaAction::AddLabel(l) => {
                if !labels.contains(l) {
                    labels.push(*l);
                }
            }
            DeltaAction::RemoveLabel(l) => labels.retain(|x| x != l),
            _ => {}
        });
        self.finish_read(res)?;
        Ok(labels)
    }

    /// The value of one property under the requested view, `Null` if unset.
    pub fn get_property(&self, key: PropId, view: View) -> Result<PropertyValue> {
        let (mut value, snapshot) = {
            let state = self.vertex.lock();
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

    /// The full property map under the requested view.
    pub fn properties(&self, view: View) -> Result<BTreeMap<PropId, PropertyValue>> {
        let (mut props, snapshot) = {
            let state = self.vertex.lock();
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

    /// Sets a property and returns the prior value (`Null` when the key was
    /// absent). Setting `Null` removes the key.
    pub fn set_property(&self, key: PropId, value: PropertyValue) -> Result<PropertyValue> {
        let mut state = self.vertex.lock();
        let admission = self.validate(&state)?;
        self.account(&mut state, admission, true)?;
        // A delta is created even when the new value equals the old one, so
        // the write still takes ownership of the chain head.
        let prior = state.props.get(key);
        mvcc::create_and_link_delta(
            self.txn,
            &mut state.core,
            DeltaAction::SetProperty {
                key,
                value: prior.clone(),
            },
            None,
        )?;
        state.props.set(key, value);
        Ok(prior)
    }

    /// Removes all properties, returning the removed map.
    pub fn clear_properties(&self) -> Result<BTreeMap<PropId, PropertyValue>> {
        let mut state = self.vertex.lock();
        let admission = self.validate(&state)?;
        self.account(&mut state, admission, true)?;
        let props = state.props.properties();
        for (key, value) in &props {
            mvcc::create_and_link_delta(
                self.txn,
                &mut state.core,
                DeltaAction::SetProperty {
                    key: *key,
                    value: value.clone(),
                },
                None,
            )?;
        }
        state.props.clear();
        Ok(props)
    }

    /// Incoming adjacency entries under the requested view.
    pub fn in_edges(&self, view: View) -> Result<Vec<AdjacencyEntry>> {
        let (mut edges, snapshot) = {
            let state = self.vertex.lock();
            (state.in_edges.to_vec(), state.core.chain_snapshot())
        };
        let res = mvcc::apply_deltas_for_read(self.txn, &snapshot, view, |action| match action {
            DeltaAction::AddInEdge(entry) => {
                if !edges.contains(entry) {
                    edges.push(*entry);
                }
            }
            DeltaAction::RemoveInEdge(entry) => edges.retain(|e| e != entry),
            _ => {}
        });
        self.finish_read(res)?;
        Ok(edges)
    }

    /// Outgoing adjacency entries under the requested view.
    pub fn out_edges(&self, view: View) -> Result<Vec<AdjacencyEntry>> {
        let (mut edges, snapshot) = {
            let state = self.vertex.lock();
            (state.out_edges.to_vec(), state.core.chain_snapshot())
        };
        let res = mvcc::apply_deltas_for_read(self.txn, &snapshot, view, |action| match action {
            DeltaAction::AddOutEdge(entry) => {
                if !edges.contains(entry) {
                    edges.push(*entry);
                }
            }
            DeltaAction::RemoveOutEdge(entry) => edges.retain(|e| e != entry),
            _ => {}
        });
        self.finish_read(res)?;
        Ok(edges)
    }

    /// Incoming degree under the requested view.
    pub fn in_degree(&self, view: View) -> Result<usize> {
        Ok(self.in_edges(view)?.len())
    }

    /// Outgoing degree under the requested view.
    pub fn out_degree(&self, view: View) -> Result<usize> {
        Ok(self.out_edges(view)?.len())
    }

    fn validate(&self, state: &VertexState) -> Result<WriteAdmission> {
        let admission = mvcc::prepare_for_write(self.txn, &state.core)?;
        if state.core.deleted {
            return Err(StoreError::DeletedObject);
        }
        Ok(admission)
    }

    fn account(
        &self,
        state: &mut VertexState,
        admission: WriteAdmission,
        notify: bool,
    ) -> Result<()> {
        let effects = mvcc::register_write(&self.config, &mut state.core, admission);
        if let Some(at) = effects.anchor_at {
            self.txn
                .record_vertex_anchor(self.vertex.gid, at, state.props.properties())?;
        }
        if notify && self.config.change_feed {
            if let Some(at) = effects.notify_at {
                self.txn.record_change(ChangeRecord {
                    kind: ObjectKind::Vertex,
                    gid: self.vertex.gid,
                    endpoints: None,
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

impl PartialEq for VertexAccessor<'_> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.vertex, &other.vertex) && self.txn.id() == other.txn.id()
    }
}

impl Eq for VertexAccessor<'_> {}
