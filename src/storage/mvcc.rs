//! Delta-chain visibility resolution, write admission, and anchor accounting.
//!
//! Reads snapshot an object's live state and chain head under its lock, then
//! replay undo deltas newest-first without the lock. Writes validate against
//! the chain head, link a new delta, and mutate the live state as one unit
//! under the lock.

use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::storage::delta::{CellState, Delta, DeltaAction, EdgeProvenance};
use crate::storage::transaction::Transaction;
use crate::types::Timestamp;

/// Read horizon requested by a caller.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum View {
    /// State as of the transaction's start, excluding its own uncommitted
    /// writes.
    Old,
    /// State as of now, including the transaction's own uncommitted writes.
    New,
}

/// Read contract for deleted objects, chosen at accessor construction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AccessMode {
    /// Tombstoned versions are reported as `DeletedObject`.
    Live,
    /// Tombstoned versions still yield their stale state.
    IncludeDeleted,
}

/// Mutable state shared by every versioned object, guarded by its lock.
#[derive(Debug)]
pub(crate) struct VersionCore {
    pub deleted: bool,
    pub delta: Option<Arc<Delta>>,
    /// Committed writes since the last anchor snapshot.
    pub write_count: u64,
    /// Start timestamp of the creating transaction.
    pub created_st: Timestamp,
}

impl VersionCore {
    pub(crate) fn new(created_st: Timestamp) -> Self {
        Self {
            deleted: false,
            delta: None,
            write_count: 0,
            created_st,
        }
    }

    /// Captures everything the resolver needs, to be taken under the object
    /// lock and walked after releasing it.
    pub(crate) fn chain_snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            deleted: self.deleted,
            head: self.delta.clone(),
        }
    }
}

/// Live `deleted` flag and chain head captured under the object lock.
pub(crate) struct ChainSnapshot {
    pub deleted: bool,
    pub head: Option<Arc<Delta>>,
}

/// Resolved visibility of one object under a view.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Resolution {
    /// `false` when replay crossed the object's creation boundary.
    pub exists: bool,
    /// Tombstone flag of the reconstructed version.
    pub deleted: bool,
}

/// Replays undo deltas newest-first until the chain leaves the viewer's
/// horizon.
///
/// A delta is undone when its change is not part of the state `txn` is
/// entitled to see: uncommitted deltas of other transactions always, deltas
/// committed at or after the viewer's start always, and the viewer's own
/// pending deltas only under [`View::Old`]. Property, label and adjacency
/// undos are handed to `visitor`; creation and deletion boundaries are folded
/// into the returned [`Resolution`].
pub(crate) fn apply_deltas_for_read<F>(
    txn: &Transaction,
    snapshot: &ChainSnapshot,
    view: View,
    mut visitor: F,
) -> Resolution
where
    F: FnMut(&DeltaAction),
{
    let mut exists = true;
    let mut deleted = snapshot.deleted;
    let mut delta = snapshot.head.as_deref();
    while let Some(current) = delta {
        let undo = match current.state() {
            CellState::Owned(owner) if owner == txn.id() => view == View::Old,
            CellState::Owned(_) => true,
            CellState::Committed(ts) => ts >= txn.start_timestamp(),
        };
        if !undo {
            break;
        }
        match &current.action {
            DeltaAction::DeleteObject => exists = false,
            DeltaAction::RecreateObject => deleted = false,
            action => visitor(action),
        }
        delta = current.next().map(|next| next.as_ref());
    }
    Resolution { exists, deleted }
}

/// Outcome of write validation: how the new delta relates to the chain head.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum WriteAdmission {
    /// The chain is empty; the write starts a fresh chain.
    FirstWrite,
    /// The head is this transaction's own pending delta; the chain keeps
    /// growing.
    Continuation,
    /// The head committed at the carried timestamp; anchor accounting
    /// applies before the new delta is linked.
    AfterCommit(Timestamp),
}

/// Decides whether `txn` may link a new delta onto this chain.
///
/// Caller must hold the object lock. First-writer-wins: a head owned by a
/// different transaction rejects the write without blocking.
pub(crate) fn prepare_for_write(
    txn: &Transaction,
    core: &VersionCore,
) -> Result<WriteAdmission> {
    let Some(head) = core.delta.as_ref() else {
        return Ok(WriteAdmission::FirstWrite);
    };
    match head.state() {
        CellState::Owned(owner) if owner == txn.id() => Ok(WriteAdmission::Continuation),
        CellState::Owned(owner) => {
            debug!(owner, requester = txn.id(), "write conflict on pending object");
            Err(StoreError::Serialization)
        }
        CellState::Committed(ts) => Ok(WriteAdmission::AfterCommit(ts)),
    }
}

/// Side effects an admitted write must carry out while still holding the
/// object lock.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct WriteEffects {
    /// Timestamp to stamp on an outgoing change record, when one applies.
    pub notify_at: Option<Timestamp>,
    /// Anchor key when a full property snapshot must be captured now.
    pub anchor_at: Option<Timestamp>,
}

/// Anchor accounting for an admitted write.
///
/// Only post-commit writes advance the write counter; once it exceeds the
/// configured interval it resets to one and (when anchoring is on) requests a
/// snapshot keyed by the previous head's commit timestamp. Must run under the
/// same lock acquisition as the validation and the delta link, so the anchor
/// is linearized with the write that triggered it.
pub(crate) fn register_write(
    config: &Config,
    core: &mut VersionCore,
    admission: WriteAdmission,
) -> WriteEffects {
    match admission {
        WriteAdmission::Continuation => WriteEffects::default(),
        WriteAdmission::FirstWrite => WriteEffects {
            notify_at: Some(core.created_st),
            anchor_at: None,
        },
        WriteAdmission::AfterCommit(ts) => {
            core.write_count += 1;
            let mut anchor_at = None;
            if core.write_count > config.anchor_interval {
                core.write_count = 1;
                if config.anchor_snapshots {
                    anchor_at = Some(ts);
                }
            }
            WriteEffects {
                notify_at: Some(ts),
                anchor_at,
            }
        }
    }
}

/// Builds the undo record and prepends it to the chain.
///
/// The delta joins the transaction's delta list first; only after that
/// reservation succeeds is the head pointer swung, so an allocation failure
/// leaves the chain untouched.
pub(crate) fn create_and_link_delta(
    txn: &Transaction,
    core: &mut VersionCore,
    action: DeltaAction,
    provenance: Option<EdgeProvenance>,
) -> Result<()> {
    let delta = Arc::new(Delta::link(
        action,
        Arc::clone(txn.commit_cell()),
        core.delta.clone(),
        provenance,
    ));
    txn.hold_delta(Arc::clone(&delta))?;
    core.delta = Some(delta);
    Ok(())
}
