//! Undo-log round-trip correctness.
//!
//! For arbitrary committed write sequences, replaying the chain under a view
//! taken at any point in the sequence must reproduce exactly the property
//! map as it existed at that point.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use basalt::storage::{AccessMode, PropertyValue, Store, View};
use basalt::types::{Gid, PropId};
use basalt::Config;
use proptest::prelude::*;

const NAME: PropId = PropId(1);
const SIZE: PropId = PropId(2);

fn committed_vertex(store: &Store) -> Gid {
    let txn = store.begin_transaction();
    let gid = store.create_vertex(&txn).unwrap().gid();
    store.commit(&txn);
    gid
}

/// Applies one committed write: `Some(x)` sets the key, `None` removes it.
fn apply(store: &Store, gid: Gid, key: PropId, value: Option<i64>) {
    let txn = store.begin_transaction();
    let vertex = store.vertex(&txn, gid, AccessMode::Live, View::New).unwrap();
    let value = match value {
        Some(x) => PropertyValue::Int(x),
        None => PropertyValue::Null,
    };
    vertex.set_property(key, value).unwrap();
    store.commit(&txn);
}

#[test]
fn old_view_reproduces_the_pre_write_map() {
    let store = Store::new(Config::default());
    let gid = committed_vertex(&store);

    apply(&store, gid, NAME, Some(1));
    apply(&store, gid, SIZE, Some(10));

    let viewer = store.begin_transaction();

    apply(&store, gid, NAME, Some(2));
    apply(&store, gid, SIZE, None);

    let vertex = store
        .vertex(&viewer, gid, AccessMode::Live, View::Old)
        .unwrap();
    let expected = BTreeMap::from([
        (NAME, PropertyValue::Int(1)),
        (SIZE, PropertyValue::Int(10)),
    ]);
    assert_eq!(vertex.properties(View::Old).unwrap(), expected);
    assert_eq!(
        vertex.get_property(SIZE, View::Old).unwrap(),
        PropertyValue::Int(10)
    );
}

#[test]
fn clear_properties_round_trips_through_the_undo_log() {
    let store = Store::new(Config::default());
    let gid = committed_vertex(&store);
    apply(&store, gid, NAME, Some(1));
    apply(&store, gid, SIZE, Some(10));

    let viewer = store.begin_transaction();

    let clearer = store.begin_transaction();
    let vertex = store
        .vertex(&clearer, gid, AccessMode::Live, View::New)
        .unwrap();
    let removed = vertex.clear_properties().unwrap();
    assert_eq!(removed.len(), 2);
    assert!(vertex.properties(View::New).unwrap().is_empty());
    store.commit(&clearer);

    let vertex = store
        .vertex(&viewer, gid, AccessMode::Live, View::Old)
        .unwrap();
    let props = vertex.properties(View::Old).unwrap();
    assert_eq!(props.len(), 2);
    assert_eq!(props.get(&NAME), Some(&PropertyValue::Int(1)));

    let later = store.begin_transaction();
    let vertex = store.vertex(&later, gid, AccessMode::Live, View::Old).unwrap();
    assert!(vertex.properties(View::Old).unwrap().is_empty());
}

proptest! {
    /// Snapshot taken after `split` committed writes reconstructs exactly
    /// the model map at that point, no matter what commits after it.
    #[test]
    fn chain_replay_reconstructs_any_prefix(
        ops in prop::collection::vec((0u32..4u32, prop::option::of(-8i64..8i64)), 1..24),
        split in 0usize..25usize,
    ) {
        let split = split.min(ops.len());
        let store = Store::new(Config::default().anchor_interval(3));
        let gid = committed_vertex(&store);

        let mut model: BTreeMap<PropId, PropertyValue> = BTreeMap::new();
        let mut viewer = None;
        let mut expected = BTreeMap::new();
        for (i, (key, value)) in ops.iter().enumerate() {
            if i == split {
                viewer = Some(store.begin_transaction());
                expected = model.clone();
            }
            let key = PropId(*key);
            apply(&store, gid, key, *value);
            match value {
                Some(x) => {
                    model.insert(key, PropertyValue::Int(*x));
                }
                None => {
                    model.remove(&key);
                }
            }
        }
        if split == ops.len() {
            viewer = Some(store.begin_transaction());
            expected = model.clone();
        }

        let viewer = viewer.expect("viewer transaction started");
        let vertex = store
            .vertex(&viewer, gid, AccessMode::Live, View::Old)
            .unwrap();
        // Foreign commits after the viewer's start are invisible in both
        // views.
        prop_assert_eq!(vertex.properties(View::Old).unwrap(), expected.clone());
        prop_assert_eq!(vertex.properties(View::New).unwrap(), expected);

        let final_txn = store.begin_transaction();
        let vertex = store
            .vertex(&final_txn, gid, AccessMode::Live, View::Old)
            .unwrap();
        prop_assert_eq!(vertex.properties(View::Old).unwrap(), model);
    }
}
