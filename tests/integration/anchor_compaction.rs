//! Anchor snapshot cadence and the change-notification buffer.
//!
//! Every write admitted on top of a committed chain head advances the
//! object's write counter; once the counter passes the configured interval
//! it resets and the writing transaction archives a full property snapshot
//! keyed by the previous head's commit timestamp.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use basalt::storage::{AccessMode, ChangeRecord, PropertyValue, Store, View};
use basalt::types::{EdgeTypeId, Gid, ObjectKind, PropId, Timestamp};
use basalt::Config;

const NAME: PropId = PropId(1);

fn committed_vertex(store: &Store) -> (Gid, Timestamp) {
    let txn = store.begin_transaction();
    let gid = store.create_vertex(&txn).unwrap().gid();
    let commit = store.commit(&txn);
    (gid, commit)
}

/// Runs one committed `NAME = value` write and returns its commit timestamp
/// together with the number of anchor snapshots the transaction archived.
fn committed_write(store: &Store, gid: Gid, value: i64) -> (Timestamp, usize) {
    let txn = store.begin_transaction();
    let vertex = store.vertex(&txn, gid, AccessMode::Live, View::New).unwrap();
    vertex.set_property(NAME, PropertyValue::Int(value)).unwrap();
    let commit = store.commit(&txn);
    (commit, txn.take_vertex_anchors().len())
}

#[test]
fn anchor_fires_after_interval_plus_one_committed_writes() {
    let store = Store::new(Config::default().anchor_interval(2));
    let (gid, _) = committed_vertex(&store);

    let (_c1, anchors) = committed_write(&store, gid, 1);
    assert_eq!(anchors, 0);
    let (c2, anchors) = committed_write(&store, gid, 2);
    assert_eq!(anchors, 0);

    // Third post-commit write crosses the interval: exactly one snapshot,
    // keyed by the commit that headed the chain at that moment.
    let txn = store.begin_transaction();
    let vertex = store.vertex(&txn, gid, AccessMode::Live, View::New).unwrap();
    vertex.set_property(NAME, PropertyValue::Int(3)).unwrap();
    let anchors = txn.take_vertex_anchors();
    assert_eq!(anchors.len(), 1);
    let snapshot = anchors.get(&(gid, c2)).expect("anchor keyed by previous commit");
    assert_eq!(snapshot.get(&NAME), Some(&PropertyValue::Int(2)));
    store.commit(&txn);

    // The counter restarted: the next interval needs two more writes.
    let (_c4, anchors) = committed_write(&store, gid, 4);
    assert_eq!(anchors, 0);
    let (_c5, anchors) = committed_write(&store, gid, 5);
    assert_eq!(anchors, 1);
}

#[test]
fn disabled_anchoring_archives_nothing() {
    let store = Store::new(Config::default().anchor_interval(1).anchor_snapshots(false));
    let (gid, _) = committed_vertex(&store);

    for value in 0..6 {
        let (_, anchors) = committed_write(&store, gid, value);
        assert_eq!(anchors, 0);
    }
}

#[test]
fn edge_anchors_archive_into_the_edge_map() {
    let store = Store::new(Config::default().anchor_interval(1));
    let (a, _) = committed_vertex(&store);
    let (b, _) = committed_vertex(&store);

    let setup = store.begin_transaction();
    let edge_gid = store.create_edge(&setup, a, b, EdgeTypeId(1)).unwrap().gid();
    store.commit(&setup);

    let t1 = store.begin_transaction();
    let edge = store.edge(&t1, edge_gid, AccessMode::Live, View::New).unwrap();
    edge.set_property(NAME, PropertyValue::Int(1)).unwrap();
    let c1 = store.commit(&t1);
    assert!(t1.take_edge_anchors().is_empty());

    let t2 = store.begin_transaction();
    let edge = store.edge(&t2, edge_gid, AccessMode::Live, View::New).unwrap();
    edge.set_property(NAME, PropertyValue::Int(2)).unwrap();
    let anchors = t2.take_edge_anchors();
    assert_eq!(anchors.len(), 1);
    let snapshot = anchors.get(&(edge_gid, c1)).expect("anchor keyed by previous commit");
    assert_eq!(snapshot.get(&NAME), Some(&PropertyValue::Int(1)));
    assert!(t2.take_vertex_anchors().is_empty());
    store.commit(&t2);
}

#[test]
fn change_feed_records_the_era_that_ended() {
    let store = Store::new(Config::default().change_feed(true));

    // The creating transaction only ever continues its own chain, so it
    // produces no records.
    let creator = store.begin_transaction();
    let vertex = store.create_vertex(&creator).unwrap();
    vertex.set_property(NAME, PropertyValue::Int(1)).unwrap();
    let gid = vertex.gid();
    let c0 = store.commit(&creator);
    assert!(creator.take_changes().is_empty());

    // The first write on top of the commit summarizes the ended era; the
    // continuation write right after adds nothing.
    let txn = store.begin_transaction();
    let vertex = store.vertex(&txn, gid, AccessMode::Live, View::New).unwrap();
    vertex.set_property(NAME, PropertyValue::Int(2)).unwrap();
    vertex.set_property(PropId(2), PropertyValue::Int(3)).unwrap();
    let changes = txn.take_changes();
    let expected = ChangeRecord {
        kind: ObjectKind::Vertex,
        gid,
        endpoints: None,
        timestamp: c0,
        props: BTreeMap::from([(NAME, PropertyValue::Int(1))]),
    };
    assert_eq!(changes, vec![expected]);
    store.commit(&txn);
}

#[test]
fn edge_change_records_carry_endpoints() {
    let store = Store::new(Config::default().change_feed(true));
    let (a, _) = committed_vertex(&store);
    let (b, _) = committed_vertex(&store);

    let setup = store.begin_transaction();
    let edge_gid = store.create_edge(&setup, a, b, EdgeTypeId(1)).unwrap().gid();
    let c0 = store.commit(&setup);

    let txn = store.begin_transaction();
    let edge = store.edge(&txn, edge_gid, AccessMode::Live, View::New).unwrap();
    edge.set_property(NAME, PropertyValue::Int(1)).unwrap();
    let changes = txn.take_changes();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ObjectKind::Edge);
    assert_eq!(changes[0].gid, edge_gid);
    assert_eq!(changes[0].endpoints, Some((a, b)));
    assert_eq!(changes[0].timestamp, c0);
    assert!(changes[0].props.is_empty());
    store.commit(&txn);
}

#[test]
fn change_feed_off_buffers_nothing() {
    let store = Store::new(Config::default());
    let (gid, _) = committed_vertex(&store);

    let txn = store.begin_transaction();
    let vertex = store.vertex(&txn, gid, AccessMode::Live, View::New).unwrap();
    vertex.set_property(NAME, PropertyValue::Int(1)).unwrap();
    store.commit(&txn);
    assert!(txn.take_changes().is_empty());
}
