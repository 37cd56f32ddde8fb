//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use const_addrs::ip4;
use holo_ospf6_db::config::LsdbCfg;
use holo_ospf6_db::error::Error;
use holo_ospf6_db::lsa::{
    LSA_INIT_SEQ_NO, LSA_MAX_AGE, LSA_RESERVED_SEQ_NO, Lsa, LsaKey, LsaType,
};
use holo_ospf6_db::lsdb::{LsaEntryFlags, Lsdb, LsdbId, LsdbTypeStats};
use maplit::btreemap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

type HookEvents = Arc<Mutex<Vec<HookEvent>>>;

#[derive(Debug, Eq, PartialEq)]
enum HookEvent {
    Add(LsaKey, u32),
    Remove(LsaKey, u32),
    Refresh(LsaKey, u32),
}

//
// Helper functions.
//

fn lsa(
    lsa_type: LsaType,
    lsa_id: Ipv4Addr,
    adv_rtr: Ipv4Addr,
    seq_no: u32,
    body: &'static [u8],
) -> Arc<Lsa> {
    Arc::new(Lsa::new(
        0,
        lsa_type,
        lsa_id,
        adv_rtr,
        seq_no,
        0,
        Bytes::from_static(body),
    )
    .unwrap())
}

fn maxage(lsa: &Lsa) -> Arc<Lsa> {
    let mut lsa = lsa.clone();
    lsa.set_maxage();
    Arc::new(lsa)
}

fn lsdb_with_hooks(config: LsdbCfg) -> (Lsdb, HookEvents) {
    let events = HookEvents::default();
    let mut lsdb = Lsdb::new(LsdbId::Area(ip4!("0.0.0.0")), config);

    let add_events = events.clone();
    lsdb.hooks.add = Some(Box::new(move |lsa: &Arc<Lsa>| {
        let event = HookEvent::Add(lsa.key(), lsa.hdr.seq_no);
        add_events.lock().unwrap().push(event);
    }));
    let remove_events = events.clone();
    lsdb.hooks.remove = Some(Box::new(move |lsa: &Arc<Lsa>| {
        let event = HookEvent::Remove(lsa.key(), lsa.hdr.seq_no);
        remove_events.lock().unwrap().push(event);
    }));
    let refresh_events = events.clone();
    lsdb.hooks.refresh = Some(Box::new(move |lsa: &Arc<Lsa>| {
        let event = HookEvent::Refresh(lsa.key(), lsa.hdr.seq_no);
        refresh_events.lock().unwrap().push(event);
    }));

    (lsdb, events)
}

fn take_events(events: &HookEvents) -> Vec<HookEvent> {
    std::mem::take(&mut *events.lock().unwrap())
}

fn keys(lsas: impl Iterator<Item = Arc<Lsa>>) -> Vec<LsaKey> {
    lsas.map(|lsa| lsa.key()).collect()
}

// Walks the database using the head/next cursor.
fn cursor_walk(lsdb: &Lsdb) -> Vec<LsaKey> {
    keys(std::iter::successors(lsdb.head(), |lsa| lsdb.next(lsa)))
}

// Populates a database with LSAs of different types and originators, added
// out of order.
fn populate(lsdb: &mut Lsdb) {
    let lsas = [
        lsa(LsaType::NETWORK, ip4!("0.0.0.4"), ip4!("2.2.2.2"), 1, b"n"),
        lsa(LsaType::ROUTER, ip4!("0.0.0.1"), ip4!("2.2.2.2"), 1, b"r"),
        lsa(LsaType::INTRA_AREA_PREFIX, ip4!("0.0.0.1"), ip4!("1.1.1.1"), 1, b"p"),
        lsa(LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("1.1.1.1"), 1, b"r"),
        lsa(LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("2.2.2.2"), 1, b"r"),
        lsa(LsaType::INTRA_AREA_PREFIX, ip4!("0.0.0.2"), ip4!("1.1.1.1"), 1, b"p"),
        lsa(LsaType::NETWORK, ip4!("0.0.0.3"), ip4!("1.1.1.1"), 1, b"n"),
    ];
    for lsa in lsas {
        lsdb.add(lsa).unwrap();
    }
}

//
// Tests.
//

#[test]
fn add_new_lsa() {
    let (mut lsdb, events) = lsdb_with_hooks(Default::default());
    let router_lsa =
        lsa(LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("1.1.1.1"), LSA_INIT_SEQ_NO, b"links");

    lsdb.add(router_lsa.clone()).unwrap();

    assert_eq!(lsdb.count(), 1);
    assert_eq!(
        take_events(&events),
        vec![HookEvent::Add(router_lsa.key(), LSA_INIT_SEQ_NO)]
    );
    let stored = lsdb
        .lookup(LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("1.1.1.1"))
        .unwrap();
    assert!(Arc::ptr_eq(stored, &router_lsa));
    assert!(lsdb.check().is_ok());
}

#[test]
fn replace_with_newer_instance() {
    let (mut lsdb, events) = lsdb_with_hooks(Default::default());
    let old = lsa(LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("1.1.1.1"), 0x80000001, b"old");
    let new = lsa(LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("1.1.1.1"), 0x80000002, b"new-links");
    lsdb.add(old.clone()).unwrap();
    take_events(&events);

    lsdb.add(new.clone()).unwrap();

    assert_eq!(lsdb.count(), 1);
    assert_eq!(
        take_events(&events),
        vec![
            HookEvent::Remove(old.key(), 0x80000001),
            HookEvent::Add(new.key(), 0x80000002),
        ]
    );
    // The database no longer holds a reference to the old instance.
    assert_eq!(Arc::strong_count(&old), 1);
    assert_eq!(Arc::strong_count(&new), 2);
    assert!(lsdb.check().is_ok());
}

#[test]
fn add_identical_copy_is_noop() {
    let (mut lsdb, events) = lsdb_with_hooks(Default::default());
    let installed = lsa(LsaType::LINK, ip4!("0.0.0.5"), ip4!("1.1.1.1"), 0x80000003, b"link");
    let copy = Arc::new((*installed).clone());
    lsdb.add(installed.clone()).unwrap();
    lsdb.add(copy.clone()).unwrap();

    assert_eq!(lsdb.count(), 1);
    assert_eq!(take_events(&events).len(), 1);
    let stored = lsdb.lookup(LsaType::LINK, ip4!("0.0.0.5"), ip4!("1.1.1.1"));
    assert!(Arc::ptr_eq(stored.unwrap(), &installed));
    assert_eq!(Arc::strong_count(&copy), 1);
}

#[test]
fn replace_unchanged_contents_fires_no_hooks() {
    let (mut lsdb, events) = lsdb_with_hooks(Default::default());
    let old = lsa(LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("1.1.1.1"), 0x80000001, b"same");
    let new = lsa(LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("1.1.1.1"), 0x80000002, b"same");
    lsdb.add(old.clone()).unwrap();
    take_events(&events);

    lsdb.add(new.clone()).unwrap();

    assert!(take_events(&events).is_empty());
    let stored = lsdb.lookup(LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("1.1.1.1"));
    assert!(Arc::ptr_eq(stored.unwrap(), &new));
}

#[test]
fn replace_maxage_transitions() {
    let (mut lsdb, events) = lsdb_with_hooks(Default::default());
    let fresh = lsa(LsaType::NETWORK, ip4!("0.0.0.3"), ip4!("1.1.1.1"), 0x80000001, b"net");
    let key = fresh.key();
    lsdb.add(fresh.clone()).unwrap();
    take_events(&events);

    // Fresh to MaxAge.
    let flushed = maxage(&fresh);
    lsdb.add(flushed.clone()).unwrap();
    assert_eq!(
        take_events(&events),
        vec![
            HookEvent::Remove(key, 0x80000001),
            HookEvent::Remove(key, 0x80000001),
        ]
    );

    // MaxAge to fresh.
    let renewed = lsa(LsaType::NETWORK, ip4!("0.0.0.3"), ip4!("1.1.1.1"), 0x80000002, b"net");
    lsdb.add(renewed).unwrap();
    assert_eq!(take_events(&events), vec![HookEvent::Add(key, 0x80000002)]);
    assert_eq!(lsdb.count(), 1);
}

#[test]
fn add_new_maxage_lsa() {
    let (mut lsdb, events) = lsdb_with_hooks(Default::default());
    let flushed = maxage(&lsa(
        LsaType::AS_EXTERNAL,
        ip4!("0.0.0.9"),
        ip4!("3.3.3.3"),
        0x80000010,
        b"ext",
    ));
    assert_eq!(flushed.age(), LSA_MAX_AGE);

    lsdb.add(flushed.clone()).unwrap();

    assert_eq!(lsdb.count(), 1);
    assert_eq!(
        take_events(&events),
        vec![HookEvent::Remove(flushed.key(), 0x80000010)]
    );
}

#[test]
fn replace_carries_over_rxmt_count() {
    let (mut lsdb, _events) = lsdb_with_hooks(Default::default());
    let old = lsa(LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("1.1.1.1"), 0x80000001, b"a");
    old.rxmt_inc();
    old.rxmt_inc();
    lsdb.add(old).unwrap();

    let new = lsa(LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("1.1.1.1"), 0x80000002, b"b");
    lsdb.add(new.clone()).unwrap();

    assert_eq!(new.rxmt_count(), 2);
}

#[test]
fn remove_requires_stored_instance() {
    let (mut lsdb, events) = lsdb_with_hooks(Default::default());
    let stored = lsa(LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("1.1.1.1"), 0x80000001, b"a");
    let copy = (*stored).clone();
    lsdb.add(stored.clone()).unwrap();
    take_events(&events);

    assert!(matches!(
        lsdb.remove(&copy),
        Err(Error::LsaNotPresent(_, key)) if key == stored.key()
    ));
    assert_eq!(lsdb.count(), 1);

    lsdb.remove(&stored).unwrap();
    assert_eq!(lsdb.count(), 0);
    assert!(lsdb.is_empty());
    assert_eq!(
        take_events(&events),
        vec![HookEvent::Remove(stored.key(), 0x80000001)]
    );
    assert_eq!(Arc::strong_count(&stored), 1);

    assert!(matches!(
        lsdb.remove(&stored),
        Err(Error::LsaNotPresent(..))
    ));
    assert!(lsdb.check().is_ok());
}

#[test]
fn full_iteration_order() {
    let (mut lsdb, _events) = lsdb_with_hooks(Default::default());
    populate(&mut lsdb);

    let expected = vec![
        LsaKey::new(LsaType::ROUTER, ip4!("1.1.1.1"), ip4!("0.0.0.0")),
        LsaKey::new(LsaType::ROUTER, ip4!("2.2.2.2"), ip4!("0.0.0.0")),
        LsaKey::new(LsaType::ROUTER, ip4!("2.2.2.2"), ip4!("0.0.0.1")),
        LsaKey::new(LsaType::NETWORK, ip4!("1.1.1.1"), ip4!("0.0.0.3")),
        LsaKey::new(LsaType::NETWORK, ip4!("2.2.2.2"), ip4!("0.0.0.4")),
        LsaKey::new(LsaType::INTRA_AREA_PREFIX, ip4!("1.1.1.1"), ip4!("0.0.0.1")),
        LsaKey::new(LsaType::INTRA_AREA_PREFIX, ip4!("1.1.1.1"), ip4!("0.0.0.2")),
    ];
    assert_eq!(lsdb.count(), expected.len());
    assert_eq!(cursor_walk(&lsdb), expected);
    assert_eq!(
        lsdb.iter().map(|lsa| lsa.key()).collect::<Vec<_>>(),
        expected
    );

    // Replacing entries doesn't affect iteration.
    let replacement =
        lsa(LsaType::NETWORK, ip4!("0.0.0.3"), ip4!("1.1.1.1"), 2, b"changed");
    lsdb.add(replacement).unwrap();
    assert_eq!(cursor_walk(&lsdb), expected);
    assert!(lsdb.check().is_ok());
}

#[test]
fn cursor_survives_removal() {
    let (mut lsdb, _events) = lsdb_with_hooks(Default::default());
    populate(&mut lsdb);

    let current = lsdb
        .lookup(LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("2.2.2.2"))
        .cloned()
        .unwrap();
    lsdb.remove(&current).unwrap();

    let next = lsdb.next(&current).unwrap();
    assert_eq!(
        next.key(),
        LsaKey::new(LsaType::ROUTER, ip4!("2.2.2.2"), ip4!("0.0.0.1"))
    );
    assert!(lsdb.check().is_ok());
}

#[test]
fn type_scoped_iteration() {
    let (mut lsdb, _events) = lsdb_with_hooks(Default::default());
    populate(&mut lsdb);

    let network_lsas = keys(std::iter::successors(
        lsdb.type_head(LsaType::NETWORK),
        |lsa| lsdb.type_next(LsaType::NETWORK, lsa),
    ));
    assert_eq!(
        network_lsas,
        vec![
            LsaKey::new(LsaType::NETWORK, ip4!("1.1.1.1"), ip4!("0.0.0.3")),
            LsaKey::new(LsaType::NETWORK, ip4!("2.2.2.2"), ip4!("0.0.0.4")),
        ]
    );
    assert_eq!(lsdb.iter_by_type(LsaType::ROUTER).count(), 3);
    assert!(lsdb.type_head(LsaType::AS_EXTERNAL).is_none());
    assert_eq!(lsdb.iter_by_type(LsaType::LINK).count(), 0);

    let router_lsas = keys(std::iter::successors(
        lsdb.type_router_head(LsaType::ROUTER, ip4!("2.2.2.2")),
        |lsa| lsdb.type_router_next(LsaType::ROUTER, ip4!("2.2.2.2"), lsa),
    ));
    assert_eq!(
        router_lsas,
        vec![
            LsaKey::new(LsaType::ROUTER, ip4!("2.2.2.2"), ip4!("0.0.0.0")),
            LsaKey::new(LsaType::ROUTER, ip4!("2.2.2.2"), ip4!("0.0.0.1")),
        ]
    );
    assert_eq!(
        lsdb.iter_by_type_advrtr(LsaType::INTRA_AREA_PREFIX, ip4!("1.1.1.1"))
            .count(),
        2
    );
    assert!(
        lsdb.type_router_head(LsaType::ROUTER, ip4!("3.3.3.3"))
            .is_none()
    );
}

#[test]
fn lookup_next_skips_existing_key() {
    let (mut lsdb, _events) = lsdb_with_hooks(Default::default());
    populate(&mut lsdb);

    // Existing key.
    let next = lsdb
        .lookup_next(LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("2.2.2.2"))
        .unwrap();
    assert_eq!(
        next.key(),
        LsaKey::new(LsaType::ROUTER, ip4!("2.2.2.2"), ip4!("0.0.0.1"))
    );

    // Gap between two keys.
    let next = lsdb
        .lookup_next(LsaType::ROUTER, ip4!("0.0.0.7"), ip4!("1.1.1.1"))
        .unwrap();
    assert_eq!(
        next.key(),
        LsaKey::new(LsaType::ROUTER, ip4!("2.2.2.2"), ip4!("0.0.0.0"))
    );

    // Crossing into the next type.
    let next = lsdb
        .lookup_next(LsaType::ROUTER, ip4!("0.0.0.1"), ip4!("2.2.2.2"))
        .unwrap();
    assert_eq!(next.hdr.lsa_type, LsaType::NETWORK);

    // Past the end.
    assert!(
        lsdb.lookup_next(LsaType::INTRA_AREA_PREFIX, ip4!("0.0.0.2"), ip4!("1.1.1.1"))
            .is_none()
    );
}

#[test]
fn new_ls_id_allocation() {
    let (mut lsdb, _events) = lsdb_with_hooks(Default::default());
    let adv_rtr = ip4!("1.1.1.1");
    assert_eq!(lsdb.new_ls_id(LsaType::INTER_AREA_PREFIX, adv_rtr), ip4!("0.0.0.1"));

    for lsa_id in [ip4!("0.0.0.1"), ip4!("0.0.0.2"), ip4!("0.0.0.4")] {
        let lsa = lsa(LsaType::INTER_AREA_PREFIX, lsa_id, adv_rtr, 1, b"iap");
        lsdb.add(lsa).unwrap();
    }
    // LSAs from other routers don't matter.
    let lsa = lsa(LsaType::INTER_AREA_PREFIX, ip4!("0.0.0.3"), ip4!("9.9.9.9"), 1, b"iap");
    lsdb.add(lsa).unwrap();

    assert_eq!(lsdb.new_ls_id(LsaType::INTER_AREA_PREFIX, adv_rtr), ip4!("0.0.0.3"));
}

#[test]
fn new_ls_seqnum_allocation() {
    let (mut lsdb, _events) = lsdb_with_hooks(Default::default());
    let (lsa_id, adv_rtr) = (ip4!("0.0.0.0"), ip4!("1.1.1.1"));
    assert_eq!(
        lsdb.new_ls_seqnum(LsaType::ROUTER, lsa_id, adv_rtr),
        LSA_INIT_SEQ_NO
    );

    lsdb.add(lsa(LsaType::ROUTER, lsa_id, adv_rtr, 0x80000005, b"r"))
        .unwrap();
    assert_eq!(
        lsdb.new_ls_seqnum(LsaType::ROUTER, lsa_id, adv_rtr),
        0x80000006
    );
}

#[test]
fn maxage_remover_respects_retransmissions() {
    let (mut lsdb, events) = lsdb_with_hooks(Default::default());
    populate(&mut lsdb);
    let fresh = lsdb
        .lookup(LsaType::NETWORK, ip4!("0.0.0.3"), ip4!("1.1.1.1"))
        .cloned()
        .unwrap();
    let flushed = maxage(&fresh);
    lsdb.add(flushed.clone()).unwrap();
    flushed.rxmt_inc();
    take_events(&events);

    assert!(lsdb.maxage_remover());
    assert_eq!(lsdb.count(), 7);
    assert!(take_events(&events).is_empty());

    flushed.rxmt_dec();
    assert!(!lsdb.maxage_remover());
    assert_eq!(lsdb.count(), 6);
    assert_eq!(
        take_events(&events),
        vec![HookEvent::Remove(flushed.key(), 1)]
    );
    assert!(
        lsdb.lookup(LsaType::NETWORK, ip4!("0.0.0.3"), ip4!("1.1.1.1"))
            .is_none()
    );
    assert!(lsdb.check().is_ok());
}

#[test]
fn maxage_remover_refreshes_wrapped_lsa() {
    let (mut lsdb, events) = lsdb_with_hooks(Default::default());
    let (lsa_id, adv_rtr) = (ip4!("0.0.0.0"), ip4!("1.1.1.1"));
    let key = LsaKey::new(LsaType::ROUTER, adv_rtr, lsa_id);
    let wrapped = maxage(&lsa(LsaType::ROUTER, lsa_id, adv_rtr, 0x7fffffff, b"r"));
    lsdb.add(wrapped).unwrap();
    lsdb.set_seqno_wrapped(&key).unwrap();
    take_events(&events);

    assert!(!lsdb.maxage_remover());
    assert_eq!(
        take_events(&events),
        vec![HookEvent::Refresh(key, LSA_RESERVED_SEQ_NO)]
    );
    let entry = lsdb.entry(&key).unwrap();
    assert!(!entry.flags.contains(LsaEntryFlags::SEQNO_WRAPPED));
    assert_eq!(
        lsdb.new_ls_seqnum(LsaType::ROUTER, lsa_id, adv_rtr),
        LSA_INIT_SEQ_NO
    );

    // Without the flag, the next sweep removes the LSA.
    assert!(!lsdb.maxage_remover());
    assert_eq!(
        take_events(&events),
        vec![HookEvent::Remove(key, LSA_RESERVED_SEQ_NO)]
    );
    assert!(lsdb.is_empty());
}

#[test]
fn set_seqno_wrapped_unknown_lsa() {
    let (mut lsdb, _events) = lsdb_with_hooks(Default::default());
    let key = LsaKey::new(LsaType::ROUTER, ip4!("1.1.1.1"), ip4!("0.0.0.0"));
    assert!(matches!(
        lsdb.set_seqno_wrapped(&key),
        Err(Error::LsaNotPresent(..))
    ));
}

#[test]
fn capacity_limit() {
    let config = LsdbCfg {
        max_lsas: Some(2),
        ..Default::default()
    };
    let (mut lsdb, _events) = lsdb_with_hooks(config);
    lsdb.add(lsa(LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("1.1.1.1"), 1, b"a"))
        .unwrap();
    lsdb.add(lsa(LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("2.2.2.2"), 1, b"a"))
        .unwrap();

    let result =
        lsdb.add(lsa(LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("3.3.3.3"), 1, b"a"));
    assert!(matches!(result, Err(Error::LsdbFull(_, 2))));
    assert_eq!(lsdb.count(), 2);

    // Replacing an existing instance still works.
    lsdb.add(lsa(LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("2.2.2.2"), 2, b"b"))
        .unwrap();
    assert_eq!(lsdb.count(), 2);
    assert!(lsdb.check().is_ok());
}

#[test]
fn statistics() {
    let (mut lsdb, _events) = lsdb_with_hooks(Default::default());
    let lsas = [
        (LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("1.1.1.1"), 0x1000),
        (LsaType::ROUTER, ip4!("0.0.0.0"), ip4!("2.2.2.2"), 0x0234),
        (LsaType::LINK, ip4!("0.0.0.5"), ip4!("1.1.1.1"), 0x0001),
    ];
    for (lsa_type, lsa_id, adv_rtr, cksum) in lsas {
        let lsa = Lsa::new(0, lsa_type, lsa_id, adv_rtr, 1, cksum, Bytes::new())
            .unwrap();
        lsdb.add(Arc::new(lsa)).unwrap();
    }

    assert_eq!(lsdb.count_self(ip4!("1.1.1.1")), 2);
    assert_eq!(lsdb.count_self(ip4!("3.3.3.3")), 0);
    assert_eq!(lsdb.count_by_type(LsaType::ROUTER), 2);
    assert_eq!(lsdb.cksum_sum(), 0x1235);
    assert_eq!(lsdb.cksum_sum_by_type(LsaType::LINK), 0x0001);
    assert_eq!(
        *lsdb.stats(),
        btreemap! {
            LsaType::ROUTER => LsdbTypeStats { count: 2, cksum_sum: 0x1234 },
            LsaType::LINK => LsdbTypeStats { count: 1, cksum_sum: 0x0001 },
        }
    );
}

#[test]
fn remove_all_lsas() {
    let (mut lsdb, events) = lsdb_with_hooks(Default::default());
    populate(&mut lsdb);
    take_events(&events);

    lsdb.remove_all();

    assert_eq!(lsdb.count(), 0);
    assert!(lsdb.head().is_none());
    assert!(lsdb.stats().is_empty());
    let events = take_events(&events);
    assert_eq!(events.len(), 7);
    assert!(
        events
            .iter()
            .all(|event| matches!(event, HookEvent::Remove(..)))
    );
    assert!(lsdb.check().is_ok());
}

#[test]
fn mixed_operations_keep_database_consistent() {
    let lsa_types = [
        LsaType::ROUTER,
        LsaType::NETWORK,
        LsaType::LINK,
        LsaType::INTRA_AREA_PREFIX,
    ];

    for seed in 0..50 {
        let mut rng = StdRng::seed_from_u64(seed);
        let lsdb_id = LsdbId::Area(ip4!("0.0.0.0"));
        let mut lsdb = Lsdb::new(lsdb_id, Default::default());
        // Expected contents, mapping each key to whether its LSA is MaxAge.
        let mut expected = BTreeMap::new();

        for _ in 0..100 {
            match rng.random_range(0..10) {
                // Add a new LSA or a new instance of an existing one.
                0..6 => {
                    let lsa_type = lsa_types[rng.random_range(0..4)];
                    let lsa_id = Ipv4Addr::from(rng.random_range(0..4u32));
                    let adv_rtr = Ipv4Addr::from(rng.random_range(1..4u32));
                    let seq_no = LSA_INIT_SEQ_NO + rng.random_range(0..3);
                    let mut lsa =
                        lsa(lsa_type, lsa_id, adv_rtr, seq_no, b"body");
                    if rng.random_bool(0.2) {
                        lsa = maxage(&lsa);
                    }
                    lsdb.add(lsa.clone()).unwrap();
                    expected.insert(lsa.key(), lsa.is_maxage());
                }
                // Remove an existing LSA.
                6..9 => {
                    if expected.is_empty() {
                        continue;
                    }
                    let nth = rng.random_range(0..expected.len());
                    let key = *expected.keys().nth(nth).unwrap();
                    let lsa = lsdb
                        .lookup(key.lsa_type, key.lsa_id, key.adv_rtr)
                        .cloned()
                        .unwrap();
                    lsdb.remove(&lsa).unwrap();
                    expected.remove(&key);
                }
                // Sweep MaxAge LSAs.
                _ => {
                    assert!(!lsdb.maxage_remover());
                    expected.retain(|_, maxage| !*maxage);
                }
            }

            assert!(lsdb.check().is_ok(), "seed {seed}");
            assert_eq!(lsdb.count(), expected.len(), "seed {seed}");
            let stats_count = lsdb
                .stats()
                .values()
                .map(|stats| stats.count)
                .sum::<usize>();
            assert_eq!(stats_count, expected.len(), "seed {seed}");
            let keys = lsdb.iter().map(|lsa| lsa.key());
            assert!(keys.eq(expected.keys().copied()), "seed {seed}");
        }
    }
}
