//! Store-level guarantees that hold regardless of the flow that got there.

use std::collections::HashSet;

use rust_decimal_macros::dec;
use storefront_sync::slices::{CartLine, CartSummary};
use storefront_sync::{
    summarize, Command, EntityCollection, EntityStore, Record, Selector, SyncError, SyncStatus,
};

use crate::support::{harness, line};

fn synced(id: &str, product: &str, quantity: u32) -> CartLine {
    CartLine {
        id: id.into(),
        ..CartLine::new(product, quantity).with_price(dec!(2.00))
    }
}

#[test]
fn reconcile_twice_equals_reconcile_once() {
    let server = synced("cart_lines-1", "mug", 1);

    let mut once = EntityStore::new();
    once.apply_optimistic_add(CartLine::new("mug", 1), "tmp-a");
    once.reconcile("tmp-a", server.clone());

    let mut twice = EntityStore::new();
    twice.apply_optimistic_add(CartLine::new("mug", 1), "tmp-a");
    twice.reconcile("tmp-a", server.clone());
    twice.reconcile("tmp-a", server);

    assert_eq!(once.collection(), twice.collection());
}

#[test]
fn reconcile_leaves_one_record_per_natural_key() {
    let mut store = EntityStore::with_collection(EntityCollection::from_records(vec![
        synced("cart_lines-1", "mug", 1),
        synced("cart_lines-2", "plate", 1),
    ]));
    store.apply_optimistic_add(CartLine::new("mug", 1), "tmp-a");
    // the server merged the add into a fresh canonical record
    store.reconcile("tmp-a", synced("cart_lines-3", "mug", 2));

    let keys: Vec<String> = store
        .collection()
        .iter()
        .filter(|entry| entry.status == SyncStatus::Synced)
        .map(|entry| entry.record.natural_key())
        .collect();
    let unique: HashSet<&String> = keys.iter().collect();
    assert_eq!(keys.len(), unique.len());
    assert_eq!(store.len(), 2);
}

#[test]
fn reconcile_after_removal_is_ignored() {
    let mut store = EntityStore::<CartLine>::new();
    store.apply_optimistic_add(CartLine::new("mug", 1), "tmp-a");
    store.clear();
    store.reconcile("tmp-a", synced("cart_lines-1", "mug", 1));
    assert!(store.is_empty());
}

#[test]
fn every_rollback_restores_the_exact_prior_state() {
    let base = EntityCollection::from_records(vec![
        synced("cart_lines-1", "mug", 1),
        synced("cart_lines-2", "plate", 2),
        synced("cart_lines-3", "bowl", 3),
    ]);

    for id in ["cart_lines-1", "cart_lines-2", "cart_lines-3"] {
        let mut store = EntityStore::with_collection(base.clone());
        let prior = store.apply_optimistic_remove(id);
        store.mark_error(id, SyncError::server("boom"));
        store.revert(id, prior);
        assert_eq!(store.collection(), &base, "remove of {}", id);

        let mut store = EntityStore::with_collection(base.clone());
        let prior = store.apply_optimistic_update(id, synced(id, "changed", 99));
        store.mark_error(id, SyncError::server("boom"));
        store.revert(id, prior);
        assert_eq!(store.collection(), &base, "update of {}", id);
    }

    let mut store = EntityStore::with_collection(base.clone());
    store.apply_optimistic_add(CartLine::new("cup", 1), "tmp-a");
    store.mark_error("tmp-a", SyncError::network("offline"));
    store.revert("tmp-a", None);
    assert_eq!(store.collection(), &base);
}

#[test]
fn summary_is_a_pure_function_of_the_collection() {
    let collection = EntityCollection::from_records(vec![
        synced("cart_lines-1", "mug", 1),
        synced("cart_lines-2", "plate", 2),
    ]);
    let copy = collection.clone();

    let direct: CartSummary = summarize(&collection);
    assert_eq!(direct, summarize::<_, CartSummary>(&copy));
    assert_eq!(direct.subtotal, dec!(6.00));

    let selector = Selector::<CartLine, CartSummary>::new();
    assert_eq!(selector.select(&collection), direct);
    assert_eq!(selector.select(&collection), direct);
}

#[test]
fn store_summary_follows_mutations() {
    let mut h = harness();
    let dispatcher = h.engine.dispatcher_mut();
    let empty: CartSummary = dispatcher.summary();
    assert_eq!(empty.line_count, 0);

    dispatcher.submit(Command::Add(line("mug", 3, dec!(1.50))));
    let pending: CartSummary = dispatcher.summary();
    assert_eq!(pending.line_count, 1);
    assert_eq!(pending.pending, 1);
    assert_eq!(pending.subtotal, dec!(4.50));
    assert_eq!(dispatcher.summary::<CartSummary>(), pending);
}
