//! Snapshot persistence across store restarts.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use storefront_sync::slices::{CartLine, CartSummary};
use storefront_sync::{
    Command, Dispatcher, FileStorage, InMemoryStorage, InMemorySyncAdapter, SnapshotStorage,
    StoreConfig, SyncEngine, SyncError, SyncResponse,
};

fn config() -> StoreConfig {
    StoreConfig::default().with_debounce(Duration::ZERO)
}

#[tokio::test]
async fn guest_cart_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn SnapshotStorage> = Arc::new(FileStorage::new(dir.path()).unwrap());
    let server = InMemorySyncAdapter::new();

    let mut engine = SyncEngine::new(
        Dispatcher::<CartLine>::new(config()).with_storage(Arc::clone(&storage)),
        server.clone(),
    );
    engine
        .handle(Command::Add(CartLine::new("mug", 2).with_price(dec!(5.00))))
        .await;
    engine
        .handle(Command::Add(CartLine::new("plate", 1).with_price(dec!(3.00))))
        .await;
    drop(engine);

    assert!(dir.path().join("storefront_cart_lines.json").exists());

    let reopened = Dispatcher::<CartLine>::new(config()).with_storage(storage);
    assert_eq!(
        reopened.collection().ids(),
        &["cart_lines-1", "cart_lines-2"]
    );
    let summary: CartSummary = reopened.summary();
    assert_eq!(summary.subtotal, dec!(13.00));
    assert!(summary.is_settled());
}

#[test]
fn interrupted_adds_come_back_as_errors() {
    let storage = Arc::new(InMemoryStorage::new());

    let mut dispatcher = Dispatcher::<CartLine>::new(config()).with_storage(storage.clone());
    let request = dispatcher
        .submit(Command::Add(CartLine::new("mug", 1)))
        .into_request()
        .unwrap();
    let temp = request.op.target().unwrap().to_string();
    // the process dies before the response arrives
    drop(dispatcher);

    let mut reopened = Dispatcher::<CartLine>::new(config()).with_storage(storage);
    let entry = reopened.get(&temp).unwrap();
    assert!(entry.is_error());
    assert!(entry.local);

    let retry = reopened.submit(Command::Retry(temp.clone()));
    assert!(retry.request().is_some());
    assert!(reopened.get(&temp).unwrap().is_pending());
}

#[tokio::test]
async fn failed_mutations_persist_the_rolled_back_state() {
    let storage = Arc::new(InMemoryStorage::new());
    let server = InMemorySyncAdapter::new();
    let mut engine = SyncEngine::new(
        Dispatcher::<CartLine>::new(config()).with_storage(storage.clone()),
        server.clone(),
    );

    engine.handle(Command::Add(CartLine::new("mug", 1))).await;
    server.fail_next(SyncError::network("offline"));
    engine
        .handle(Command::Remove("cart_lines-1".into()))
        .await;

    let reopened = Dispatcher::<CartLine>::new(config()).with_storage(storage);
    assert!(reopened.get("cart_lines-1").unwrap().is_synced());
}

#[test]
fn disabled_persistence_writes_nothing() {
    let storage = Arc::new(InMemoryStorage::new());
    let mut dispatcher =
        Dispatcher::<CartLine>::new(config().with_persist(false)).with_storage(storage.clone());
    dispatcher.submit(Command::Add(CartLine::new("mug", 1)));

    assert!(storage.is_empty());
}

#[test]
fn custom_storage_key() {
    let storage = Arc::new(InMemoryStorage::new());
    let mut dispatcher = Dispatcher::<CartLine>::new(config().with_storage_key("guest-cart"))
        .with_storage(storage.clone());
    dispatcher.submit(Command::Add(CartLine::new("mug", 1)));

    assert!(storage.read("guest-cart").unwrap().is_some());
    assert!(storage.read("storefront:cart_lines").unwrap().is_none());
}

#[test]
fn confirmation_inside_the_window_is_written_once_it_ends() {
    let storage = Arc::new(InMemoryStorage::new());
    let config = StoreConfig::default().with_debounce(Duration::from_millis(100));
    let mut dispatcher = Dispatcher::<CartLine>::new(config.clone()).with_storage(storage.clone());

    let request = dispatcher
        .submit(Command::Add(CartLine::new("mug", 1)))
        .into_request()
        .unwrap();
    let mut confirmed = CartLine::new("mug", 1);
    confirmed.id = "cart_lines-1".into();
    dispatcher.complete(request, Ok(SyncResponse::Record(confirmed)));

    // no further commands, no flush
    std::thread::sleep(Duration::from_millis(500));

    let reopened = Dispatcher::<CartLine>::new(config).with_storage(storage);
    assert_eq!(reopened.collection().ids(), &["cart_lines-1"]);
    assert!(reopened.get("cart_lines-1").unwrap().is_synced());
    assert!(dispatcher.get("cart_lines-1").unwrap().is_synced());
}

#[test]
fn dropping_the_dispatcher_writes_the_held_back_snapshot() {
    let storage = Arc::new(InMemoryStorage::new());
    let config = StoreConfig::default().with_debounce(Duration::from_secs(3600));
    let mut dispatcher = Dispatcher::<CartLine>::new(config.clone()).with_storage(storage.clone());

    let request = dispatcher
        .submit(Command::Add(CartLine::new("mug", 1)))
        .into_request()
        .unwrap();
    let mut confirmed = CartLine::new("mug", 1);
    confirmed.id = "cart_lines-1".into();
    dispatcher.complete(request, Ok(SyncResponse::Record(confirmed)));
    drop(dispatcher);

    let reopened = Dispatcher::<CartLine>::new(config).with_storage(storage);
    assert!(reopened.get("cart_lines-1").unwrap().is_synced());
}

#[test]
fn debounced_writes_land_on_flush() {
    let storage = Arc::new(InMemoryStorage::new());
    let config = StoreConfig::default().with_debounce(Duration::from_secs(3600));
    let mut dispatcher = Dispatcher::<CartLine>::new(config.clone()).with_storage(storage.clone());

    dispatcher.submit(Command::Add(CartLine::new("mug", 1)));
    dispatcher.submit(Command::Add(CartLine::new("plate", 1)));

    let peek = Dispatcher::<CartLine>::new(config.clone()).with_storage(storage.clone());
    assert_eq!(peek.collection().len(), 1);

    dispatcher.flush();
    let after = Dispatcher::<CartLine>::new(config).with_storage(storage);
    assert_eq!(after.collection().len(), 2);
}
