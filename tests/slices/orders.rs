use rust_decimal_macros::dec;
use storefront_sync::slices::{Order, OrderStatus, OrderSummary};
use storefront_sync::{
    BufferNotifier, Command, Dispatcher, ErrorCode, InMemorySyncAdapter, StoreConfig, SyncEngine,
    SyncError,
};

fn history() -> Vec<Order> {
    vec![
        Order {
            id: "orders-1".into(),
            ..Order::new("SO-1001", OrderStatus::Delivered).with_total(dec!(59.90), 3)
        },
        Order {
            id: "orders-2".into(),
            ..Order::new("SO-1002", OrderStatus::Shipped).with_total(dec!(12.00), 1)
        },
        Order {
            id: "orders-3".into(),
            ..Order::new("SO-1003", OrderStatus::Cancelled).with_total(dec!(30.00), 2)
        },
    ]
}

#[tokio::test]
async fn load_fills_order_history() {
    let server = InMemorySyncAdapter::with_records(history());
    let mut engine = SyncEngine::new(Dispatcher::default(), server);

    engine.handle(Command::Load).await;

    let collection = engine.dispatcher().collection();
    assert_eq!(collection.ids(), &["orders-1", "orders-2", "orders-3"]);
    assert!(collection.iter().all(|entry| entry.is_synced()));

    let summary: OrderSummary = engine.dispatcher().summary();
    assert_eq!(summary.count, 3);
    assert_eq!(summary.total_spent, dec!(71.90));
    assert_eq!(summary.by_status[&OrderStatus::Cancelled], 1);
}

#[tokio::test]
async fn failed_load_keeps_what_was_there() {
    let server = InMemorySyncAdapter::with_records(history());
    let notifier = BufferNotifier::new();
    let dispatcher = Dispatcher::new(StoreConfig::default()).with_notifier(notifier.clone());
    let mut engine = SyncEngine::new(dispatcher, server.clone());

    engine.handle(Command::Load).await;
    server.fail_next(SyncError::new(ErrorCode::Unauthorized, "session expired"));
    engine.handle(Command::Load).await;

    assert_eq!(engine.dispatcher().collection().len(), 3);
    let errors = notifier.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, Some(ErrorCode::Unauthorized));
    assert_eq!(errors[0].record_id, None);
}

#[tokio::test]
async fn cancelling_an_order_updates_the_summary() {
    let server = InMemorySyncAdapter::with_records(history());
    let mut engine = SyncEngine::new(Dispatcher::default(), server);
    engine.handle(Command::Load).await;

    let mut order = engine.dispatcher().get("orders-2").unwrap().record.clone();
    order.status = OrderStatus::Cancelled;
    engine.handle(Command::Update(order)).await;

    let summary: OrderSummary = engine.dispatcher().summary();
    assert_eq!(summary.total_spent, dec!(59.90));
    assert_eq!(summary.by_status[&OrderStatus::Cancelled], 2);
}
