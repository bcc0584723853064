use axum::http::StatusCode;
use rust_decimal_macros::dec;
use serde_json::json;
use storefront_sync::slices::CartLine;
use storefront_sync::{
    BufferNotifier, Command, Dispatcher, ErrorCode, HttpSyncAdapter, StoreConfig, SyncAdapter,
    SyncEngine, SyncOp, SyncRequest, SyncResponse,
};

use crate::server;

fn engine(
    base: &str,
) -> (
    SyncEngine<CartLine, HttpSyncAdapter<CartLine>>,
    BufferNotifier,
) {
    let notifier = BufferNotifier::new();
    let dispatcher = Dispatcher::new(StoreConfig::default()).with_notifier(notifier.clone());
    (
        SyncEngine::new(dispatcher, HttpSyncAdapter::new(base)),
        notifier,
    )
}

#[tokio::test]
async fn create_update_delete_roundtrip() {
    let (base, state) = server::start().await;
    let (mut engine, notifier) = engine(&base);

    engine
        .handle(Command::Add(CartLine::new("mug", 1).with_price(dec!(7.25))))
        .await;
    assert_eq!(engine.dispatcher().collection().ids(), &["line-1"]);
    assert!(engine.dispatcher().get("line-1").unwrap().is_synced());

    engine
        .handle(Command::Add(CartLine::new("mug", 2)))
        .await;
    assert_eq!(state.lock().unwrap().lines[0].quantity, 3);
    assert_eq!(
        state.lock().unwrap().lines[0].unit_price,
        Some(dec!(7.25))
    );

    engine.handle(Command::Remove("line-1".into())).await;
    assert!(engine.dispatcher().collection().is_empty());
    assert!(state.lock().unwrap().lines.is_empty());
    assert!(notifier.errors().is_empty());
}

#[tokio::test]
async fn load_reads_the_collection() {
    let (base, state) = server::start().await;
    state.lock().unwrap().lines.push(CartLine {
        id: "line-9".into(),
        ..CartLine::new("plate", 4)
    });
    let (mut engine, _) = engine(&base);

    engine.handle(Command::Load).await;
    assert_eq!(engine.dispatcher().collection().ids(), &["line-9"]);
}

#[tokio::test]
async fn structured_error_bodies_are_decoded() {
    let (base, state) = server::start().await;
    state.lock().unwrap().fail_with = Some((
        StatusCode::UNPROCESSABLE_ENTITY,
        Some(json!({ "message": "quantity must be positive", "code": "validation" })),
    ));
    let (mut engine, notifier) = engine(&base);

    engine.handle(Command::Add(CartLine::new("mug", 0))).await;

    assert!(engine.dispatcher().collection().is_empty());
    let errors = notifier.errors();
    assert_eq!(errors[0].code, Some(ErrorCode::Validation));
    assert_eq!(errors[0].message, "quantity must be positive");
}

#[tokio::test]
async fn bare_status_codes_pick_the_category() {
    let (base, state) = server::start().await;
    let adapter = HttpSyncAdapter::<CartLine>::new(&base);

    state.lock().unwrap().fail_with = Some((StatusCode::SERVICE_UNAVAILABLE, None));
    let err = adapter
        .execute(&SyncRequest {
            ticket: 4,
            op: SyncOp::Load,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Server);
    assert_eq!(err.context.as_deref(), Some("ticket 4 load"));

    let ok = adapter
        .execute(&SyncRequest {
            ticket: 5,
            op: SyncOp::Load,
        })
        .await
        .unwrap();
    assert_eq!(ok, SyncResponse::Records(Vec::new()));
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    // nothing listens on port 9 of localhost
    let adapter = HttpSyncAdapter::<CartLine>::new("http://127.0.0.1:9");
    let err = adapter
        .execute(&SyncRequest {
            ticket: 1,
            op: SyncOp::Load,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Network);
}

#[tokio::test]
async fn missing_record_on_update_rolls_back() {
    let (base, state) = server::start().await;
    let (mut engine, notifier) = engine(&base);
    engine.handle(Command::Add(CartLine::new("mug", 1))).await;

    // deleted behind the client's back
    state.lock().unwrap().lines.clear();
    let mut line = engine.dispatcher().get("line-1").unwrap().record.clone();
    line.quantity = 5;
    engine.handle(Command::Update(line)).await;

    let entry = engine.dispatcher().get("line-1").unwrap();
    assert_eq!(entry.record.quantity, 1);
    assert!(entry.is_synced());
    assert_eq!(notifier.errors()[0].code, Some(ErrorCode::NotFound));
}
