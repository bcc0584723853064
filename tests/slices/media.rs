use storefront_sync::slices::{MediaItem, MediaSummary};
use storefront_sync::{
    Command, Dispatcher, FailurePolicy, InMemorySyncAdapter, StoreConfig, Submission, SyncEngine,
    SyncError,
};

#[tokio::test]
async fn failed_upload_stays_visible_until_dismissed() {
    let server = InMemorySyncAdapter::new();
    let config = StoreConfig::default().with_failure_policy(FailurePolicy::Retain);
    let mut engine = SyncEngine::new(Dispatcher::new(config), server.clone());

    engine
        .handle(Command::Add(MediaItem::new("p1", "a.jpg").with_size(500)))
        .await;
    server.fail_next(SyncError::server("storage full"));
    let failed = engine
        .handle(Command::Add(MediaItem::new("p1", "b.jpg").at(1).with_size(700)))
        .await;
    let temp = failed.request().unwrap().op.target().unwrap().to_string();

    let summary: MediaSummary = engine.dispatcher().summary();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.total_bytes, 1_200);
    assert!(engine.dispatcher().get(&temp).unwrap().is_error());

    // removing a never-created item is local
    let removed = engine.handle(Command::Remove(temp)).await;
    assert!(matches!(removed, Submission::Local));

    let summary: MediaSummary = engine.dispatcher().summary();
    assert_eq!(summary.count, 1);
    assert_eq!(summary.total_bytes, 500);
    assert_eq!(server.records().len(), 1);
}

#[tokio::test]
async fn same_url_on_different_products_is_two_items() {
    let server = InMemorySyncAdapter::new();
    let mut engine = SyncEngine::new(Dispatcher::default(), server.clone());

    engine
        .handle(Command::Add(MediaItem::new("p1", "shared.jpg")))
        .await;
    engine
        .handle(Command::Add(MediaItem::new("p2", "shared.jpg")))
        .await;

    assert_eq!(engine.dispatcher().collection().len(), 2);
    assert_eq!(server.records().len(), 2);
}
