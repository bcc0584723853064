use rust_decimal_macros::dec;
use storefront_sync::slices::{Review, ReviewSummary};
use storefront_sync::{
    BufferNotifier, Command, Dispatcher, InMemorySyncAdapter, StoreConfig, SyncEngine, SyncError,
    SyncOp,
};

fn engine() -> (
    SyncEngine<Review, InMemorySyncAdapter<Review>>,
    InMemorySyncAdapter<Review>,
    BufferNotifier,
) {
    let server = InMemorySyncAdapter::new();
    let notifier = BufferNotifier::new();
    let dispatcher = Dispatcher::new(StoreConfig::default()).with_notifier(notifier.clone());
    (SyncEngine::new(dispatcher, server.clone()), server, notifier)
}

#[tokio::test]
async fn second_review_by_same_author_replaces_the_first() {
    let (mut engine, server, _) = engine();
    engine
        .handle(Command::Add(Review::new("p1", "ann", 2).with_text("meh", "")))
        .await;
    let submission = engine
        .handle(Command::Add(
            Review::new("p1", "ann", 5).with_text("changed my mind", "great"),
        ))
        .await;

    assert!(matches!(
        submission.request().map(|r| &r.op),
        Some(SyncOp::Update { id, .. }) if id == "reviews-1"
    ));
    let collection = engine.dispatcher().collection();
    assert_eq!(collection.len(), 1);
    assert_eq!(collection.get("reviews-1").unwrap().record.rating, 5);
    assert_eq!(server.records()[0].title, "changed my mind");
}

#[tokio::test]
async fn rating_summary_tracks_the_collection() {
    let (mut engine, _, _) = engine();
    for (author, rating) in [("ann", 5), ("bob", 3), ("cy", 4)] {
        engine
            .handle(Command::Add(Review::new("p1", author, rating)))
            .await;
    }

    let summary: ReviewSummary = engine.dispatcher().summary();
    assert_eq!(summary.count, 3);
    assert_eq!(summary.average_rating, Some(dec!(4)));
    assert_eq!(summary.distribution, [0, 0, 1, 1, 1]);
}

#[tokio::test]
async fn rejected_review_disappears_with_a_validation_error() {
    let (mut engine, server, notifier) = engine();
    server.fail_next(SyncError::validation("body too short"));

    engine
        .handle(Command::Add(Review::new("p1", "ann", 1)))
        .await;

    assert!(engine.dispatcher().collection().is_empty());
    let errors = notifier.errors();
    assert_eq!(errors[0].message, "body too short");
    assert_eq!(errors[0].collection, "reviews");
}
