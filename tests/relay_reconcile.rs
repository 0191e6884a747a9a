// tests/relay_reconcile.rs
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use campus_announce_relay::backup::{MockSink, SyncGate};
use campus_announce_relay::feed::{Announcement, StaticFeed};
use campus_announce_relay::notify::{policy::RetryPolicy, Dispatcher, MockTransport, Target};
use campus_announce_relay::relay::Relay;
use campus_announce_relay::store::{AnnouncementStore, PostedRecord};

fn ann(id: &str, published_at: u64) -> Announcement {
    Announcement {
        id: id.into(),
        title: format!("Announcement {id}"),
        pub_date: None,
        published_at,
        link: format!("https://uni.example/news/{id}"),
    }
}

fn targets() -> Vec<Target> {
    vec![
        Target {
            name: "general".into(),
            endpoint: "https://chat.example/hooks/general".into(),
        },
        Target {
            name: "exams".into(),
            endpoint: "https://chat.example/hooks/exams".into(),
        },
    ]
}

/// Relay wired with mocks and millisecond pauses.
fn relay(
    feed_items: Vec<Announcement>,
    transport: Arc<MockTransport>,
    store_path: &Path,
    sink: Arc<MockSink>,
) -> Relay {
    let dispatcher = Dispatcher::new(Box::new(transport))
        .with_policy(RetryPolicy {
            max_attempts: 3,
            base_timeout: Duration::from_millis(100),
            initial_backoff: Duration::from_millis(1),
        })
        .with_target_pause(Duration::from_millis(1));

    Relay::new(
        Box::new(StaticFeed { items: feed_items }),
        dispatcher,
        AnnouncementStore::new(store_path),
        targets(),
        Box::new(sink),
        SyncGate::new(0),
    )
    .with_announcement_pause(Duration::from_millis(1))
}

fn stored_ids(path: &Path) -> Vec<String> {
    let raw = std::fs::read_to_string(path).unwrap();
    let records: Vec<PostedRecord> = serde_json::from_str(&raw).unwrap();
    records.into_iter().map(|r| r.id).collect()
}

#[tokio::test]
async fn new_announcements_are_recorded_in_chronological_order() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("posted.json");

    // Feed order is newest first; the store must read oldest first.
    let feed = vec![ann("c3", 300), ann("c2", 200), ann("c1", 100)];
    let mut relay = relay(
        feed,
        Arc::new(MockTransport::new()),
        &path,
        Arc::new(MockSink::new()),
    );

    let outcome = relay.run_cycle().await.unwrap();
    assert_eq!(outcome.fetched, 3);
    assert_eq!(outcome.posted, 3);
    assert_eq!(stored_ids(&path), vec!["c1", "c2", "c3"]);
}

#[tokio::test]
async fn second_cycle_with_unchanged_feed_posts_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("posted.json");
    let transport = Arc::new(MockTransport::new());

    let feed = vec![ann("c2", 200), ann("c1", 100)];
    let mut relay = relay(
        feed,
        Arc::clone(&transport),
        &path,
        Arc::new(MockSink::new()),
    );

    relay.run_cycle().await.unwrap();
    let bytes_after_first = std::fs::read(&path).unwrap();
    let posts_after_first = transport.attempts.lock().unwrap().len();

    let outcome = relay.run_cycle().await.unwrap();
    assert_eq!(outcome.posted, 0);
    assert_eq!(outcome.failed, 0);
    // No deliveries and no store mutation on the second run.
    assert_eq!(transport.attempts.lock().unwrap().len(), posts_after_first);
    assert_eq!(std::fs::read(&path).unwrap(), bytes_after_first);
}

#[tokio::test]
async fn all_targets_failing_leaves_announcement_unrecorded() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("posted.json");

    let transport = Arc::new(MockTransport::new());
    transport
        .fail_first
        .lock()
        .unwrap()
        .insert("https://chat.example/hooks/general".into(), u32::MAX);
    transport
        .fail_first
        .lock()
        .unwrap()
        .insert("https://chat.example/hooks/exams".into(), u32::MAX);

    let mut relay = relay(
        vec![ann("c1", 100)],
        transport,
        &path,
        Arc::new(MockSink::new()),
    );

    let outcome = relay.run_cycle().await.unwrap();
    assert_eq!(outcome.posted, 0);
    assert_eq!(outcome.failed, 1);
    assert!(stored_ids(&path).is_empty());
}

#[tokio::test]
async fn one_successful_target_is_enough_to_record() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("posted.json");

    let transport = Arc::new(MockTransport::new());
    transport
        .fail_first
        .lock()
        .unwrap()
        .insert("https://chat.example/hooks/general".into(), u32::MAX);

    let mut relay = relay(
        vec![ann("c1", 100)],
        transport,
        &path,
        Arc::new(MockSink::new()),
    );

    let outcome = relay.run_cycle().await.unwrap();
    assert_eq!(outcome.posted, 1);
    assert_eq!(stored_ids(&path), vec!["c1"]);
}

#[tokio::test]
async fn overlapping_feeds_never_duplicate_ids() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("posted.json");

    let mut first = relay(
        vec![ann("c1", 100)],
        Arc::new(MockTransport::new()),
        &path,
        Arc::new(MockSink::new()),
    );
    first.run_cycle().await.unwrap();

    // Next cycle the feed still contains c1, plus a new item and a
    // repeated id inside the same batch.
    let mut second = relay(
        vec![ann("c2", 200), ann("c2", 200), ann("c1", 100)],
        Arc::new(MockTransport::new()),
        &path,
        Arc::new(MockSink::new()),
    );
    let outcome = second.run_cycle().await.unwrap();

    assert_eq!(outcome.posted, 1);
    assert_eq!(stored_ids(&path), vec!["c1", "c2"]);
}
