// tests/store_state.rs
use std::sync::Arc;
use std::time::Duration;

use campus_announce_relay::backup::{MockSink, SyncGate};
use campus_announce_relay::feed::{Announcement, StaticFeed};
use campus_announce_relay::notify::{Dispatcher, MockTransport, Target};
use campus_announce_relay::relay::Relay;
use campus_announce_relay::store::{AnnouncementStore, PostedRecord};

#[tokio::test]
async fn corrupt_store_recovers_and_treats_feed_as_new() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("posted.json");
    std::fs::write(&path, "{{{ definitely not json").unwrap();

    let feed = vec![Announcement {
        id: "c1".into(),
        title: "Announcement c1".into(),
        pub_date: None,
        published_at: 100,
        link: "https://uni.example/news/c1".into(),
    }];

    let mut relay = Relay::new(
        Box::new(StaticFeed { items: feed }),
        Dispatcher::new(Box::new(Arc::new(MockTransport::new()))),
        AnnouncementStore::new(&path),
        vec![Target {
            name: "general".into(),
            endpoint: "https://chat.example/hooks/general".into(),
        }],
        Box::new(MockSink::new()),
        SyncGate::new(0),
    )
    .with_announcement_pause(Duration::from_millis(1));

    let outcome = relay.run_cycle().await.unwrap();

    // The corrupt file was reset, the cycle saw everything as new, and
    // the post-cycle state is valid JSON again.
    assert_eq!(outcome.posted, 1);
    let raw = std::fs::read_to_string(&path).unwrap();
    let records: Vec<PostedRecord> = serde_json::from_str(&raw).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "c1");
}
