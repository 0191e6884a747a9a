// tests/feed_rss.rs
use campus_announce_relay::feed::rss::RssFeedSource;
use campus_announce_relay::feed::FeedSource;

#[tokio::test]
async fn fixture_parses_with_stable_ids_in_feed_order() {
    let xml: &str = include_str!("fixtures/announcements_rss.xml");
    let items = RssFeedSource::from_fixture_str(xml).fetch().await.unwrap();

    // The blank-title item is dropped.
    assert_eq!(items.len(), 3);

    // Feed order (newest first) is preserved; the relay reverses it.
    assert_eq!(items[0].title, "Spring 2026 course registration opens");
    assert_eq!(items[1].title, "Library hours extended during finals week");
    assert_eq!(items[2].title, "Campus shuttle schedule change");
    assert!(items[0].published_at > items[1].published_at);
    assert!(items[1].published_at > items[2].published_at);

    // guid wins, then link, then the short digest fallback.
    assert_eq!(items[0].id, "uni-ann-1042");
    assert_eq!(items[1].id, "https://library.uni.example/news/finals-hours");
    assert_eq!(items[2].id.len(), 16);
    assert!(items[2].id.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn empty_channel_yields_no_items() {
    let xml = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Empty</title></channel></rss>"#;
    let items = RssFeedSource::from_fixture_str(xml).fetch().await.unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn malformed_xml_is_a_fetch_error() {
    let items = RssFeedSource::from_fixture_str("<rss><channel><item>").fetch().await;
    assert!(items.is_err());
}
