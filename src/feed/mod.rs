// src/feed/mod.rs
pub mod bridge;
pub mod rss;

use anyhow::Result;
use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

/// One candidate announcement as produced by a feed provider.
/// Transient; only `id`/`title` survive into the posted-state file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub id: String,
    pub title: String,
    /// Source-formatted publish timestamp, kept verbatim for diagnostics.
    pub pub_date: Option<String>,
    /// Best-effort unix parse of `pub_date`; 0 when unparseable.
    pub published_at: u64,
    pub link: String,
}

/// Capability boundary for the announcement source. Providers return
/// candidates in feed order (typically newest first) and never reorder;
/// any error aborts the current reconciliation cycle.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Announcement>>;
    fn name(&self) -> &'static str;
}

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_items_total", "Announcements parsed from the feed.");
        describe_counter!("feed_fetch_errors_total", "Feed fetch/parse errors.");
        describe_histogram!("feed_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Normalize an announcement title: decode HTML entities, strip tags,
/// collapse whitespace, trim.
pub fn normalize_title(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // Length cap: 500 chars
    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }

    out
}

pub(crate) fn parse_rfc2822_to_unix(ts: &str) -> u64 {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|x| u64::try_from(x).ok())
        .unwrap_or(0)
}

/// Derive a stable identifier for a feed item: prefer the feed guid, then
/// the item link, then a short digest of title + pubDate for items that
/// carry neither.
pub fn stable_id(guid: Option<&str>, link: Option<&str>, title: &str, pub_date: Option<&str>) -> String {
    if let Some(g) = guid.map(str::trim).filter(|g| !g.is_empty()) {
        return g.to_string();
    }
    if let Some(l) = link.map(str::trim).filter(|l| !l.is_empty()) {
        return l.to_string();
    }
    short_digest(&format!("{title}|{}", pub_date.unwrap_or_default()))
}

fn short_digest(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

// --- Test helpers ---

/// Feed that returns a fixed candidate list, in the order given.
pub struct StaticFeed {
    pub items: Vec<Announcement>,
}

#[async_trait::async_trait]
impl FeedSource for StaticFeed {
    async fn fetch(&self) -> Result<Vec<Announcement>> {
        Ok(self.items.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Feed that always fails, for fetch-isolation tests.
pub struct FailingFeed;

#[async_trait::async_trait]
impl FeedSource for FailingFeed {
    async fn fetch(&self) -> Result<Vec<Announcement>> {
        anyhow::bail!("feed unreachable")
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
