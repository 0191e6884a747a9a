// src/feed/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::feed::{normalize_title, parse_rfc2822_to_unix, stable_id, Announcement, FeedSource};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}
#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text")]
    value: Option<String>,
}

/// Reads the university announcement feed as plain RSS XML, either from a
/// live URL or from an injected fixture string (tests).
pub struct RssFeedSource {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssFeedSource {
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            mode: Mode::Http {
                url: url.into(),
                client: reqwest::Client::new(),
            },
        }
    }

    fn parse_items_from_str(s: &str) -> Result<Vec<Announcement>> {
        crate::feed::ensure_metrics_described();
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).context("parsing announcement rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let title = normalize_title(it.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }

            let guid = it.guid.as_ref().and_then(|g| g.value.as_deref());
            let id = stable_id(guid, it.link.as_deref(), &title, it.pub_date.as_deref());

            out.push(Announcement {
                id,
                title,
                published_at: it
                    .pub_date
                    .as_deref()
                    .map(parse_rfc2822_to_unix)
                    .unwrap_or(0),
                pub_date: it.pub_date,
                link: it.link.unwrap_or_default(),
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("feed_parse_ms").record(ms);
        counter!("feed_items_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn fetch(&self) -> Result<Vec<Announcement>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_items_from_str(s),

            Mode::Http { url, client } => {
                let body = match client.get(url).send().await {
                    Ok(resp) => resp
                        .error_for_status()
                        .context("feed http status")?
                        .text()
                        .await
                        .context("feed http .text()")?,
                    Err(e) => {
                        counter!("feed_fetch_errors_total").increment(1);
                        return Err(e).context("feed http get()");
                    }
                };
                Self::parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "rss"
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
