// src/feed/bridge.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;

use crate::feed::{normalize_title, stable_id, Announcement, FeedSource};

/// Reads announcements through an RSS-to-JSON bridge (rss2json-style
/// endpoint). Useful when the upstream page blocks direct scraping.
pub struct JsonBridgeSource {
    url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    #[serde(default)]
    items: Vec<BridgeItem>,
}

#[derive(Debug, Deserialize)]
struct BridgeItem {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

impl JsonBridgeSource {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn map_items(items: Vec<BridgeItem>) -> Vec<Announcement> {
        let mut out = Vec::with_capacity(items.len());
        for it in items {
            let title = normalize_title(it.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }
            let id = stable_id(
                it.guid.as_deref(),
                it.link.as_deref(),
                &title,
                it.pub_date.as_deref(),
            );
            out.push(Announcement {
                id,
                title,
                published_at: it
                    .pub_date
                    .as_deref()
                    .map(crate::feed::parse_rfc2822_to_unix)
                    .unwrap_or(0),
                pub_date: it.pub_date,
                link: it.link.unwrap_or_default(),
            });
        }
        out
    }
}

#[async_trait]
impl FeedSource for JsonBridgeSource {
    async fn fetch(&self) -> Result<Vec<Announcement>> {
        crate::feed::ensure_metrics_described();
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("bridge http get()")?;
        let status = resp.status();
        let body = resp.text().await.context("bridge http .text()")?;

        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed == "null" {
            counter!("feed_fetch_errors_total").increment(1);
            anyhow::bail!("bridge returned empty/null with status {status}");
        }

        let parsed: BridgeResponse = serde_json::from_str(trimmed)
            .with_context(|| format!("parse bridge JSON failed (status {status})"))?;

        let out = Self::map_items(parsed.items);
        counter!("feed_items_total").increment(out.len() as u64);
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "bridge"
    }
}
