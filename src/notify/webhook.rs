// src/notify/webhook.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::WebhookTransport;
use crate::feed::Announcement;

/// Chat-webhook body: a short content line plus one embed per
/// announcement, so channel history stays scannable.
#[derive(Debug, Clone, Serialize)]
pub struct AnnouncementPayload {
    content: Option<String>,
    embeds: Vec<AnnouncementEmbed>,
}

#[derive(Debug, Clone, Serialize)]
struct AnnouncementEmbed {
    title: String,
    url: String,
    description: String,
}

impl AnnouncementPayload {
    pub fn from_announcement(ann: &Announcement) -> Self {
        let description = match ann.pub_date.as_deref() {
            Some(d) => format!("Published: {d}"),
            None => "Published: —".to_string(),
        };
        Self {
            content: Some("📣 New announcement".to_string()),
            embeds: vec![AnnouncementEmbed {
                title: ann.title.clone(),
                url: ann.link.clone(),
                description,
            }],
        }
    }
}

/// Posts the payload over HTTPS with the per-attempt deadline the
/// dispatcher hands in. Retry/backoff live in the dispatcher, not here.
pub struct HttpWebhookTransport {
    client: Client,
}

impl HttpWebhookTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpWebhookTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhookTransport {
    async fn post(
        &self,
        endpoint: &str,
        payload: &AnnouncementPayload,
        timeout: Duration,
    ) -> Result<()> {
        // reqwest errors embed the request URL; strip it so the webhook
        // token never reaches logs.
        let rsp = self
            .client
            .post(endpoint)
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| anyhow!("webhook request failed: {}", e.without_url()))?;

        rsp.error_for_status()
            .map_err(|e| anyhow!("webhook HTTP error: {}", e.without_url()))?;
        Ok(())
    }
}
