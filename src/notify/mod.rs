// src/notify/mod.rs
pub mod policy;
pub mod webhook;

use anyhow::{bail, Result};
use metrics::counter;
use serde::Deserialize;
use std::time::Duration;

use crate::feed::Announcement;
use policy::RetryPolicy;
use webhook::AnnouncementPayload;

/// One configured delivery destination. The endpoint URL carries the
/// webhook credential; never log it unmasked.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub endpoint: String,
}

/// Per (announcement, target) result. Ephemeral; aggregated per
/// announcement only to decide whether it counts as delivered.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub target: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Reduce an endpoint URL to scheme + host for diagnostics. Webhook
/// tokens live in the path, so everything past the host is dropped.
pub fn mask_endpoint(url: &str) -> String {
    let (scheme, rest) = match url.split_once("://") {
        Some((s, r)) => (s, r),
        None => return "<invalid endpoint>".to_string(),
    };
    let host = rest.split('/').next().unwrap_or_default();
    format!("{scheme}://{host}/…")
}

/// Transport boundary for one webhook post. The HTTP implementation lives
/// in `webhook.rs`; tests inject a scripted one.
#[async_trait::async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post(
        &self,
        endpoint: &str,
        payload: &AnnouncementPayload,
        timeout: Duration,
    ) -> Result<()>;
}

#[async_trait::async_trait]
impl<T: WebhookTransport + ?Sized> WebhookTransport for std::sync::Arc<T> {
    async fn post(
        &self,
        endpoint: &str,
        payload: &AnnouncementPayload,
        timeout: Duration,
    ) -> Result<()> {
        (**self).post(endpoint, payload, timeout).await
    }
}

/// Delivers one announcement to each target in list order, sequentially
/// (parallel posts would trip the chat system's rate limits). Bounded
/// retries per target; one target's exhaustion never blocks the rest.
pub struct Dispatcher {
    transport: Box<dyn WebhookTransport>,
    policy: RetryPolicy,
    target_pause: Duration,
}

impl Dispatcher {
    pub fn new(transport: Box<dyn WebhookTransport>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
            target_pause: Duration::from_millis(750),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_target_pause(mut self, pause: Duration) -> Self {
        self.target_pause = pause;
        self
    }

    /// Attempt delivery to every target. Returns the full outcome list
    /// unconditionally; partial failure is the caller's call to make via
    /// `confirm_delivery`.
    pub async fn deliver(&self, ann: &Announcement, targets: &[Target]) -> Vec<DeliveryOutcome> {
        let payload = AnnouncementPayload::from_announcement(ann);
        let mut outcomes = Vec::with_capacity(targets.len());

        for (i, target) in targets.iter().enumerate() {
            let mut last_err: Option<String> = None;
            let mut attempt: u8 = 0;
            let success = loop {
                attempt += 1;
                let timeout = self.policy.attempt_timeout(attempt);
                match self.transport.post(&target.endpoint, &payload, timeout).await {
                    Ok(()) => break true,
                    Err(e) => {
                        tracing::warn!(
                            id = %ann.id,
                            title = %ann.title,
                            target = %target.name,
                            endpoint = %mask_endpoint(&target.endpoint),
                            attempt,
                            error = %e,
                            "delivery attempt failed"
                        );
                        counter!("relay_delivery_failures_total").increment(1);
                        last_err = Some(e.to_string());
                        match self.policy.backoff_delay(attempt) {
                            Some(delay) => tokio::time::sleep(delay).await,
                            None => break false,
                        }
                    }
                }
            };

            outcomes.push(DeliveryOutcome {
                target: target.name.clone(),
                success,
                error: if success { None } else { last_err },
            });

            if i + 1 < targets.len() {
                tokio::time::sleep(self.target_pause).await;
            }
        }

        outcomes
    }
}

/// An announcement counts as delivered when at least one target succeeded.
/// Known gap, carried deliberately: once any target succeeds the id is
/// recorded and the remaining failed targets are never retried for that
/// announcement.
pub fn confirm_delivery(id: &str, outcomes: &[DeliveryOutcome]) -> Result<()> {
    if outcomes.iter().any(|o| o.success) {
        return Ok(());
    }
    bail!("all targets failed for announcement {id}");
}

// --- Test helpers ---

/// Transport that fails a scripted number of times per endpoint before
/// succeeding (`u32::MAX` = always fail). Records every attempt.
pub struct MockTransport {
    pub fail_first: std::sync::Mutex<std::collections::HashMap<String, u32>>,
    pub attempts: std::sync::Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            fail_first: std::sync::Mutex::new(std::collections::HashMap::new()),
            attempts: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing(endpoint: &str, times: u32) -> Self {
        let t = Self::new();
        t.fail_first
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), times);
        t
    }

    pub fn attempts_for(&self, endpoint: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == endpoint)
            .count()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WebhookTransport for MockTransport {
    async fn post(
        &self,
        endpoint: &str,
        _payload: &AnnouncementPayload,
        _timeout: Duration,
    ) -> Result<()> {
        self.attempts.lock().unwrap().push(endpoint.to_string());
        let mut failures = self.fail_first.lock().unwrap();
        match failures.get_mut(endpoint) {
            None => Ok(()),
            Some(n) if *n == u32::MAX => bail!("scripted failure"),
            Some(0) => Ok(()),
            Some(n) => {
                *n -= 1;
                bail!("scripted failure")
            }
        }
    }
}
