// src/relay.rs
//! One reconciliation pass: diff the feed against the posted-state file,
//! deliver the delta oldest-first, persist only confirmed deliveries,
//! mirror the state file on a cooldown.

use anyhow::{Context, Result};
use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::time::Duration;

use crate::backup::{BackupSink, SyncGate};
use crate::feed::FeedSource;
use crate::notify::{confirm_delivery, Dispatcher, Target};
use crate::store::{contains_id, AnnouncementStore, PostedRecord};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("relay_cycles_total", "Reconciliation cycles started.");
        describe_counter!("relay_cycle_errors_total", "Cycles aborted by a feed failure.");
        describe_counter!("relay_posted_total", "Announcements confirmed delivered.");
        describe_counter!(
            "relay_delivery_failures_total",
            "Individual delivery attempts that failed."
        );
        describe_counter!("relay_backup_syncs_total", "Successful remote backups.");
        describe_counter!("relay_backup_errors_total", "Failed remote backups.");
        describe_gauge!("relay_last_cycle_ts", "Unix ts when a cycle last finished.");
    });
}

/// What one cycle did, for logs, the status page and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleOutcome {
    pub fetched: usize,
    pub posted: usize,
    pub failed: usize,
    pub synced: bool,
}

/// Long-lived orchestrator. Every collaborator is an injected capability
/// and the scheduling state (sync gate, pauses) lives in explicit fields,
/// so a cycle is testable by calling `run_cycle` directly.
pub struct Relay {
    feed: Box<dyn FeedSource>,
    dispatcher: Dispatcher,
    store: AnnouncementStore,
    targets: Vec<Target>,
    backup: Box<dyn BackupSink>,
    gate: SyncGate,
    announcement_pause: Duration,
}

impl Relay {
    pub fn new(
        feed: Box<dyn FeedSource>,
        dispatcher: Dispatcher,
        store: AnnouncementStore,
        targets: Vec<Target>,
        backup: Box<dyn BackupSink>,
        gate: SyncGate,
    ) -> Self {
        Self {
            feed,
            dispatcher,
            store,
            targets,
            backup,
            gate,
            announcement_pause: Duration::from_secs(1),
        }
    }

    pub fn with_announcement_pause(mut self, pause: Duration) -> Self {
        self.announcement_pause = pause;
        self
    }

    pub fn store(&self) -> &AnnouncementStore {
        &self.store
    }

    pub fn last_sync(&self) -> Option<chrono::DateTime<Utc>> {
        self.gate.last_sync()
    }

    /// One full pass. A feed failure aborts the cycle with the store
    /// untouched; everything after that point degrades per announcement
    /// or per target, never per cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        ensure_metrics_described();
        counter!("relay_cycles_total").increment(1);

        let mut records = self.store.load()?;
        let candidates = self.feed.fetch().await.context("feed fetch")?;

        let mut outcome = CycleOutcome {
            fetched: candidates.len(),
            ..Default::default()
        };

        if candidates.is_empty() {
            tracing::info!(feed = self.feed.name(), "no announcements");
            outcome.synced = self.sync_if_due(&records).await;
            self.finish_cycle();
            return Ok(outcome);
        }

        let known: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let mut fresh: Vec<PostedRecord> = Vec::new();

        // Feed order is newest-first; deliver oldest-first so channel
        // history reads top-to-bottom in publish order.
        for ann in candidates.iter().rev() {
            if known.contains(ann.id.as_str()) || contains_id(&fresh, &ann.id) {
                continue;
            }

            let outcomes = self.dispatcher.deliver(ann, &self.targets).await;
            match confirm_delivery(&ann.id, &outcomes) {
                Ok(()) => {
                    tracing::info!(id = %ann.id, title = %ann.title, "announcement posted");
                    counter!("relay_posted_total").increment(1);
                    fresh.push(PostedRecord {
                        id: ann.id.clone(),
                        title: ann.title.clone(),
                        posted_at: Utc::now(),
                    });
                }
                Err(e) => {
                    // Stays unknown to the store; retried next cycle.
                    tracing::warn!(id = %ann.id, title = %ann.title, error = %e, "announcement not posted");
                    outcome.failed += 1;
                }
            }

            tokio::time::sleep(self.announcement_pause).await;
        }

        if fresh.is_empty() {
            outcome.synced = self.sync_if_due(&records).await;
        } else {
            outcome.posted = fresh.len();
            records.extend(fresh);
            self.store.save(&records)?;
            outcome.synced = self.sync_now(&records).await;
        }

        self.finish_cycle();
        Ok(outcome)
    }

    /// Unconditional backup, used right after a successful save.
    async fn sync_now(&mut self, records: &[PostedRecord]) -> bool {
        let Ok(snapshot) = serde_json::to_vec_pretty(records) else {
            return false;
        };
        let ok = self.backup.sync(&snapshot).await;
        if ok {
            self.gate.record_sync(Utc::now());
        }
        ok
    }

    /// Time-gated backup, used when the cycle changed nothing.
    async fn sync_if_due(&mut self, records: &[PostedRecord]) -> bool {
        if !self.gate.should_sync(Utc::now()) {
            return false;
        }
        self.sync_now(records).await
    }

    fn finish_cycle(&self) {
        gauge!("relay_last_cycle_ts").set(Utc::now().timestamp().max(0) as f64);
    }
}
