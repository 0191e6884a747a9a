// src/backup.rs
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use metrics::counter;
use reqwest::Client;
use serde::Deserialize;

/// Mirror of the posted-state file in a remote repository. Failures never
/// cross this boundary: `sync` returns false and the main delivery path
/// carries on.
#[async_trait::async_trait]
pub trait BackupSink: Send + Sync {
    async fn sync(&self, snapshot: &[u8]) -> bool;
}

#[async_trait::async_trait]
impl<T: BackupSink + ?Sized> BackupSink for std::sync::Arc<T> {
    async fn sync(&self, snapshot: &[u8]) -> bool {
        (**self).sync(snapshot).await
    }
}

/// Cooldown gate for time-gated backup runs.
/// - First sync always allowed.
/// - Inside cooldown, syncs are suppressed.
/// - State is updated explicitly via `record_sync` after a successful push,
///   so a failed push is retried at the next opportunity.
#[derive(Debug, Clone, Default)]
pub struct SyncGate {
    cooldown: ChronoDuration,
    last_sync: Option<DateTime<Utc>>,
}

impl SyncGate {
    /// `cooldown_secs` < 0 is treated as 0 (no cooldown).
    pub fn new(cooldown_secs: i64) -> Self {
        Self {
            cooldown: ChronoDuration::seconds(cooldown_secs.max(0)),
            last_sync: None,
        }
    }

    /// Check if a sync may run at `now`. Does NOT mutate state.
    pub fn should_sync(&self, now: DateTime<Utc>) -> bool {
        match self.last_sync {
            None => true,
            Some(ts) => now.signed_duration_since(ts) >= self.cooldown,
        }
    }

    /// Record that a sync completed at `now`.
    pub fn record_sync(&mut self, now: DateTime<Utc>) {
        self.last_sync = Some(now);
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }
}

/// Pushes the snapshot to a GitHub repository via the contents API
/// (create-or-update). Unconfigured installs are a no-op so local runs
/// work without a token.
pub struct GitHubBackup {
    cfg: Option<GitHubBackupCfg>,
    client: Client,
}

#[derive(Debug, Clone)]
struct GitHubBackupCfg {
    repo: String,
    path: String,
    branch: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ContentsMeta {
    sha: String,
}

impl GitHubBackup {
    /// Reads BACKUP_REPO ("owner/repo"), BACKUP_PATH, BACKUP_BRANCH and
    /// GITHUB_TOKEN. Backup is disabled unless repo and token are set.
    pub fn from_env() -> Self {
        let repo = std::env::var("BACKUP_REPO").ok();
        let token = std::env::var("GITHUB_TOKEN").ok();
        let cfg = match (repo, token) {
            (Some(repo), Some(token)) => Some(GitHubBackupCfg {
                repo,
                path: std::env::var("BACKUP_PATH").unwrap_or_else(|_| "posted.json".to_string()),
                branch: std::env::var("BACKUP_BRANCH").unwrap_or_else(|_| "main".to_string()),
                token,
            }),
            _ => None,
        };
        Self {
            cfg,
            client: Client::new(),
        }
    }

    async fn push(&self, cfg: &GitHubBackupCfg, snapshot: &[u8]) -> Result<()> {
        let url = format!(
            "https://api.github.com/repos/{}/contents/{}",
            cfg.repo, cfg.path
        );

        // Existing file sha is required for updates; 404 means create.
        let rsp = self
            .client
            .get(&url)
            .query(&[("ref", cfg.branch.as_str())])
            .bearer_auth(&cfg.token)
            .header(reqwest::header::USER_AGENT, "campus-announce-relay")
            .send()
            .await
            .context("backup contents get")?;

        let sha = if rsp.status() == reqwest::StatusCode::NOT_FOUND {
            None
        } else {
            let meta: ContentsMeta = rsp
                .error_for_status()
                .context("backup contents status")?
                .json()
                .await
                .context("backup contents json")?;
            Some(meta.sha)
        };

        let mut body = serde_json::json!({
            "message": format!("backup posted state {}", Utc::now().to_rfc3339()),
            "content": STANDARD.encode(snapshot),
            "branch": cfg.branch,
        });
        if let Some(sha) = sha {
            body["sha"] = serde_json::Value::String(sha);
        }

        self.client
            .put(&url)
            .bearer_auth(&cfg.token)
            .header(reqwest::header::USER_AGENT, "campus-announce-relay")
            .json(&body)
            .send()
            .await
            .context("backup contents put")?
            .error_for_status()
            .context("backup put status")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl BackupSink for GitHubBackup {
    async fn sync(&self, snapshot: &[u8]) -> bool {
        let Some(cfg) = &self.cfg else {
            tracing::debug!("backup disabled (no BACKUP_REPO / GITHUB_TOKEN)");
            return true;
        };

        match self.push(cfg, snapshot).await {
            Ok(()) => {
                counter!("relay_backup_syncs_total").increment(1);
                tracing::info!(repo = %cfg.repo, path = %cfg.path, "posted state backed up");
                true
            }
            Err(e) => {
                counter!("relay_backup_errors_total").increment(1);
                tracing::warn!(repo = %cfg.repo, error = %e, "backup sync failed");
                false
            }
        }
    }
}

// --- Test helper ---
pub struct MockSink {
    pub calls: std::sync::Mutex<Vec<Vec<u8>>>,
    pub fail: bool,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            calls: std::sync::Mutex::new(vec![]),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: std::sync::Mutex::new(vec![]),
            fail: true,
        }
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BackupSink for MockSink {
    async fn sync(&self, snapshot: &[u8]) -> bool {
        self.calls.lock().unwrap().push(snapshot.to_vec());
        !self.fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn first_sync_passes() {
        let gate = SyncGate::new(21_600);
        let now = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        assert!(gate.should_sync(now));
    }

    #[test]
    fn inside_cooldown_blocked() {
        let mut gate = SyncGate::new(21_600);
        let t0 = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        gate.record_sync(t0);
        let t1 = t0 + ChronoDuration::seconds(120);
        assert!(!gate.should_sync(t1));
    }

    #[test]
    fn after_cooldown_passes() {
        let mut gate = SyncGate::new(21_600);
        let t0 = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        gate.record_sync(t0);
        let t_after = t0 + ChronoDuration::seconds(21_600 + 5);
        assert!(gate.should_sync(t_after));
    }

    #[test]
    fn zero_cooldown_never_blocks() {
        let mut gate = SyncGate::new(0);
        let t0 = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        gate.record_sync(t0);
        assert!(gate.should_sync(t0));
    }
}
