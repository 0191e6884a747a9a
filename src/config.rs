// src/config.rs
use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::backup::{GitHubBackup, SyncGate};
use crate::feed::{bridge::JsonBridgeSource, rss::RssFeedSource, FeedSource};
use crate::notify::{webhook::HttpWebhookTransport, Dispatcher, Target};
use crate::relay::Relay;
use crate::store::AnnouncementStore;

const ENV_TARGETS_PATH: &str = "TARGETS_PATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    Rss,
    Bridge,
}

#[derive(Debug, Clone)]
pub struct RelayCfg {
    pub feed_url: String,
    pub feed_mode: FeedMode,
    pub store_path: PathBuf,
    pub interval_secs: u64,
    pub backup_cooldown_secs: i64,
    pub announcement_pause_ms: u64,
    pub target_pause_ms: u64,
    pub port: u16,
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl RelayCfg {
    pub fn from_env() -> Result<Self> {
        let feed_url = std::env::var("FEED_URL")
            .map_err(|_| anyhow!("FEED_URL is required (the announcement feed to poll)"))?;

        let feed_mode = match std::env::var("FEED_MODE")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "" | "rss" => FeedMode::Rss,
            "bridge" => FeedMode::Bridge,
            other => bail!("FEED_MODE must be 'rss' or 'bridge', got '{other}'"),
        };

        Ok(Self {
            feed_url,
            feed_mode,
            store_path: std::env::var("STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("state/posted.json")),
            interval_secs: env_parse("CHECK_INTERVAL_SECS", 300),
            backup_cooldown_secs: env_parse("BACKUP_COOLDOWN_SECS", 21_600),
            announcement_pause_ms: env_parse("ANNOUNCEMENT_PAUSE_MS", 1_000),
            target_pause_ms: env_parse("TARGET_PAUSE_MS", 750),
            port: env_parse("PORT", 8000),
        })
    }
}

/// Load delivery targets from an explicit path. Supports TOML or JSON.
pub fn load_targets_from(path: &Path) -> Result<Vec<Target>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading targets from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_targets(&content, ext.as_str())
}

/// Load delivery targets using env var + fallbacks:
/// 1) $TARGETS_PATH
/// 2) config/targets.toml
/// 3) config/targets.json
/// 4) single target from $WEBHOOK_URL
pub fn load_targets_default() -> Result<Vec<Target>> {
    if let Ok(p) = std::env::var(ENV_TARGETS_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_targets_from(&pb);
        } else {
            return Err(anyhow!("TARGETS_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/targets.toml");
    if toml_p.exists() {
        return load_targets_from(&toml_p);
    }
    let json_p = PathBuf::from("config/targets.json");
    if json_p.exists() {
        return load_targets_from(&json_p);
    }
    if let Ok(url) = std::env::var("WEBHOOK_URL") {
        return Ok(vec![Target {
            name: "default".to_string(),
            endpoint: url,
        }]);
    }
    Ok(Vec::new())
}

fn parse_targets(s: &str, hint_ext: &str) -> Result<Vec<Target>> {
    let try_toml = hint_ext == "toml" || s.contains("[[targets]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported targets format"))
}

fn parse_toml(s: &str) -> Result<Vec<Target>> {
    #[derive(serde::Deserialize)]
    struct TomlTargets {
        targets: Vec<Target>,
    }
    let v: TomlTargets = toml::from_str(s)?;
    Ok(clean_targets(v.targets))
}

fn parse_json(s: &str) -> Result<Vec<Target>> {
    let v: Vec<Target> = serde_json::from_str(s)?;
    Ok(clean_targets(v))
}

/// Trim, drop incomplete entries, dedup by name. Order is preserved;
/// it is the delivery order.
fn clean_targets(items: Vec<Target>) -> Vec<Target> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for t in items {
        let name = t.name.trim().to_string();
        let endpoint = t.endpoint.trim().to_string();
        if name.is_empty() || endpoint.is_empty() {
            continue;
        }
        if seen.insert(name.clone()) {
            out.push(Target { name, endpoint });
        }
    }
    out
}

/// Wire the concrete capabilities into a relay. Used by both binaries.
pub fn build_relay(cfg: &RelayCfg) -> Result<Relay> {
    let targets = load_targets_default().context("loading delivery targets")?;
    if targets.is_empty() {
        bail!("no delivery targets configured (TARGETS_PATH, config/targets.*, or WEBHOOK_URL)");
    }

    let feed: Box<dyn FeedSource> = match cfg.feed_mode {
        FeedMode::Rss => Box::new(RssFeedSource::from_url(cfg.feed_url.clone())),
        FeedMode::Bridge => Box::new(JsonBridgeSource::from_url(cfg.feed_url.clone())),
    };

    let dispatcher = Dispatcher::new(Box::new(HttpWebhookTransport::new()))
        .with_target_pause(Duration::from_millis(cfg.target_pause_ms));

    let relay = Relay::new(
        feed,
        dispatcher,
        AnnouncementStore::new(cfg.store_path.clone()),
        targets,
        Box::new(GitHubBackup::from_env()),
        SyncGate::new(cfg.backup_cooldown_secs),
    )
    .with_announcement_pause(Duration::from_millis(cfg.announcement_pause_ms));

    Ok(relay)
}
