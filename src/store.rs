// src/store.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One delivered announcement. Append-only; never mutated after the
/// confirmation timestamp is written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PostedRecord {
    pub id: String,
    pub title: String,
    pub posted_at: DateTime<Utc>,
}

/// Durable record of everything already posted, kept as a single JSON
/// array on disk (insertion order, oldest first). Loaded wholesale at the
/// start of a cycle, written wholesale on mutation.
#[derive(Debug, Clone)]
pub struct AnnouncementStore {
    path: PathBuf,
}

impl AnnouncementStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the store. A missing file is first-run: an empty valid file is
    /// created and an empty list returned. An unparseable file is reset to
    /// empty (availability over loss-detection); the reset is WARN-logged
    /// so operators see it.
    pub fn load(&self) -> Result<Vec<PostedRecord>> {
        match fs::read_to_string(&self.path) {
            Ok(s) => match serde_json::from_str::<Vec<PostedRecord>>(&s) {
                Ok(records) => Ok(records),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "posted-state file corrupt, resetting to empty"
                    );
                    self.save(&[])?;
                    Ok(Vec::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.save(&[])?;
                Ok(Vec::new())
            }
            Err(e) => {
                // Unreadable but present (permissions, transient mount
                // problem): treat as empty for this cycle, do not rewrite.
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "posted-state file unreadable, treating as empty"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Replace durable state with `records`. Write goes to a sibling tmp
    /// file first and is renamed over the target, so a concurrent `load`
    /// never observes a partial file.
    pub fn save(&self, records: &[PostedRecord]) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("creating state dir {}", dir.display()))?;
            }
        }
        let body = serde_json::to_vec_pretty(records).context("serializing posted state")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &body).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        Ok(())
    }
}

pub fn contains_id(records: &[PostedRecord], id: &str) -> bool {
    records.iter().any(|r| r.id == id)
}
