//! JsonlUsageStore - file-backed event storage
//!
//! Alternate backend writing one JSON object per line into per-user monthly
//! files (`{user_id}_{year}-{month}.jsonl`). Selected by configuration for
//! deployments without a database; also convenient in tests.

use super::query::EventQuery;
use super::traits::UsageStore;
use crate::error::{Error, Result};
use crate::event::UsageEvent;
use chrono::Datelike;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

/// Usage event store backed by JSONL files
#[derive(Debug, Clone)]
pub struct JsonlUsageStore {
    dir: PathBuf,
}

impl JsonlUsageStore {
    /// Create a store over a log directory without touching the filesystem
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create a store and ensure the log directory exists
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(dir);
        tokio::fs::create_dir_all(&store.dir)
            .await
            .map_err(|e| Error::Io(e.to_string()))?;
        debug!("JSONL usage store initialized at {}", store.dir.display());
        Ok(store)
    }

    /// The directory holding the log files
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // Month is deliberately unpadded ("2026-8"), matching the historical
    // file naming so existing logs stay readable.
    fn file_for(&self, event: &UsageEvent) -> PathBuf {
        self.dir.join(format!(
            "{}_{}-{}.jsonl",
            event.user_id,
            event.recorded_at.year(),
            event.recorded_at.month()
        ))
    }
}

#[async_trait::async_trait]
impl UsageStore for JsonlUsageStore {
    #[instrument(skip(self, event), fields(event_id = %event.id, user_id = %event.user_id))]
    async fn append(&self, event: &UsageEvent) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Io(e.to_string()))?;

        let mut line =
            serde_json::to_string(event).map_err(|e| Error::Serialization(e.to_string()))?;
        line.push('\n');

        let path = self.file_for(event);
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .await
            .map_err(|e| Error::Io(e.to_string()))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| Error::Io(e.to_string()))?;

        debug!("recorded {} event for user {}", event.kind(), event.user_id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn query(&self, query: &EventQuery) -> Result<Vec<UsageEvent>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            // No directory yet means no events yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e.to_string())),
        };

        let prefix = format!("{}_", query.user_id);
        let mut events = Vec::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::Io(e.to_string()))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(&prefix) || !name.ends_with(".jsonl") {
                continue;
            }

            let content = tokio::fs::read_to_string(entry.path())
                .await
                .map_err(|e| Error::Io(e.to_string()))?;

            for line in content.lines().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<UsageEvent>(line) {
                    Ok(event) if query.matches(&event) => events.push(event),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(file = %name, error = %e, "skipping malformed usage log line");
                    }
                }
            }
        }

        Ok(events)
    }

    async fn health_check(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Io(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}
