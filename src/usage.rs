//! Append-only usage log, one JSON object per line.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEntry {
    pub ts: DateTime<Utc>,
    pub client_id: String,
    pub origin: Option<String>,
    /// Wall time spent handling the request, in milliseconds.
    pub ms: u64,
    pub msg_chars: usize,
    pub reply_chars: usize,
}

#[async_trait]
pub trait UsageSink: Send + Sync + std::fmt::Debug {
    async fn append(&self, entry: &UsageEntry) -> Result<()>;
}

/// Writes entries to a JSON-lines file, creating it on first use.
#[derive(Debug, Clone)]
pub struct JsonLinesUsageLog {
    path: PathBuf,
}

impl JsonLinesUsageLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl UsageSink for JsonLinesUsageLog {
    async fn append(&self, entry: &UsageEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        // Single write per line so concurrent appends do not interleave.
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
