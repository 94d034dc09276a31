//! Opportunistic lead capture.
//!
//! - [`extract`]: regex signals (email, phone, intent) over message text
//! - [`postgres`]: append-only Postgres sink for [`LeadRecord`]s

pub mod extract;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub use extract::{LeadSignals, extract};
pub use postgres::PostgresLeadSink;

/// One captured lead row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRecord {
    pub client_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub message: String,
    pub page_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LeadRecord {
    /// Build a record when the message qualifies as a lead.
    pub fn from_message(client_id: &str, message: &str, page_url: Option<&str>) -> Option<Self> {
        let signals = extract(message);
        if !signals.qualifies() {
            return None;
        }
        Some(Self {
            client_id: client_id.to_string(),
            email: signals.email,
            phone: signals.phone,
            message: message.to_string(),
            page_url: page_url.map(ToString::to_string),
            created_at: Utc::now(),
        })
    }
}

/// Append-only destination for leads. Writes may arrive concurrently and unordered.
#[async_trait]
pub trait LeadSink: Send + Sync + std::fmt::Debug {
    async fn record(&self, lead: &LeadRecord) -> Result<()>;
}

/// Sink used when no lead database is configured; leads only reach the log.
#[derive(Debug, Default)]
pub struct LogOnlyLeadSink;

#[async_trait]
impl LeadSink for LogOnlyLeadSink {
    async fn record(&self, lead: &LeadRecord) -> Result<()> {
        tracing::info!(
            client_id = %lead.client_id,
            has_email = lead.email.is_some(),
            has_phone = lead.phone.is_some(),
            page_url = ?lead.page_url,
            "Lead captured (no lead store configured)"
        );
        Ok(())
    }
}
