//! Per-client origin allow-listing.
//!
//! Applied identically to the config and chat endpoints so a client's UI
//! config cannot be fetched from a site it has not approved.

use crate::registry::Client;

/// Why an origin was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OriginRejection {
    #[error("Missing Origin")]
    MissingOrigin,
    #[error("Origin not allowed: {0}")]
    OriginNotAllowed(String),
}

/// Admit iff `origin` is non-empty and listed verbatim in the client's allow-list.
pub fn check(origin: Option<&str>, client: &Client) -> Result<(), OriginRejection> {
    let origin = match origin {
        Some(o) if !o.is_empty() => o,
        _ => return Err(OriginRejection::MissingOrigin),
    };

    if client.allowed_origins.iter().any(|allowed| allowed == origin) {
        Ok(())
    } else {
        Err(OriginRejection::OriginNotAllowed(origin.to_string()))
    }
}
