//! Request-level error taxonomy and its HTTP mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::origin::OriginRejection;

/// Errors that terminate a request. Every variant renders as `{ "error": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or invalid input.
    #[error("{0}")]
    BadRequest(String),

    /// The client id is not in the registry.
    #[error("Unknown client")]
    UnknownClient,

    /// The client exists but is switched off.
    #[error("Client disabled")]
    ClientDisabled,

    /// The declared origin was rejected for this client.
    #[error(transparent)]
    Origin(#[from] OriginRejection),

    /// The client's fixed-window budget is spent.
    #[error("Rate limit exceeded. Please try again soon.")]
    RateLimited,

    /// The LLM did not answer within the configured deadline.
    #[error("Upstream timeout")]
    UpstreamTimeout,

    /// LLM or other unexpected failure. Detail stays server-side.
    #[error("Server error")]
    Upstream(#[source] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnknownClient => StatusCode::NOT_FOUND,
            Self::ClientDisabled | Self::Origin(_) => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Upstream(e) => tracing::error!(error = ?e, "Request failed"),
            Self::UpstreamTimeout => tracing::warn!("LLM call timed out"),
            other => tracing::debug!(error = %other, "Request rejected"),
        }

        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
