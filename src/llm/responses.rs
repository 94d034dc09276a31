//! OpenAI Responses API driver.
//!
//! This module implements the [`LlmDriver`] trait for the OpenAI Responses
//! API (`/v1/responses`) as a single non-streaming call.

use super::{CompletionRequest, LlmDriver, LlmSettings};

/// Driver for the OpenAI Responses API.
#[derive(Clone)]
pub struct ResponsesDriver {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ResponsesDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponsesDriver")
            .field("base_url", &self.settings.base_url)
            .field("provider", &self.settings.provider)
            .finish_non_exhaustive()
    }
}

impl ResponsesDriver {
    /// Create a new Responses driver with the given settings.
    #[must_use]
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            http: super::http_client(),
            settings,
        }
    }
}

#[async_trait::async_trait]
impl LlmDriver for ResponsesDriver {
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<String> {
        let url = self
            .settings
            .provider
            .build_responses_url(&self.settings.base_url);

        let body = serde_json::json!({
            "model": req.model,
            "input": req.messages,
        });

        let mut rb = self.http.post(&url).json(&body);
        if let Some(k) = &self.settings.api_key {
            rb = rb.bearer_auth(k);
        }

        let resp = rb.send().await?.error_for_status()?;
        let v: serde_json::Value = resp.json().await?;
        Ok(output_text(&v))
    }
}

/// Extract the reply text from a Responses API payload.
///
/// Prefers the top-level `output_text` convenience field and otherwise joins
/// every `output_text` content part of every message item.
pub(crate) fn output_text(v: &serde_json::Value) -> String {
    if let Some(text) = v.get("output_text").and_then(|x| x.as_str()) {
        return text.to_string();
    }

    v.get("output")
        .and_then(|x| x.as_array())
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("content").and_then(|c| c.as_array()))
        .flatten()
        .filter(|part| part.get("type").and_then(|t| t.as_str()) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect()
}
