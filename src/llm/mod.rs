//! LLM driver traits and implementations.
//!
//! The gateway treats the model provider as an opaque call: a system prompt
//! and a user message go in, reply text comes out. Two wire protocols are
//! supported, both `OpenAI`-shaped.
//!
//! # Drivers
//!
//! - [`ResponsesDriver`]: `OpenAI` Responses API (`/v1/responses`)
//! - [`ChatCompletionsDriver`]: `OpenAI` Chat Completions API (`/v1/chat/completions`)
//!
//! # Example
//!
//! ```rust,ignore
//! use chat_widget_gateway::llm::{driver_for, CompletionRequest};
//!
//! let driver = driver_for(settings);
//! let reply = driver.complete(CompletionRequest::new("gpt-4.1-mini", "Be brief.", "Hi")).await?;
//! ```

pub mod chat_completions;
pub mod provider;
pub mod responses;

pub use chat_completions::ChatCompletionsDriver;
pub use provider::Provider;
pub use responses::ResponsesDriver;

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// LLM connection and model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// Optional API key for authentication.
    pub api_key: Option<String>,
    /// Model used when a client does not name one.
    pub default_model: String,
    /// Protocol to use for communication. Never `Auto` once resolved.
    pub protocol: LlmProtocol,
    /// Provider type (auto-detected from `base_url`).
    pub provider: Provider,
    /// Upper bound on a single completion call.
    pub timeout: Duration,
}

/// LLM protocol variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProtocol {
    /// Responses for `OpenAI` hosts, Chat Completions elsewhere.
    #[default]
    Auto,
    /// `OpenAI` Responses API (`/v1/responses`).
    Responses,
    /// `OpenAI` Chat Completions API (`/v1/chat/completions`).
    Chat,
}

/// A message in the prompt sent upstream.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Message {
    /// Role of the message author.
    pub role: MessageRole,
    /// Text content.
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System prompt.
    System,
    /// User message.
    User,
}

/// A single non-streaming completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier for this call.
    pub model: String,
    /// Ordered prompt messages (system first).
    pub messages: Vec<Message>,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(model: impl Into<String>, system: &str, user: &str) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::system(system), Message::user(user)],
        }
    }
}

/// Trait for LLM completion drivers.
///
/// Implementations return the model's reply text verbatim; an absent reply
/// is an empty string, not an error.
#[async_trait::async_trait]
pub trait LlmDriver: Send + Sync + std::fmt::Debug {
    /// Run one completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the provider answers with a
    /// non-success status.
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<String>;
}

/// Build the driver matching the resolved protocol.
pub fn driver_for(settings: LlmSettings) -> Arc<dyn LlmDriver> {
    match settings.protocol {
        LlmProtocol::Responses => Arc::new(ResponsesDriver::new(settings)),
        LlmProtocol::Chat | LlmProtocol::Auto => Arc::new(ChatCompletionsDriver::new(settings)),
    }
}

/// Shared `reqwest` client; the pipeline enforces its own deadline so none is set here.
fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("chat-widget-gateway/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}
