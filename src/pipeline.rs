//! Request-admission pipeline for `/chat`.
//!
//! Each request walks the gates in order and leaves at the first rejection:
//!
//! 1. parse client id and message
//! 2. lead check (regex extraction, best-effort write)
//! 3. resolve the client (unknown → 404, disabled → 403)
//! 4. origin guard (403)
//! 5. rate limiter (429)
//! 6. validate the message (400)
//! 7. call the LLM with the client's system prompt
//! 8. append a usage entry, fire-and-forget
//!
//! Lead and usage writes run on background tasks; their failures are logged
//! and never reach the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::error::ApiError;
use crate::leads::{LeadRecord, LeadSink};
use crate::llm::{CompletionRequest, LlmDriver};
use crate::origin;
use crate::rate_limit::FixedWindowLimiter;
use crate::registry::ClientRegistry;
use crate::usage::{UsageEntry, UsageSink};

/// Inbound chat call as seen by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Raw JSON value; strings and numbers are looked up, anything else is unknown.
    pub client_id: Option<Value>,
    /// Raw JSON value; anything but a non-empty string fails validation.
    pub message: Option<Value>,
    /// Declared `Origin` header.
    pub origin: Option<String>,
    pub page_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub reply: String,
}

/// Tunables that do not live on individual clients.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub default_model: String,
    pub default_rpm: u32,
    pub llm_timeout: Duration,
    /// Write leads before the client is resolved, so unknown or disabled
    /// clients can still produce lead rows.
    pub capture_before_resolve: bool,
}

#[derive(Clone)]
pub struct ChatPipeline {
    registry: Arc<ClientRegistry>,
    limiter: Arc<FixedWindowLimiter>,
    llm: Arc<dyn LlmDriver>,
    leads: Arc<dyn LeadSink>,
    usage: Arc<dyn UsageSink>,
    settings: PipelineSettings,
    background: TaskTracker,
}

impl std::fmt::Debug for ChatPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatPipeline")
            .field("settings", &self.settings)
            .field("llm", &self.llm)
            .field("background_tasks", &self.background.len())
            .finish_non_exhaustive()
    }
}

impl ChatPipeline {
    pub fn new(
        registry: Arc<ClientRegistry>,
        limiter: Arc<FixedWindowLimiter>,
        llm: Arc<dyn LlmDriver>,
        leads: Arc<dyn LeadSink>,
        usage: Arc<dyn UsageSink>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            registry,
            limiter,
            llm,
            leads,
            usage,
            settings,
            background: TaskTracker::new(),
        }
    }

    pub async fn handle(&self, req: ChatRequest) -> Result<ChatReply, ApiError> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();

        // Received
        let client_id = client_key(req.client_id.as_ref());
        let client_id = client_id.as_deref();
        let message = req.message.as_ref().and_then(Value::as_str);

        tracing::debug!(
            request_id = %request_id,
            client_id = ?client_id,
            origin = ?req.origin,
            "Received chat request"
        );

        // LeadCheck
        let mut lead = client_id
            .zip(message)
            .and_then(|(id, msg)| LeadRecord::from_message(id, msg, req.page_url.as_deref()));
        if self.settings.capture_before_resolve
            && let Some(lead) = lead.take()
        {
            self.spawn_lead(lead);
        }

        // ClientResolved
        let client = match client_id {
            Some(id) => self.registry.lookup(id)?,
            None if has_client_id(req.client_id.as_ref()) => return Err(ApiError::UnknownClient),
            None => return Err(ApiError::BadRequest("clientId required".to_string())),
        };
        if let Some(lead) = lead {
            self.spawn_lead(lead);
        }

        // OriginChecked
        origin::check(req.origin.as_deref(), &client)?;

        // RateChecked
        if !self
            .limiter
            .check(&client.client_id, client.rate_limit(self.settings.default_rpm))
        {
            tracing::info!(request_id = %request_id, client_id = %client.client_id, "Rate limit exceeded");
            return Err(ApiError::RateLimited);
        }

        // Validated
        let message = message
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ApiError::BadRequest("message required".to_string()))?;

        // LLMInvoked
        let model = client.model_or(&self.settings.default_model);
        let request = CompletionRequest::new(model, &client.system_prompt(), message);
        tracing::debug!(request_id = %request_id, model = %model, "Calling LLM");

        let reply = match tokio::time::timeout(self.settings.llm_timeout, self.llm.complete(request))
            .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                return Err(ApiError::Upstream(e.context(format!(
                    "LLM call failed for client {} (request {request_id})",
                    client.client_id
                ))));
            }
            Err(_) => return Err(ApiError::UpstreamTimeout),
        };

        // Logged
        let elapsed = started.elapsed();
        self.spawn_usage(UsageEntry {
            ts: chrono::Utc::now(),
            client_id: client.client_id.clone(),
            origin: req.origin.clone(),
            ms: elapsed.as_millis() as u64,
            msg_chars: message.chars().count(),
            reply_chars: reply.chars().count(),
        });

        tracing::info!(
            request_id = %request_id,
            client_id = %client.client_id,
            elapsed_ms = elapsed.as_millis() as u64,
            reply_length = reply.len(),
            "Chat request completed"
        );

        // Responded
        Ok(ChatReply { reply })
    }

    /// Wait for every in-flight lead and usage write to finish.
    pub async fn flush(&self) {
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }

    fn spawn_lead(&self, lead: LeadRecord) {
        let sink = Arc::clone(&self.leads);
        self.background.spawn(async move {
            if let Err(e) = sink.record(&lead).await {
                tracing::warn!(client_id = %lead.client_id, error = %e, "Failed to record lead");
            }
        });
    }

    fn spawn_usage(&self, entry: UsageEntry) {
        let sink = Arc::clone(&self.usage);
        self.background.spawn(async move {
            if let Err(e) = sink.append(&entry).await {
                tracing::warn!(client_id = %entry.client_id, error = %e, "Failed to write usage log");
            }
        });
    }
}

/// Registry key for a raw `clientId`. Numbers are matched by their decimal text.
fn client_key(raw: Option<&Value>) -> Option<String> {
    match raw? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Whether the caller sent something in `clientId` at all.
fn has_client_id(raw: Option<&Value>) -> bool {
    match raw {
        None | Some(Value::Null) => false,
        Some(Value::String(id)) => !id.is_empty(),
        Some(_) => true,
    }
}
