#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chat_widget_gateway::{
    AppState,
    config::{
        AppConfig, ClientsConfig, LeadsConfig, LimitsConfig, LlmConfig, LogFormat, LoggingConfig,
        ServerConfig, UsageConfig,
    },
    leads::{LeadRecord, LeadSink},
    llm::{CompletionRequest, LlmDriver, LlmProtocol},
    pipeline::{ChatPipeline, PipelineSettings},
    rate_limit::FixedWindowLimiter,
    registry::{Client, ClientRegistry},
    server,
    usage::{UsageEntry, UsageSink},
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const ORIGIN: &str = "https://example.com";

#[derive(Debug, Clone)]
pub enum LlmBehavior {
    Reply(String),
    Fail,
    Hang,
}

/// Scripted LLM that records every request it sees.
#[derive(Debug)]
pub struct FakeLlm {
    pub calls: Mutex<Vec<CompletionRequest>>,
    behavior: LlmBehavior,
}

impl FakeLlm {
    pub fn new(behavior: LlmBehavior) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            behavior,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmDriver for FakeLlm {
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push(req);
        match &self.behavior {
            LlmBehavior::Reply(text) => Ok(text.clone()),
            LlmBehavior::Fail => Err(anyhow::anyhow!("upstream returned 502 Bad Gateway")),
            LlmBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingLeads {
    pub rows: Mutex<Vec<LeadRecord>>,
}

#[async_trait]
impl LeadSink for RecordingLeads {
    async fn record(&self, lead: &LeadRecord) -> anyhow::Result<()> {
        self.rows.lock().unwrap().push(lead.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FailingLeads;

#[async_trait]
impl LeadSink for FailingLeads {
    async fn record(&self, _lead: &LeadRecord) -> anyhow::Result<()> {
        anyhow::bail!("connection to lead store lost")
    }
}

#[derive(Debug, Default)]
pub struct RecordingUsage {
    pub entries: Mutex<Vec<UsageEntry>>,
}

#[async_trait]
impl UsageSink for RecordingUsage {
    async fn append(&self, entry: &UsageEntry) -> anyhow::Result<()> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
            static_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/public").to_string(),
            body_limit_bytes: 50 * 1024,
        },
        clients: ClientsConfig {
            path: "clients.json".to_string(),
            reload_interval_ms: 500,
        },
        limits: LimitsConfig {
            window_secs: 60,
            default_rpm: 30,
        },
        llm: LlmConfig {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            default_model: "gpt-4.1-mini".to_string(),
            protocol: LlmProtocol::Auto,
            timeout_secs: 5,
        },
        leads: LeadsConfig {
            database_url: None,
            capture_before_resolve: false,
        },
        usage: UsageConfig {
            log_path: "usage.log".to_string(),
        },
        logging: LoggingConfig {
            format: LogFormat::Compact,
        },
    }
}

/// `demo` (rpm 2), `disabled`, and `nomodel` (falls back to the default model).
pub fn test_clients() -> Vec<Client> {
    serde_json::from_value(json!([
        {
            "clientId": "demo",
            "enabled": true,
            "allowedOrigins": [ORIGIN],
            "ui": { "title": "Demo", "subtitle": "We reply fast", "accent": "#0b5fff", "accentText": "#fff" },
            "promptBase": "You are a website assistant.",
            "promptClient": "You work for Demo Plumbing.",
            "model": "gpt-4o-mini",
            "limits": { "rpm": 2 }
        },
        {
            "clientId": "disabled",
            "enabled": false,
            "allowedOrigins": [ORIGIN],
            "ui": { "title": "Off" }
        },
        {
            "clientId": "nomodel",
            "enabled": true,
            "allowedOrigins": [ORIGIN],
            "promptBase": "Base.",
            "promptClient": "Client."
        }
    ]))
    .unwrap()
}

pub struct Harness {
    pub app: Router,
    pub state: AppState,
    pub llm: Arc<FakeLlm>,
    pub leads: Arc<RecordingLeads>,
    pub usage: Arc<RecordingUsage>,
}

impl Harness {
    pub fn new(behavior: LlmBehavior) -> Self {
        Self::build(
            Arc::new(ClientRegistry::from_clients(test_clients())),
            test_config(),
            behavior,
            None,
        )
    }

    pub fn build(
        registry: Arc<ClientRegistry>,
        config: AppConfig,
        behavior: LlmBehavior,
        lead_sink: Option<Arc<dyn LeadSink>>,
    ) -> Self {
        let llm = Arc::new(FakeLlm::new(behavior));
        let leads = Arc::new(RecordingLeads::default());
        let usage = Arc::new(RecordingUsage::default());

        let lead_sink: Arc<dyn LeadSink> = match lead_sink {
            Some(sink) => sink,
            None => leads.clone(),
        };
        let pipeline = Arc::new(ChatPipeline::new(
            Arc::clone(&registry),
            Arc::new(FixedWindowLimiter::new(config.rate_window())),
            llm.clone(),
            lead_sink,
            usage.clone(),
            PipelineSettings {
                default_model: config.llm.default_model.clone(),
                default_rpm: config.limits.default_rpm,
                llm_timeout: Duration::from_secs(config.llm.timeout_secs),
                capture_before_resolve: config.leads.capture_before_resolve,
            },
        ));

        let state = AppState {
            registry,
            pipeline,
            config: Arc::new(config),
        };

        Self {
            app: server::router(state.clone()),
            state,
            llm,
            leads,
            usage,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    pub async fn chat(&self, body: Value, origin: Option<&str>) -> (StatusCode, Value) {
        let out = self.send(chat_request(&body, origin)).await;
        self.state.pipeline.flush().await;
        out
    }

    pub async fn client_config(&self, client_id: &str, origin: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(format!("/client-config?clientId={client_id}"));
        if let Some(o) = origin {
            builder = builder.header(header::ORIGIN, o);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub fn lead_rows(&self) -> Vec<LeadRecord> {
        self.leads.rows.lock().unwrap().clone()
    }

    pub fn usage_entries(&self) -> Vec<UsageEntry> {
        self.usage.entries.lock().unwrap().clone()
    }
}

pub fn chat_request(body: &Value, origin: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(o) = origin {
        builder = builder.header(header::ORIGIN, o);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}
