use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Query, State, rejection::JsonRejection},
    http::{HeaderMap, header},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use tracing::info;

use crate::AppState;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::leads::{LeadSink, LogOnlyLeadSink, PostgresLeadSink};
use crate::llm;
use crate::origin;
use crate::pipeline::{ChatPipeline, ChatRequest, PipelineSettings};
use crate::rate_limit::FixedWindowLimiter;
use crate::registry::ClientRegistry;
use crate::usage::JsonLinesUsageLog;

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let settings = config.llm_settings();
    info!(
        name: "llm.config.loaded",
        base_url = %settings.base_url,
        default_model = %settings.default_model,
        protocol = ?settings.protocol,
        timeout_secs = settings.timeout.as_secs(),
        "LLM configuration loaded"
    );
    if settings.api_key.is_none() {
        tracing::warn!("No LLM API key configured; upstream calls will be unauthenticated");
    }

    let registry = Arc::new(ClientRegistry::load_from_file(&config.clients.path)?);
    info!(
        name: "registry.loaded",
        path = %config.clients.path,
        clients = registry.len(),
        "Client registry loaded"
    );

    let leads: Arc<dyn LeadSink> = match &config.leads.database_url {
        Some(url) => match PostgresLeadSink::new(url).await {
            Ok(sink) => {
                info!("Lead store connected");
                Arc::new(sink)
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to connect lead store, leads will only be logged");
                Arc::new(LogOnlyLeadSink)
            }
        },
        None => {
            info!("No lead database configured, leads will only be logged");
            Arc::new(LogOnlyLeadSink)
        }
    };

    let limiter = Arc::new(FixedWindowLimiter::new(config.rate_window()));
    let pipeline = Arc::new(ChatPipeline::new(
        Arc::clone(&registry),
        Arc::clone(&limiter),
        llm::driver_for(settings.clone()),
        leads,
        Arc::new(JsonLinesUsageLog::new(&config.usage.log_path)),
        PipelineSettings {
            default_model: settings.default_model.clone(),
            default_rpm: config.limits.default_rpm,
            llm_timeout: settings.timeout,
            capture_before_resolve: config.leads.capture_before_resolve,
        },
    ));

    let state = AppState {
        registry: Arc::clone(&registry),
        pipeline: Arc::clone(&pipeline),
        config: Arc::clone(&config),
    };

    // Background: registry hot reload and stale bucket cleanup
    let watcher = tokio::spawn(Arc::clone(&registry).watch(config.clients.reload_interval()));
    let pruner = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(limiter.window());
        loop {
            ticker.tick().await;
            limiter.prune();
        }
    });

    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    watcher.abort();
    pruner.abort();
    pipeline.flush().await;
    info!(name: "server.stopped", "Server stopped");
    Ok(())
}

/// Build the HTTP router. Split out so tests can drive it in-process.
pub fn router(state: AppState) -> Router {
    let static_dir = PathBuf::from(&state.config.server.static_dir);
    let body_limit = state.config.server.body_limit_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/client-config", get(client_config))
        .route("/chat", post(chat))
        .route_service("/widget.js", ServeFile::new(static_dir.join("widget.js")))
        .fallback_service(ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        // Origin policy is enforced per route; CORS itself stays open so the
        // widget can read error bodies from any site.
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

fn declared_origin(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::ORIGIN).and_then(|v| v.to_str().ok())
}

/// GET /health - Liveness probe.
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Query parameters for the config endpoint.
#[derive(Debug, Deserialize)]
struct ClientConfigQuery {
    #[serde(rename = "clientId")]
    client_id: Option<String>,
}

/// GET /client-config - Widget UI settings for an approved origin. Never
/// returns prompts, model, or limits.
async fn client_config(
    State(state): State<AppState>,
    Query(query): Query<ClientConfigQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let client_id = query
        .client_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("clientId required".to_string()))?;

    let client = state.registry.lookup(&client_id)?;
    origin::check(declared_origin(&headers), &client)?;

    Ok(Json(json!({ "ui": client.ui() })))
}

/// Request body for chat API.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatBody {
    /// Kept raw like `message`; the pipeline decides what a usable id is.
    #[serde(default)]
    client_id: Option<Value>,
    /// Kept raw so a non-string message is a validation error, not a parse error.
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    page_url: Option<String>,
}

/// Response from chat API.
#[derive(Debug, Serialize)]
struct ChatResponse {
    reply: String,
}

/// POST /chat - Run one message through the admission pipeline.
async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected chat body");
        ApiError::BadRequest("invalid JSON body".to_string())
    })?;

    let reply = state
        .pipeline
        .handle(ChatRequest {
            client_id: body.client_id,
            message: body.message,
            origin: declared_origin(&headers).map(ToString::to_string),
            page_url: body.page_url,
        })
        .await?;

    Ok(Json(ChatResponse { reply: reply.reply }))
}
