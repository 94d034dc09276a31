//! Chat Widget Gateway
//!
//! A small multi-tenant HTTP backend that proxies chat messages from an
//! embeddable website widget to an LLM, serves per-client UI config, gates
//! requests by origin and rate, and captures leads from inbound messages.
//!
//! # Architecture
//!
//! - **Server**: Axum router with the health, config, chat, and widget routes
//! - **Pipeline**: per-request admission (client → origin → rate → LLM → logs)
//! - **Registry**: hot-reloaded client definitions with atomic snapshot swaps
//!
//! # Modules
//!
//! - [`registry`]: client definitions and reload
//! - [`origin`]: origin allow-list guard
//! - [`rate_limit`]: fixed-window per-client limiter
//! - [`leads`]: lead extraction and the lead store
//! - [`usage`]: JSON-lines usage log
//! - [`llm`]: LLM drivers
//! - [`pipeline`]: the `/chat` state machine

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]

pub mod config;
pub mod error;
pub mod leads;
pub mod llm;
pub mod origin;
pub mod pipeline;
pub mod rate_limit;
pub mod registry;
pub mod server;
pub mod telemetry;
pub mod usage;

use crate::config::AppConfig;
use crate::pipeline::ChatPipeline;
use crate::registry::ClientRegistry;
use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Client definitions, swapped wholesale on reload.
    pub registry: Arc<ClientRegistry>,
    /// Chat admission pipeline (owns the limiter and the sinks).
    pub pipeline: Arc<ChatPipeline>,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}
