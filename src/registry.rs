//! Client registry backed by a JSON definitions file.
//!
//! The registry holds an immutable snapshot of every client. A reload parses
//! the whole file into a new snapshot and swaps it in one step, so a request
//! never observes a half-updated client. Failed reloads keep the previous
//! snapshot.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use crate::error::ApiError;

/// Snapshot of all clients keyed by client id.
pub type ClientMap = HashMap<String, Arc<Client>>;

/// One tenant of the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub client_id: String,
    #[serde(default)]
    pub enabled: bool,
    /// Exact origins allowed to call the config and chat endpoints.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Widget UI settings; opaque to the backend and passed through as-is.
    #[serde(default)]
    pub ui: Option<Value>,
    #[serde(default)]
    pub prompt_base: String,
    #[serde(default)]
    pub prompt_client: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub limits: ClientLimits,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientLimits {
    /// Requests per minute.
    pub rpm: Option<u32>,
}

impl Client {
    /// The UI object exposed to the widget, `{}` when none is configured.
    pub fn ui(&self) -> Value {
        self.ui
            .clone()
            .filter(|v| !v.is_null())
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
    }

    /// Base prompt first, then the client fragment, separated by a blank line.
    pub fn system_prompt(&self) -> String {
        format!("{}\n\n{}", self.prompt_base, self.prompt_client)
    }

    pub fn rate_limit(&self, default_rpm: u32) -> u32 {
        self.limits.rpm.unwrap_or(default_rpm)
    }

    pub fn model_or<'a>(&'a self, default_model: &'a str) -> &'a str {
        self.model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(default_model)
    }
}

#[derive(Debug, Deserialize)]
struct ClientsFile {
    #[serde(default)]
    clients: Vec<Client>,
}

/// Errors raised while reading the definitions file.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("registry has no backing file")]
    NoSource,
}

/// Parse a definitions document. Later duplicates of a client id win.
pub fn parse_clients(raw: &str) -> Result<ClientMap, serde_json::Error> {
    let parsed: ClientsFile = serde_json::from_str(raw)?;
    Ok(parsed
        .clients
        .into_iter()
        .map(|c| (c.client_id.clone(), Arc::new(c)))
        .collect())
}

#[derive(Debug)]
pub struct ClientRegistry {
    path: Option<PathBuf>,
    snapshot: RwLock<Arc<ClientMap>>,
}

impl ClientRegistry {
    /// Load the registry from `path`. Failing here is fatal; later reloads are not.
    pub fn load_from_file(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let raw = std::fs::read_to_string(&path).map_err(|source| RegistryError::Io {
            path: path.clone(),
            source,
        })?;
        let map = parse_clients(&raw).map_err(|source| RegistryError::Parse {
            path: path.clone(),
            source,
        })?;
        log_clients(&map);

        Ok(Self {
            path: Some(path),
            snapshot: RwLock::new(Arc::new(map)),
        })
    }

    /// Registry with a fixed set of clients and no file behind it.
    pub fn from_clients(clients: impl IntoIterator<Item = Client>) -> Self {
        let map = clients
            .into_iter()
            .map(|c| (c.client_id.clone(), Arc::new(c)))
            .collect();
        Self {
            path: None,
            snapshot: RwLock::new(Arc::new(map)),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current snapshot. Holding it pins that version for the caller.
    pub fn snapshot(&self) -> Arc<ClientMap> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Resolve an enabled client.
    pub fn lookup(&self, client_id: &str) -> Result<Arc<Client>, ApiError> {
        let client = self
            .snapshot()
            .get(client_id)
            .cloned()
            .ok_or(ApiError::UnknownClient)?;
        if !client.enabled {
            return Err(ApiError::ClientDisabled);
        }
        Ok(client)
    }

    /// Re-read the backing file and swap the snapshot. On error the old snapshot stays.
    pub async fn reload(&self) -> Result<usize, RegistryError> {
        let path = self.path.as_ref().ok_or(RegistryError::NoSource)?;
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| RegistryError::Io {
                path: path.clone(),
                source,
            })?;
        let map = parse_clients(&raw).map_err(|source| RegistryError::Parse {
            path: path.clone(),
            source,
        })?;
        log_clients(&map);

        let count = map.len();
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(map);
        Ok(count)
    }

    /// Poll the backing file's modification time and reload when it changes.
    ///
    /// Runs until the task is dropped. `interval` acts as the debounce window.
    pub async fn watch(self: Arc<Self>, interval: Duration) {
        let Some(path) = self.path.clone() else {
            return;
        };
        tracing::info!(path = %path.display(), interval_ms = interval.as_millis() as u64, "Watching client registry");

        let mut last_seen = modified_at(&path).await;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let current = modified_at(&path).await;
            if current.is_none() || current == last_seen {
                continue;
            }
            last_seen = current;

            match self.reload().await {
                Ok(count) => {
                    tracing::info!(name: "registry.reloaded", clients = count, "Reloaded client registry");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to reload client registry, keeping previous clients");
                }
            }
        }
    }
}

async fn modified_at(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

fn log_clients(map: &ClientMap) {
    for (id, client) in map {
        tracing::debug!(
            client_id = %id,
            enabled = client.enabled,
            allowed_origins = ?client.allowed_origins,
            "Loaded client"
        );
    }
}
