use crate::llm::{LlmProtocol, LlmSettings, Provider};
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Lower bound for the registry reload poll; file-change signals are debounced to at least this.
pub const MIN_RELOAD_INTERVAL_MS: u64 = 500;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Client registry file
    #[arg(long, env = "CLIENTS_FILE")]
    pub clients_file: Option<String>,

    /// Postgres connection string for the lead store
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// API key for the LLM provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the LLM provider
    #[arg(long, env = "LLM_BASE_URL")]
    pub llm_base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub clients: ClientsConfig,
    pub limits: LimitsConfig,
    pub llm: LlmConfig,
    pub leads: LeadsConfig,
    pub usage: UsageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub static_dir: String,
    pub body_limit_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientsConfig {
    pub path: String,
    pub reload_interval_ms: u64,
}

impl ClientsConfig {
    pub fn reload_interval(&self) -> Duration {
        Duration::from_millis(self.reload_interval_ms.max(MIN_RELOAD_INTERVAL_MS))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    pub window_secs: u64,
    pub default_rpm: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub default_model: String,
    pub protocol: LlmProtocol,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LeadsConfig {
    pub database_url: Option<String>,
    pub capture_before_resolve: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UsageConfig {
    pub log_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("server.port", 3001)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.static_dir", "public")?
            .set_default("server.body_limit_bytes", 50 * 1024)?
            .set_default("clients.path", "clients.json")?
            .set_default("clients.reload_interval_ms", 500)?
            .set_default("limits.window_secs", 60)?
            .set_default("limits.default_rpm", 30)?
            .set_default("llm.base_url", "https://api.openai.com")?
            .set_default("llm.default_model", "gpt-4.1-mini")?
            .set_default("llm.protocol", "auto")?
            .set_default("llm.timeout_secs", 30)?
            .set_default("leads.capture_before_resolve", false)?
            .set_default("usage.log_path", "usage.log")?
            .set_default("logging.format", "compact")?;

        // 2. Config file: explicit path must exist, ./gateway.{yaml,json,toml} is optional
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path).required(true)),
            None => builder.add_source(File::with_name("gateway").required(false)),
        };

        // 3. Environment variables prefixed with GATEWAY_, e.g. GATEWAY_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("GATEWAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI flags and their well-known env vars win over everything else
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(path) = cli.clients_file {
            builder = builder.set_override("clients.path", path)?;
        }
        if let Some(url) = cli.database_url.filter(|s| !s.trim().is_empty()) {
            builder = builder.set_override("leads.database_url", url)?;
        }
        if let Some(key) = cli.api_key.filter(|s| !s.trim().is_empty()) {
            builder = builder.set_override("llm.api_key", key)?;
        }
        if let Some(url) = cli.llm_base_url {
            builder = builder.set_override("llm.base_url", url)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.limits.window_secs == 0 {
            return Err(config::ConfigError::Message(
                "limits.window_secs must be greater than zero".to_string(),
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "llm.timeout_secs must be greater than zero".to_string(),
            ));
        }
        url::Url::parse(&self.llm.base_url).map_err(|e| {
            config::ConfigError::Message(format!("llm.base_url is not a valid URL: {e}"))
        })?;
        if self.llm.default_model.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "llm.default_model cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.limits.window_secs)
    }

    /// Resolve the LLM connection settings, picking a concrete protocol for `auto`.
    pub fn llm_settings(&self) -> LlmSettings {
        let provider = Provider::detect_from_url(&self.llm.base_url);
        let protocol = match self.llm.protocol {
            LlmProtocol::Auto if provider == Provider::OpenAI => LlmProtocol::Responses,
            LlmProtocol::Auto => LlmProtocol::Chat,
            other => other,
        };

        LlmSettings {
            base_url: self.llm.base_url.clone(),
            api_key: self
                .llm
                .api_key
                .clone()
                .filter(|s| !s.trim().is_empty()),
            default_model: self.llm.default_model.clone(),
            protocol,
            provider,
            timeout: Duration::from_secs(self.llm.timeout_secs),
        }
    }
}
