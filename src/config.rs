//! Configuration management for bq-insight.
//!
//! Handles loading configuration from TOML files and environment variables.
//! Precedence is CLI flags, then the config file, then environment
//! variables, then built-in defaults.

use crate::error::{InsightError, Result};
use crate::llm::LlmProvider;
use crate::pipeline::PipelineMode;
use crate::warehouse::WarehouseBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default model, matching the model selector the service has always shipped with.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

/// Main configuration structure for bq-insight.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Warehouse (BigQuery) settings.
    #[serde(default)]
    pub warehouse: WarehouseConfig,

    /// LLM provider configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Pipeline behavior.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: Option<String>,

    /// Port to bind.
    pub port: Option<u16>,

    /// Deadline for a whole `/analyze` request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum accepted request body size.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            request_timeout_secs: default_request_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Returns the `host:port` pair to bind.
    pub fn bind_address(&self) -> String {
        let host = self.host.as_deref().unwrap_or(DEFAULT_HOST);
        let port = self.port.unwrap_or(DEFAULT_PORT);
        format!("{host}:{port}")
    }
}

/// Warehouse configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Which warehouse client to use.
    #[serde(default)]
    pub backend: WarehouseBackend,

    /// GCP project that runs (and is billed for) the query jobs.
    pub project_id: Option<String>,

    /// Path to a service-account key file.
    pub credentials_path: Option<PathBuf>,

    /// Pre-minted OAuth access token (alternative to a key file).
    pub access_token: Option<String>,

    /// Dataset location (e.g. "US", "EU").
    pub location: Option<String>,

    /// How long to wait for a query job to complete.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,

    /// Upper bound on warehouse queries in flight across all requests.
    pub max_concurrent_queries: Option<usize>,

    /// Override for the BigQuery REST endpoint.
    pub api_base_url: Option<String>,
}

fn default_query_timeout_secs() -> u64 {
    120
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            backend: WarehouseBackend::default(),
            project_id: None,
            credentials_path: None,
            access_token: None,
            location: None,
            query_timeout_secs: default_query_timeout_secs(),
            max_concurrent_queries: None,
            api_base_url: None,
        }
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// LLM provider: "openai" or "mock".
    #[serde(default)]
    pub provider: LlmProvider,

    /// Model name (e.g., "gpt-3.5-turbo", "gpt-4o").
    pub model: Option<String>,

    /// API key (not recommended to store in config).
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Override for the OpenAI API base URL (e.g. a proxy).
    pub api_base_url: Option<String>,
}

fn default_llm_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: None,
            api_key: None,
            timeout_secs: default_llm_timeout_secs(),
            api_base_url: None,
        }
    }
}

impl LlmConfig {
    /// Returns the configured model, or the default.
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Whether the warehouse query is run up front or by the query stage's tool.
    #[serde(default)]
    pub mode: PipelineMode,

    /// Whether stages keep memory of earlier requests.
    #[serde(default = "default_memory")]
    pub memory: bool,

    /// Number of past exchanges each stage remembers.
    #[serde(default = "default_memory_max_exchanges")]
    pub memory_max_exchanges: usize,

    /// Character budget for the history a stage replays.
    #[serde(default = "default_memory_max_chars")]
    pub memory_max_chars: usize,

    /// Tool-call round trips allowed per stage in tool-bound mode.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

fn default_memory() -> bool {
    true
}

fn default_memory_max_exchanges() -> usize {
    10
}

fn default_memory_max_chars() -> usize {
    16_000
}

fn default_max_tool_rounds() -> usize {
    4
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::default(),
            memory: default_memory(),
            memory_max_exchanges: default_memory_max_exchanges(),
            memory_max_chars: default_memory_max_chars(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bq-insight")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| InsightError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            InsightError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Applies process environment variables as defaults for unset fields.
    pub fn apply_env_defaults(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Applies environment-style variables from `lookup` to unset fields.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.server.host.is_none() {
            self.server.host = lookup("HOST");
        }
        if self.server.port.is_none() {
            self.server.port = lookup("PORT").and_then(|p| p.parse().ok());
        }

        if self.llm.api_key.is_none() {
            self.llm.api_key = lookup("OPENAI_API_KEY");
        }
        if self.llm.model.is_none() {
            self.llm.model = lookup("OPENAI_MODEL_NAME").or_else(|| lookup("OPENAI_MODEL"));
        }

        let wh = &mut self.warehouse;
        if wh.credentials_path.is_none() {
            wh.credentials_path = lookup("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from);
        }
        if wh.project_id.is_none() {
            wh.project_id = lookup("GOOGLE_CLOUD_PROJECT");
        }
        if wh.access_token.is_none() {
            wh.access_token = lookup("BIGQUERY_ACCESS_TOKEN");
        }
        if wh.location.is_none() {
            wh.location = lookup("BIGQUERY_LOCATION");
        }
    }

    /// Checks that everything needed to serve requests is present.
    ///
    /// Called once at startup so that missing credentials fail the process
    /// instead of the first request.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == Some(0) {
            return Err(InsightError::config("server.port must be non-zero"));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(InsightError::config(
                "server.request_timeout_secs must be non-zero",
            ));
        }
        if self.pipeline.max_tool_rounds == 0 {
            return Err(InsightError::config(
                "pipeline.max_tool_rounds must be at least 1",
            ));
        }
        if self.warehouse.max_concurrent_queries == Some(0) {
            return Err(InsightError::config(
                "warehouse.max_concurrent_queries must be at least 1 when set",
            ));
        }

        if self.llm.provider == LlmProvider::OpenAi
            && self.llm.api_key.as_deref().map_or(true, str::is_empty)
        {
            return Err(InsightError::config(
                "No OpenAI API key configured. Set OPENAI_API_KEY or llm.api_key.",
            ));
        }

        if self.warehouse.backend == WarehouseBackend::BigQuery {
            let wh = &self.warehouse;
            match (&wh.credentials_path, &wh.access_token) {
                (Some(path), _) if !path.exists() => {
                    return Err(InsightError::config(format!(
                        "Credentials file not found: {}",
                        path.display()
                    )));
                }
                (None, None) => {
                    return Err(InsightError::config(
                        "No BigQuery credentials configured. Set GOOGLE_APPLICATION_CREDENTIALS \
                         or BIGQUERY_ACCESS_TOKEN.",
                    ));
                }
                _ => {}
            }
            if wh.project_id.is_none() && wh.credentials_path.is_none() {
                return Err(InsightError::config(
                    "No BigQuery project configured. Set GOOGLE_CLOUD_PROJECT or warehouse.project_id.",
                ));
            }
        }

        Ok(())
    }
}
