//! Configuration loading, validation, and management for ForkReach.
//!
//! Loads configuration from `~/.forkreach/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.forkreach/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gemini API key (the primary backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model used when a request names none
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per generated response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub store: StoreConfig,

    /// Backend-specific settings keyed by backend name ("gemini", "openai", ...)
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Model id → backend table. Order is preserved for listing.
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,
}

fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}

fn default_models() -> Vec<ModelConfig> {
    [
        ("gemini-2.5-flash", "gemini"),
        ("gemini-2.0-flash-exp", "gemini"),
        ("gemini-1.5-pro", "gemini"),
        ("gemini-1.5-flash", "gemini"),
        ("gpt-4o", "openai"),
        ("gpt-4o-mini", "openai"),
        ("claude-opus-4-20250514", "anthropic"),
        ("claude-sonnet-4-20250514", "anthropic"),
    ]
    .into_iter()
    .map(|(id, backend)| ModelConfig {
        id: id.into(),
        backend: backend.into(),
    })
    .collect()
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("generation", &self.generation)
            .field("routing", &self.routing)
            .field("gateway", &self.gateway)
            .field("store", &self.store)
            .field("providers", &self.providers)
            .field("models", &self.models)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Generation pipeline limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Most recent history turns forwarded into a prompt
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Max seconds to wait for the next generated fragment
    #[serde(default = "default_chunk_timeout")]
    pub chunk_timeout_secs: u64,

    /// Whole-request timeout for the HTTP client talking to backends
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_history_limit() -> usize {
    5
}
fn default_chunk_timeout() -> u64 {
    60
}
fn default_request_timeout() -> u64 {
    300
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            chunk_timeout_secs: default_chunk_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Handler that wins score ties
    #[serde(default = "default_priority_handler")]
    pub priority_handler: String,
}

fn default_priority_handler() -> String {
    "twitter".into()
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            priority_handler: default_priority_handler(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Allowed browser origins. `["*"]` allows any.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Record store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,

    /// SQLite database file; defaults to `~/.forkreach/forkreach.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Sqlite
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

impl StoreConfig {
    /// The database path to use, falling back to the config directory.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("forkreach.db"))
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// One entry of the model → backend table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub backend: String,
}

impl AppConfig {
    /// Load configuration from the default path (~/.forkreach/config.toml).
    ///
    /// Environment overrides:
    /// - `FORKREACH_API_KEY`, then `GEMINI_API_KEY` (when no key is configured)
    /// - `OPENAI_API_KEY` (openai backend key)
    /// - `FORKREACH_MODEL` (default model)
    /// - `FORKREACH_STORE_PATH` (SQLite path)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("FORKREACH_API_KEY")
                .ok()
                .or_else(|| std::env::var("GEMINI_API_KEY").ok());
        }

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            let openai = self.providers.entry("openai".into()).or_default();
            if openai.api_key.is_none() {
                openai.api_key = Some(key);
            }
        }

        if let Ok(model) = std::env::var("FORKREACH_MODEL") {
            self.default_model = model;
        }

        if let Ok(path) = std::env::var("FORKREACH_STORE_PATH") {
            self.store.path = Some(PathBuf::from(path));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".forkreach")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.generation.history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "generation.history_limit must be at least 1".into(),
            ));
        }

        if self.generation.chunk_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "generation.chunk_timeout_secs must be > 0".into(),
            ));
        }

        if self.routing.priority_handler.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "routing.priority_handler must not be empty".into(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for model in &self.models {
            if !seen.insert(model.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate model id '{}'",
                    model.id
                )));
            }
        }

        Ok(())
    }

    /// The backend name a model id maps to, if the model is known.
    pub fn backend_for(&self, model: &str) -> Option<&str> {
        self.models
            .iter()
            .find(|m| m.id == model)
            .map(|m| m.backend.as_str())
    }

    /// API key for a backend: the per-provider key, or the top-level key for gemini.
    pub fn provider_api_key(&self, backend: &str) -> Option<String> {
        self.providers
            .get(backend)
            .and_then(|p| p.api_key.clone())
            .or_else(|| {
                if backend == "gemini" {
                    self.api_key.clone()
                } else {
                    None
                }
            })
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// A copy with every API key masked, safe to print.
    pub fn redacted(&self) -> Self {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "[REDACTED]".to_string());
        let mut copy = self.clone();
        copy.api_key = mask(&self.api_key);
        for provider in copy.providers.values_mut() {
            provider.api_key = mask(&provider.api_key);
        }
        copy
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            generation: GenerationConfig::default(),
            routing: RoutingConfig::default(),
            gateway: GatewayConfig::default(),
            store: StoreConfig::default(),
            providers: HashMap::new(),
            models: default_models(),
        }
    }
}

fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
