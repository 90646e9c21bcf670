//! Backend registry — maps requested model ids to wired providers.
//!
//! Every model id belongs to a backend ("gemini", "openai", ...). A backend
//! is *wired* when a provider instance is registered for it. Models that are
//! unknown, or whose backend is not wired, resolve to
//! [`Resolution::Unsupported`] and must never reach a provider.

use std::collections::HashMap;
use std::sync::Arc;

use forkreach_config::AppConfig;
use forkreach_core::provider::Provider;
use serde::Serialize;
use tracing::{debug, info};

use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Outcome of resolving a requested model.
#[derive(Clone)]
pub enum Resolution {
    Supported {
        provider: Arc<dyn Provider>,
        model: String,
    },
    Unsupported {
        model: String,
    },
}

impl Resolution {
    pub fn model(&self) -> &str {
        match self {
            Self::Supported { model, .. } | Self::Unsupported { model } => model,
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Supported { .. })
    }
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Supported { provider, model } => f
                .debug_struct("Supported")
                .field("provider", &provider.name())
                .field("model", model)
                .finish(),
            Self::Unsupported { model } => {
                f.debug_struct("Unsupported").field("model", model).finish()
            }
        }
    }
}

/// A model as exposed by `/api/models`.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub backend: String,
    pub available: bool,
    pub default: bool,
}

/// Routes model ids to provider instances.
pub struct BackendRegistry {
    models: Vec<(String, String)>,
    providers: HashMap<String, Arc<dyn Provider>>,
    default_model: String,
}

impl BackendRegistry {
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            models: Vec::new(),
            providers: HashMap::new(),
            default_model: default_model.into(),
        }
    }

    /// Declare that `model` is served by `backend`. Re-mapping replaces.
    pub fn map_model(&mut self, model: impl Into<String>, backend: impl Into<String>) {
        let model = model.into();
        let backend = backend.into();
        match self.models.iter_mut().find(|(id, _)| *id == model) {
            Some(entry) => entry.1 = backend,
            None => self.models.push((model, backend)),
        }
    }

    /// Wire a provider for a backend.
    pub fn register(&mut self, backend: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(backend.into(), provider);
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn backend_of(&self, model: &str) -> Option<&str> {
        self.models
            .iter()
            .find(|(id, _)| id == model)
            .map(|(_, backend)| backend.as_str())
    }

    /// Resolve a requested model (or the default) to a provider.
    pub fn resolve(&self, requested: Option<&str>) -> Resolution {
        let model = requested
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.default_model)
            .to_string();

        match self
            .backend_of(&model)
            .and_then(|backend| self.providers.get(backend))
        {
            Some(provider) => {
                debug!(model = %model, provider = provider.name(), "Resolved model");
                Resolution::Supported {
                    provider: Arc::clone(provider),
                    model,
                }
            }
            None => Resolution::Unsupported { model },
        }
    }

    /// All known models in declaration order.
    pub fn models(&self) -> Vec<ModelInfo> {
        self.models
            .iter()
            .map(|(id, backend)| ModelInfo {
                id: id.clone(),
                backend: backend.clone(),
                available: self.providers.contains_key(backend),
                default: *id == self.default_model,
            })
            .collect()
    }

    /// Names of wired backends, sorted.
    pub fn wired_backends(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Build the registry from configuration.
///
/// Gemini is always wired (a missing key surfaces as an authentication
/// failure at generation time). OpenAI is wired only when a key is
/// configured. Other backends stay unwired.
pub fn build_from_config(config: &AppConfig) -> BackendRegistry {
    let mut registry = BackendRegistry::new(&config.default_model);
    let timeout = config.generation.request_timeout_secs;

    for model in &config.models {
        registry.map_model(&model.id, &model.backend);
    }

    let gemini_url = config
        .providers
        .get("gemini")
        .and_then(|p| p.api_url.clone());
    let mut gemini = GeminiProvider::new(config.provider_api_key("gemini").unwrap_or_default())
        .with_timeout(timeout);
    if let Some(url) = gemini_url {
        gemini = gemini.with_base_url(url);
    }
    registry.register("gemini", Arc::new(gemini));

    if let Some(key) = config.provider_api_key("openai") {
        let url = config
            .providers
            .get("openai")
            .and_then(|p| p.api_url.clone())
            .unwrap_or_else(|| "https://api.openai.com/v1".into());
        registry.register(
            "openai",
            Arc::new(OpenAiCompatProvider::new("openai", url, key).with_timeout(timeout)),
        );
    }

    info!(
        backends = ?registry.wired_backends(),
        default_model = %registry.default_model(),
        "Backend registry ready"
    );

    registry
}
