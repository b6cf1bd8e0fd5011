//! Provider registry: built once at startup and handed to the engine.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use super::anthropic::AnthropicAdapter;
use super::fallback::FallbackAdapter;
use super::gemini::GeminiAdapter;
use super::openai::OpenAiAdapter;
use super::{LlmError, ProviderAdapter, ProviderConfig};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(
        "No AI providers available. Configure GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY"
    )]
    ProviderUnavailable,

    #[error("Failed to build {backend} client: {cause}")]
    Client {
        backend: &'static str,
        cause: LlmError,
    },
}

/// Which backends are configured. Order of preference: Gemini, OpenAI, Anthropic.
#[derive(Debug, Clone, Default)]
pub struct ProvidersConfig {
    pub gemini: Option<ProviderConfig>,
    pub openai: Option<ProviderConfig>,
    pub anthropic: Option<ProviderConfig>,
    /// How long the primary may run before its fallback takes over.
    pub primary_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderDescriptor {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub primary: ProviderDescriptor,
    pub comparison: Vec<ProviderDescriptor>,
}

/// `primary` serves the single-provider stages; every `comparison` provider runs its own
/// Compare stage and contributes one score to the consensus.
#[derive(Clone)]
pub struct ProviderRegistry {
    primary: Arc<dyn ProviderAdapter>,
    comparison: Vec<Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// An empty comparison set falls back to comparing with the primary alone.
    pub fn new(
        primary: Arc<dyn ProviderAdapter>,
        comparison: Vec<Arc<dyn ProviderAdapter>>,
    ) -> Self {
        let comparison = if comparison.is_empty() {
            vec![primary.clone()]
        } else {
            comparison
        };
        Self {
            primary,
            comparison,
        }
    }

    pub fn from_config(config: &ProvidersConfig) -> Result<Self, RegistryError> {
        let mut backends: Vec<Arc<dyn ProviderAdapter>> = Vec::new();

        if let Some(c) = &config.gemini {
            let adapter = GeminiAdapter::new(c.clone()).map_err(|cause| RegistryError::Client {
                backend: "gemini",
                cause,
            })?;
            backends.push(Arc::new(adapter));
        }
        if let Some(c) = &config.openai {
            let adapter = OpenAiAdapter::new(c.clone()).map_err(|cause| RegistryError::Client {
                backend: "openai",
                cause,
            })?;
            backends.push(Arc::new(adapter));
        }
        if let Some(c) = &config.anthropic {
            let adapter =
                AnthropicAdapter::new(c.clone()).map_err(|cause| RegistryError::Client {
                    backend: "anthropic",
                    cause,
                })?;
            backends.push(Arc::new(adapter));
        }

        Self::from_backends(backends, config.primary_timeout)
    }

    /// First backend is primary with the second as its fallback; all of them compare.
    pub fn from_backends(
        backends: Vec<Arc<dyn ProviderAdapter>>,
        primary_timeout: Option<Duration>,
    ) -> Result<Self, RegistryError> {
        let primary: Arc<dyn ProviderAdapter> = match backends.as_slice() {
            [] => return Err(RegistryError::ProviderUnavailable),
            [only] => only.clone(),
            [first, second, ..] => {
                let fallback = FallbackAdapter::new(first.clone(), second.clone());
                Arc::new(match primary_timeout {
                    Some(limit) => fallback.with_primary_timeout(limit),
                    None => fallback,
                })
            }
        };

        let registry = Self::new(primary, backends);
        info!(
            "Provider registry: primary={} comparison=[{}]",
            registry.primary.name(),
            registry
                .comparison
                .iter()
                .map(|p| p.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(registry)
    }

    pub fn primary(&self) -> &dyn ProviderAdapter {
        self.primary.as_ref()
    }

    pub fn comparison(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.comparison
    }

    pub fn describe(&self) -> ProviderInfo {
        let descriptor = |p: &dyn ProviderAdapter| ProviderDescriptor {
            provider: p.name().to_string(),
            model: p.model().to_string(),
        };
        ProviderInfo {
            primary: descriptor(self.primary()),
            comparison: self
                .comparison
                .iter()
                .map(|p| descriptor(p.as_ref()))
                .collect(),
        }
    }
}
