use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::{LlmError, PromptSections, ProviderAdapter, ProviderCallFailed};

/// Tries `primary`; only when it fails does the same prompt go to `secondary`.
/// When both fail the secondary's error is reported.
///
/// A primary that outlives `primary_timeout` counts as failed, so a hung backend still
/// leaves the secondary time to answer inside the caller's own deadline.
pub struct FallbackAdapter {
    primary: Arc<dyn ProviderAdapter>,
    secondary: Arc<dyn ProviderAdapter>,
    primary_timeout: Option<Duration>,
    name: String,
}

impl FallbackAdapter {
    pub fn new(primary: Arc<dyn ProviderAdapter>, secondary: Arc<dyn ProviderAdapter>) -> Self {
        let name = format!("{}+{}", primary.name(), secondary.name());
        Self {
            primary,
            secondary,
            primary_timeout: None,
            name,
        }
    }

    pub fn with_primary_timeout(mut self, timeout: Duration) -> Self {
        self.primary_timeout = Some(timeout);
        self
    }

    async fn try_primary(
        &self,
        sections: &PromptSections,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderCallFailed> {
        let generation = self.primary.generate(sections, temperature, max_tokens);
        let Some(limit) = self.primary_timeout else {
            return generation.await;
        };
        tokio::time::timeout(limit, generation)
            .await
            .unwrap_or_else(|_| {
                Err(ProviderCallFailed::new(
                    self.primary.name(),
                    LlmError::Timeout(limit),
                ))
            })
    }
}

#[async_trait]
impl ProviderAdapter for FallbackAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        self.primary.model()
    }

    async fn generate(
        &self,
        sections: &PromptSections,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderCallFailed> {
        match self.try_primary(sections, temperature, max_tokens).await {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!(
                    "{} failed ({}), falling back to {}",
                    self.primary.name(),
                    e.cause,
                    self.secondary.name()
                );
                self.secondary
                    .generate(sections, temperature, max_tokens)
                    .await
            }
        }
    }
}
