/// LLM Client: the single point of entry for every generative-model call in ResumeScan.
///
/// ARCHITECTURAL RULE: No other module may call a model API directly.
/// Every backend implements `ProviderAdapter`; fallback and the provider registry are
/// composed here and injected into the analysis engine.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

pub mod anthropic;
pub mod fallback;
pub mod gemini;
pub mod openai;
pub mod registry;

#[cfg(test)]
pub mod testing;

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Labels that keep role information alive when sections are flattened into one blob.
pub const SYSTEM_LABEL: &str = "[System Prompt]: ";
pub const EXAMPLES_LABEL: &str = "[Examples]: ";
pub const USER_LABEL: &str = "[User Prompt]: ";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A backend call failed. The adapter reports it; fallback policy lives one layer up.
#[derive(Debug, Error)]
#[error("{backend} call failed: {cause}")]
pub struct ProviderCallFailed {
    pub backend: String,
    #[source]
    pub cause: LlmError,
}

impl ProviderCallFailed {
    pub fn new(backend: impl Into<String>, cause: LlmError) -> Self {
        Self {
            backend: backend.into(),
            cause,
        }
    }
}

/// Ordered, optional role-structured prompt: system, assistant/example, user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptSections {
    pub system: Option<String>,
    pub assistant: Option<String>,
    pub user: Option<String>,
}

impl PromptSections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_assistant(mut self, assistant: impl Into<String>) -> Self {
        self.assistant = Some(assistant.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn system_text(&self) -> Option<&str> {
        present(&self.system)
    }

    pub fn assistant_text(&self) -> Option<&str> {
        present(&self.assistant)
    }

    pub fn user_text(&self) -> Option<&str> {
        present(&self.user)
    }

    /// Single-blob form for backends without role channels.
    /// Missing or blank sections are dropped rather than sent as empty labels.
    pub fn flatten(&self) -> String {
        [
            (SYSTEM_LABEL, self.system_text()),
            (EXAMPLES_LABEL, self.assistant_text()),
            (USER_LABEL, self.user_text()),
        ]
        .into_iter()
        .filter_map(|(label, text)| text.map(|t| format!("{label}{t}")))
        .collect::<Vec<_>>()
        .join("\n")
    }

    /// Total character count across all sections, for logging.
    pub fn total_len(&self) -> usize {
        [self.system_text(), self.assistant_text(), self.user_text()]
            .into_iter()
            .flatten()
            .map(str::len)
            .sum()
    }
}

fn present(section: &Option<String>) -> Option<&str> {
    section.as_deref().filter(|s| !s.trim().is_empty())
}

/// Uniform text-in / text-out interface over a generation backend.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Backend label, e.g. "gemini". Used in errors, logs and provider score attribution.
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn generate(
        &self,
        sections: &PromptSections,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderCallFailed>;
}

/// Connection settings for one backend.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub model: String,
    /// Overrides the backend's public endpoint (proxies, tests).
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub(crate) fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
    }
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<Client, LlmError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// All three backends wrap errors as `{"error": {"message": ...}}`; fall back to the raw body.
fn api_error_message(body: String) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

/// Sends a request, retrying on transport errors, 429 and 5xx with exponential backoff.
/// Other non-success statuses fail immediately.
pub(crate) async fn send_with_retry<F>(
    backend: &str,
    max_retries: u32,
    build_request: F,
) -> Result<Response, LlmError>
where
    F: Fn() -> RequestBuilder,
{
    let attempts = max_retries.max(1);
    let mut last_error: Option<LlmError> = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s
            let delay = Duration::from_millis(1000 * (1u64 << (attempt - 1)));
            warn!(
                "{backend} call attempt {} failed, retrying after {}ms...",
                attempt,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        let response = match build_request().send().await {
            Ok(r) => r,
            Err(e) => {
                last_error = Some(LlmError::Http(e));
                continue;
            }
        };

        let status = response.status();

        if status.as_u16() == 429 || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            warn!("{backend} API returned {}: {}", status, body);
            last_error = Some(LlmError::Api {
                status: status.as_u16(),
                message: api_error_message(body),
            });
            continue;
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: api_error_message(body),
            });
        }

        return Ok(response);
    }

    Err(last_error.unwrap_or(LlmError::RateLimited { retries: attempts }))
}
