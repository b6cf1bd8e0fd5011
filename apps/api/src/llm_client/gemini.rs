//! Google Gemini `generateContent` adapter.
//!
//! Sent as one flattened user blob: section labels carry the role information.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    build_http_client, send_with_retry, LlmError, PromptSections, ProviderAdapter,
    ProviderCallFailed, ProviderConfig,
};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const BACKEND: &str = "gemini";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Clone)]
pub struct GeminiAdapter {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_retries: u32,
}

impl GeminiAdapter {
    pub fn new(config: ProviderConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_http_client(config.timeout)?,
            base_url: config.base_url_or(GEMINI_API_URL).to_string(),
            api_key: config.api_key,
            model: config.model,
            max_retries: config.max_retries,
        })
    }

    async fn call(
        &self,
        sections: &PromptSections,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let body = build_request(sections, temperature, max_tokens);
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        debug!("Gemini request: {} prompt chars", sections.total_len());

        let response = send_with_retry(BACKEND, self.max_retries, || {
            self.client
                .post(&url)
                .query(&[("key", self.api_key.as_str())])
                .json(&body)
        })
        .await?;

        let generated: GenerateResponse = response.json().await?;
        candidate_text(generated).ok_or(LlmError::EmptyContent)
    }
}

fn build_request(sections: &PromptSections, temperature: f32, max_tokens: u32) -> GenerateRequest {
    GenerateRequest {
        contents: vec![RequestContent {
            role: "user",
            parts: vec![RequestPart {
                text: sections.flatten(),
            }],
        }],
        generation_config: GenerationConfig {
            temperature,
            max_output_tokens: max_tokens,
        },
    }
}

/// Concatenates the text parts of the first candidate.
fn candidate_text(response: GenerateResponse) -> Option<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        BACKEND
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        sections: &PromptSections,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderCallFailed> {
        self.call(sections, temperature, max_tokens)
            .await
            .map_err(|cause| ProviderCallFailed::new(BACKEND, cause))
    }
}
