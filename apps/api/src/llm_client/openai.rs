//! OpenAI Chat Completions adapter (native role channels).
//! Also serves OpenAI-compatible gateways through `ProviderConfig::base_url`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    build_http_client, send_with_retry, LlmError, PromptSections, ProviderAdapter,
    ProviderCallFailed, ProviderConfig,
};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const BACKEND: &str = "openai";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Clone)]
pub struct OpenAiAdapter {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_retries: u32,
}

impl OpenAiAdapter {
    pub fn new(config: ProviderConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_http_client(config.timeout)?,
            base_url: config.base_url_or(OPENAI_API_URL).to_string(),
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
        let body = build_request(&self.model, sections, temperature, max_tokens);
        let url = format!("{}/chat/completions", self.base_url);

        let response = send_with_retry(BACKEND, self.max_retries, || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;

        let chat: ChatResponse = response.json().await?;

        if let Some(usage) = &chat.usage {
            debug!(
                "OpenAI call succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyContent)
    }
}

fn build_request<'a>(
    model: &'a str,
    sections: &'a PromptSections,
    temperature: f32,
    max_tokens: u32,
) -> ChatRequest<'a> {
    let messages = [
        ("system", sections.system_text()),
        ("assistant", sections.assistant_text()),
        ("user", sections.user_text()),
    ]
    .into_iter()
    .filter_map(|(role, content)| content.map(|content| ChatMessage { role, content }))
    .collect();

    ChatRequest {
        model,
        messages,
        temperature,
        max_tokens,
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
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
