//! Anthropic Messages API adapter (native role channels).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    build_http_client, send_with_retry, LlmError, PromptSections, ProviderAdapter,
    ProviderCallFailed, ProviderConfig, EXAMPLES_LABEL,
};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const BACKEND: &str = "anthropic";

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Clone)]
pub struct AnthropicAdapter {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_retries: u32,
}

impl AnthropicAdapter {
    pub fn new(config: ProviderConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_http_client(config.timeout)?,
            base_url: config.base_url_or(ANTHROPIC_API_URL).to_string(),
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
        let url = format!("{}/messages", self.base_url);

        let response = send_with_retry(BACKEND, self.max_retries, || {
            self.client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&body)
        })
        .await?;

        let llm_response: LlmResponse = response.json().await?;

        debug!(
            "Anthropic call succeeded: input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        llm_response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }
}

/// The Messages API takes `system` as a top-level field and conversations must open with a
/// user turn, so the example section rides at the end of the system block.
fn build_request<'a>(
    model: &'a str,
    sections: &'a PromptSections,
    temperature: f32,
    max_tokens: u32,
) -> AnthropicRequest<'a> {
    let system = match (sections.system_text(), sections.assistant_text()) {
        (Some(s), Some(a)) => Some(format!("{s}\n\n{EXAMPLES_LABEL}{a}")),
        (Some(s), None) => Some(s.to_string()),
        (None, Some(a)) => Some(format!("{EXAMPLES_LABEL}{a}")),
        (None, None) => None,
    };

    let messages = sections
        .user_text()
        .map(|content| AnthropicMessage {
            role: "user",
            content,
        })
        .into_iter()
        .collect();

    AnthropicRequest {
        model,
        max_tokens,
        temperature,
        system,
        messages,
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_request_carries_system_natively() {
        let sections = PromptSections::new()
            .with_system("You are a resume analyzer.")
            .with_user("Resume: ...");
        let request = build_request("claude-sonnet-4-5", &sections, 0.7, 1024);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["system"], "You are a resume analyzer.");
        assert_eq!(value["messages"].as_array().unwrap().len(), 1);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "Resume: ...");
        assert_eq!(value["max_tokens"], 1024);
    }

    #[test]
    fn test_request_appends_examples_to_system() {
        let sections = PromptSections::new()
            .with_system("Rules")
            .with_assistant("Example output")
            .with_user("Input");
        let request = build_request("m", &sections, 0.0, 10);
        assert_eq!(
            request.system.as_deref(),
            Some("Rules\n\n[Examples]: Example output")
        );
    }

    #[test]
    fn test_request_without_system_omits_field() {
        let sections = PromptSections::new().with_user("Input");
        let value = serde_json::to_value(build_request("m", &sections, 0.0, 10)).unwrap();
        assert!(value.get("system").is_none());
    }

    #[tokio::test]
    async fn test_generate_returns_first_text_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "Match Score: 80/100"}],
                "usage": {"input_tokens": 12, "output_tokens": 5}
            })))
            .mount(&server)
            .await;

        let adapter = AnthropicAdapter::new(
            ProviderConfig::new("test-key", DEFAULT_MODEL).with_base_url(server.uri()),
        )
        .unwrap();
        let text = adapter
            .generate(&PromptSections::new().with_user("hi"), 0.7, 100)
            .await
            .unwrap();
        assert_eq!(text, "Match Score: 80/100");
    }

    #[tokio::test]
    async fn test_client_error_is_reported_as_call_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"type": "authentication_error", "message": "invalid x-api-key"}
            })))
            .mount(&server)
            .await;

        let adapter = AnthropicAdapter::new(
            ProviderConfig::new("bad", DEFAULT_MODEL).with_base_url(server.uri()),
        )
        .unwrap();
        let err = adapter
            .generate(&PromptSections::new().with_user("hi"), 0.7, 100)
            .await
            .unwrap_err();

        assert_eq!(err.backend, "anthropic");
        match err.cause {
            LlmError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid x-api-key");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
