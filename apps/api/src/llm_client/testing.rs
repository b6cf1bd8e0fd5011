//! In-process `ProviderAdapter` fake for engine, refinement and fallback tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{LlmError, PromptSections, ProviderAdapter, ProviderCallFailed};

/// Replays a queue of canned outcomes in call order and records every prompt it receives.
/// An exhausted queue answers with `LlmError::EmptyContent`.
pub struct ScriptedProvider {
    name: String,
    outcomes: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<PromptSections>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outcomes: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_responses(self, responses: &[&str]) -> Self {
        for r in responses {
            self.push_response(r);
        }
        self
    }

    pub fn with_failure(self, status: u16) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(Err(LlmError::Api {
                status,
                message: "scripted failure".to_string(),
            }));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_response(&self, response: &str) {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(Ok(response.to_string()));
    }

    pub fn calls(&self) -> Vec<PromptSections> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn generate(
        &self,
        sections: &PromptSections,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String, ProviderCallFailed> {
        self.calls.lock().unwrap().push(sections.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyContent));
        outcome.map_err(|cause| ProviderCallFailed::new(self.name.clone(), cause))
    }
}
