//! Reasoning engine adapter.
//!
//! Wraps a [`Provider`] behind a text-in/text-out call. Faults never escape:
//! they come back as text the loop treats like any other reply.

use delve_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use tracing::{debug, warn};

/// Marker that shows the prompt is a tool-using step.
const ACTION_MARKER: &str = "Action:";

/// Stop sequence that keeps the engine from inventing tool results.
pub const OBSERVATION_STOP: &str = "\nObservation:";

pub const STRICT_INSTRUCTION: &str = "You are a research agent that uses tools. CRITICAL RULES:
1. When you need to use a tool, output ONLY the Action and Action Input
2. Do NOT generate fake observations or responses
3. Stop immediately after outputting Action Input
4. Wait for the actual tool result before continuing

Format your response exactly like this:
Thought: [your reasoning]
Action: [tool_name]
Action Input: [input_for_tool]

Then STOP. Do not continue writing.";

#[derive(Clone)]
pub struct ReasoningEngine {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ReasoningEngine {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> Arc<dyn Provider> {
        Arc::clone(&self.provider)
    }

    /// Send one prompt and return the generated text.
    pub async fn complete(&self, prompt: &str) -> String {
        let text = if prompt.contains(ACTION_MARKER) {
            format!("{STRICT_INSTRUCTION}\n\n{prompt}")
        } else {
            prompt.to_string()
        };

        let mut request = ProviderRequest::prompt(&self.model, text);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request.stop = vec![OBSERVATION_STOP.to_string()];

        debug!(provider = self.provider.name(), model = %self.model, "Calling reasoning engine");

        match self.provider.complete(request).await {
            Ok(response) => response.message.content,
            Err(e) => {
                warn!(error = %e, "Reasoning engine call failed");
                format!("Error calling reasoning engine: {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::test_helpers::{FailingProvider, SequentialMockProvider};
    use delve_core::error::ProviderError;

    #[tokio::test]
    async fn strict_instruction_only_for_action_prompts() {
        let provider = Arc::new(SequentialMockProvider::from_texts(&["one", "two"]));
        let engine = ReasoningEngine::new(provider.clone(), "mock-model");

        assert_eq!(engine.complete("Say hello").await, "one");
        assert_eq!(engine.complete("Action: calculator").await, "two");

        let prompts = provider.prompts();
        assert_eq!(prompts[0], "Say hello");
        assert!(prompts[1].starts_with(STRICT_INSTRUCTION));
        assert!(prompts[1].ends_with("\n\nAction: calculator"));
    }

    #[tokio::test]
    async fn requests_carry_observation_stop() {
        let provider = Arc::new(SequentialMockProvider::from_texts(&["ok"]));
        let engine = ReasoningEngine::new(provider.clone(), "mock-model").with_temperature(0.2);
        engine.complete("hi").await;

        let request = provider.requests().remove(0);
        assert_eq!(request.stop, vec!["\nObservation:".to_string()]);
        assert_eq!(request.model, "mock-model");
        assert!((request.temperature - 0.2).abs() < f32::EPSILON);
        assert!(!request.web_search);
    }

    #[tokio::test]
    async fn faults_become_text() {
        let engine = ReasoningEngine::new(
            Arc::new(FailingProvider(ProviderError::Timeout("30s".into()))),
            "m",
        );
        let reply = engine.complete("hi").await;
        assert!(reply.starts_with("Error calling reasoning engine: "), "{reply}");
    }
}
