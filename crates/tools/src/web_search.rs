//! Web search tool - asks the reasoning engine to answer with live search
//! grounding turned on.
//!
//! The tool never reaches a search API itself; the backend decides how
//! grounding happens (Gemini's `google_search`, OpenRouter's `web` plugin).

use async_trait::async_trait;
use delve_core::provider::{Provider, ProviderRequest};
use delve_core::tool::Tool;
use std::sync::Arc;
use tracing::debug;

pub struct WebSearchTool {
    provider: Arc<dyn Provider>,
    model: String,
}

impl WebSearchTool {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the internet for current information. Input: search query"
    }

    async fn invoke(&self, input: &str) -> String {
        let query = input.trim();
        let mut request = ProviderRequest::prompt(&self.model, format!("Search for: {query}"));
        request.web_search = true;

        debug!(provider = self.provider.name(), query, "Running grounded search");

        match self.provider.complete(request).await {
            Ok(response) if response.message.content.trim().is_empty() => {
                format!("No search results for: {query}")
            }
            Ok(response) => response.message.content,
            Err(e) => format!("Search error: {e}"),
        }
    }
}
