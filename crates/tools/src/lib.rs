//! Built-in tools for the Delve research agent.
//!
//! Three tools are available to the reasoning loop: a grounded web search,
//! an arithmetic evaluator and a Markdown report writer.

pub mod calculator;
pub mod file_operations;
pub mod web_search;

use async_trait::async_trait;
use delve_core::provider::Provider;
use delve_core::tool::{Tool, ToolRegistry};
use std::path::PathBuf;
use std::sync::Arc;

pub use calculator::CalculatorTool;
pub use file_operations::{ArtifactLog, FileOperationsTool, write_report};
pub use web_search::WebSearchTool;

/// What the built-in tools need from their surroundings.
#[derive(Clone)]
pub struct ToolSettings {
    /// Backend used for grounded searches.
    pub provider: Arc<dyn Provider>,
    /// Model name passed to the search backend.
    pub model: String,
    /// Directory that receives generated reports.
    pub reports_dir: PathBuf,
    /// Sink for paths of written reports.
    pub artifacts: ArtifactLog,
}

/// The closed set of tools the agent ships with.
pub enum BuiltinTool {
    WebSearch(WebSearchTool),
    Calculator(CalculatorTool),
    FileOperations(FileOperationsTool),
}

impl BuiltinTool {
    /// All built-ins, configured from `settings`.
    pub fn all(settings: ToolSettings) -> [BuiltinTool; 3] {
        [
            BuiltinTool::WebSearch(WebSearchTool::new(settings.provider, settings.model)),
            BuiltinTool::Calculator(CalculatorTool),
            BuiltinTool::FileOperations(FileOperationsTool::new(
                settings.reports_dir,
                settings.artifacts,
            )),
        ]
    }

    fn inner(&self) -> &dyn Tool {
        match self {
            BuiltinTool::WebSearch(tool) => tool,
            BuiltinTool::Calculator(tool) => tool,
            BuiltinTool::FileOperations(tool) => tool,
        }
    }
}

#[async_trait]
impl Tool for BuiltinTool {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn description(&self) -> &str {
        self.inner().description()
    }

    async fn invoke(&self, input: &str) -> String {
        self.inner().invoke(input).await
    }
}

/// Registry holding `web_search`, `calculator` and `file_operations`.
pub fn default_registry(settings: ToolSettings) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in BuiltinTool::all(settings) {
        registry.register(Box::new(tool));
    }
    registry
}
