//! Tool trait - the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! search the web, do arithmetic, write reports. A tool takes one line of
//! free text and always answers with text. Faults are rendered into the
//! answer so the reasoning engine can read them as an observation.

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use crate::error::ToolError;

/// What the reasoning engine is told about a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique, stable tool name (e.g., "calculator")
    pub name: String,

    /// Description shown to the reasoning engine
    pub description: String,
}

/// The core Tool trait.
///
/// `invoke` must not fail: any internal error becomes a descriptive
/// string such as `"Calculation error: ..."`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "web_search").
    fn name(&self) -> &str;

    /// A description of what this tool does and what input it expects.
    fn description(&self) -> &str;

    /// Run the tool on its text input.
    async fn invoke(&self, input: &str) -> String;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
        }
    }
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. List tool names and descriptions for the prompt
/// 2. Dispatch the engine's `Action` to the named tool
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All tool descriptors, sorted by name so prompts are stable.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> =
            self.tools.values().map(|t| t.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Sorted tool names.
    pub fn names(&self) -> Vec<String> {
        self.list().into_iter().map(|d| d.name).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool by name.
    ///
    /// Never fails: an unknown name or a panicking tool produces an
    /// observation string instead.
    pub async fn invoke(&self, name: &str, input: &str) -> String {
        let Some(tool) = self.tools.get(name) else {
            let err = ToolError::NotFound {
                name: name.to_string(),
                available: self.names().join(", "),
            };
            tracing::warn!(tool = name, "Unknown tool requested");
            return err.to_string();
        };

        match AssertUnwindSafe(tool.invoke(input)).catch_unwind().await {
            Ok(output) => output,
            Err(payload) => {
                let err = ToolError::Panicked {
                    tool_name: name.to_string(),
                    reason: panic_message(payload.as_ref()),
                };
                tracing::error!(tool = name, error = %err, "Tool panicked");
                format!("Tool error: {err}")
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
