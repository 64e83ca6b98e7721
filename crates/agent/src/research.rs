//! Research agent - one conversational session.
//!
//! Owns the reasoning loop, the tool registry, the conversation memory and
//! the log of reports written during the session. Each query is recorded as
//! a human turn, answered by the ReAct loop with the memory context in the
//! prompt, and the answer is recorded as an assistant turn.

use chrono::{DateTime, Local};
use delve_config::AppConfig;
use delve_core::provider::Provider;
use delve_core::tool::{ToolDescriptor, ToolRegistry};
use delve_memory::{ConversationMemory, MemoryLimits, MemoryStats};
use delve_tools::{ArtifactLog, ToolSettings};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::ReasoningEngine;
use crate::patterns::{AgentOutcome, DEFAULT_MAX_ITERATIONS, ReactAgent};

/// Files shown per directory by [`ResearchAgent::list_generated_files`].
const LISTED_FILES: usize = 5;

/// Everything a session needs besides the provider.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub max_iterations: u32,
    pub verbose: bool,
    pub reports_dir: PathBuf,
    pub data_dir: PathBuf,
    pub memory: MemoryLimits,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".into(),
            temperature: 0.7,
            max_tokens: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            verbose: false,
            reports_dir: PathBuf::from("reports"),
            data_dir: PathBuf::from("data"),
            memory: MemoryLimits::default(),
        }
    }
}

impl AgentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
            max_iterations: config.agent.max_iterations,
            verbose: config.agent.verbose,
            reports_dir: config.output.reports_dir.clone(),
            data_dir: config.output.data_dir.clone(),
            memory: MemoryLimits::from(&config.memory),
        }
    }
}

/// Static description of a session, for the `info` command.
#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    pub framework: String,
    pub llm: String,
    pub agent_type: String,
    pub max_iterations: u32,
    pub tools_count: usize,
    pub tools: Vec<String>,
    pub memory_type: String,
    pub verbose: bool,
}

pub struct ResearchAgent {
    react: ReactAgent,
    tools: Arc<ToolRegistry>,
    memory: ConversationMemory,
    artifacts: ArtifactLog,
    settings: AgentSettings,
}

impl ResearchAgent {
    pub fn new(provider: Arc<dyn Provider>, settings: AgentSettings) -> Self {
        let artifacts = ArtifactLog::new();
        let tools = Arc::new(delve_tools::default_registry(ToolSettings {
            provider: Arc::clone(&provider),
            model: settings.model.clone(),
            reports_dir: settings.reports_dir.clone(),
            artifacts: artifacts.clone(),
        }));

        let mut engine =
            ReasoningEngine::new(provider, settings.model.clone()).with_temperature(settings.temperature);
        if let Some(max_tokens) = settings.max_tokens {
            engine = engine.with_max_tokens(max_tokens);
        }
        let react = ReactAgent::new(engine, Arc::clone(&tools))
            .with_max_iterations(settings.max_iterations);

        Self {
            react,
            tools,
            memory: ConversationMemory::new(settings.memory),
            artifacts,
            settings,
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<delve_core::event::EventBus>) -> Self {
        self.react = self.react.with_event_bus(bus);
        self
    }

    /// Create the reports and data directories.
    pub async fn ensure_directories(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.settings.reports_dir).await?;
        tokio::fs::create_dir_all(&self.settings.data_dir).await
    }

    pub async fn research(&mut self, query: &str) -> Result<AgentOutcome, delve_core::Error> {
        self.research_until(query, &CancellationToken::new()).await
    }

    /// Like [`research`](Self::research), stopping early once `cancel` fires.
    pub async fn research_until(
        &mut self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentOutcome, delve_core::Error> {
        let context = self.memory.context_snippet();
        self.memory.add_user_message(query);
        info!(query, "Starting research");

        match self.react.run(query, &context, cancel).await {
            Ok(outcome) => {
                self.memory.add_assistant_message(outcome.answer.clone());
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "Research failed");
                self.memory.add_assistant_message(format!("Research error: {e}"));
                Err(e)
            }
        }
    }

    pub fn available_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.list()
    }

    pub fn conversation_history(&self) -> String {
        self.memory.formatted_history()
    }

    pub fn research_context(&self) -> String {
        self.memory.context_snippet()
    }

    pub fn clear_memory(&mut self) {
        self.memory.clear();
        info!("Conversation memory cleared");
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn memory_stats(&self) -> MemoryStats {
        self.memory.stats()
    }

    pub fn update_session_summary(&mut self, summary: impl Into<String>) {
        self.memory.set_summary(summary);
    }

    /// Reports written by this session's tools, oldest first.
    pub fn generated_files(&self) -> Vec<String> {
        self.artifacts.snapshot()
    }

    pub fn reports_dir(&self) -> &Path {
        &self.settings.reports_dir
    }

    /// Summary of the files in the reports and data directories.
    pub async fn list_generated_files(&self) -> String {
        let mut lines = Vec::new();
        for dir in [&self.settings.reports_dir, &self.settings.data_dir] {
            if let Some(section) = describe_dir(dir).await {
                lines.extend(section);
            }
        }

        if lines.is_empty() {
            "No files generated yet".to_string()
        } else {
            lines.join("\n")
        }
    }

    pub fn info(&self) -> AgentInfo {
        AgentInfo {
            framework: "Delve".into(),
            llm: self.settings.model.clone(),
            agent_type: "ReAct".into(),
            max_iterations: self.react.max_iterations(),
            tools_count: self.tools.len(),
            tools: self.tools.names(),
            memory_type: "ConversationWindowMemory".into(),
            verbose: self.settings.verbose,
        }
    }
}

/// Lines describing one output directory, or `None` when it does not exist.
async fn describe_dir(dir: &Path) -> Option<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let label = dir.display().to_string().to_uppercase();

    let mut files = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        let meta = entry.metadata().await.ok();
        files.push((name, meta));
    }

    if files.is_empty() {
        return Some(vec![format!("\n{label}: empty")]);
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    let mut lines = vec![format!("\n{label} ({} files):", files.len())];
    let skip = files.len().saturating_sub(LISTED_FILES);
    for (name, meta) in &files[skip..] {
        let size = meta.as_ref().map(|m| m.len()).unwrap_or(0);
        let modified = meta
            .as_ref()
            .and_then(|m| m.modified().ok())
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".into());
        lines.push(format!("  {name} ({size} bytes, {modified})"));
    }
    Some(lines)
}
