//! What a worker runs for one task.

use async_trait::async_trait;
use chrono::Utc;
use delve_agent::{AgentSettings, ResearchAgent};
use delve_core::event::{DomainEvent, EventBus};
use delve_core::provider::Provider;
use delve_core::task::{ResearchRequest, TaskStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest report title derived from a query.
const REPORT_TITLE_CHARS: usize = 60;

/// What a successful run hands back to the manager.
#[derive(Debug, Clone, Default)]
pub struct TaskOutput {
    pub result: String,
    pub files_generated: Vec<String>,
    pub truncated: bool,
}

/// Lets an executor move the task's progress checkpoint forward.
pub struct ProgressReporter {
    store: Arc<dyn TaskStore>,
    events: Arc<EventBus>,
    task_id: String,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn TaskStore>, events: Arc<EventBus>, task_id: impl Into<String>) -> Self {
        Self {
            store,
            events,
            task_id: task_id.into(),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub async fn checkpoint(&self, value: u8) {
        match self
            .store
            .update(&self.task_id, Box::new(move |r| r.advance(value)))
            .await
        {
            Ok(record) => self.events.publish(DomainEvent::TaskStatusChanged {
                task_id: record.task_id,
                status: record.status,
                progress: record.progress,
                timestamp: Utc::now(),
            }),
            Err(e) => debug!(task_id = %self.task_id, error = %e, "Progress checkpoint skipped"),
        }
    }
}

/// Runs one research request to completion.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(
        &self,
        request: &ResearchRequest,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<TaskOutput, delve_core::Error>;
}

/// Builds a fresh [`ResearchAgent`] per task, so tasks never share memory.
pub struct AgentExecutor {
    provider: Arc<dyn Provider>,
    settings: AgentSettings,
    events: Option<Arc<EventBus>>,
}

impl AgentExecutor {
    pub fn new(provider: Arc<dyn Provider>, settings: AgentSettings) -> Self {
        Self {
            provider,
            settings,
            events: None,
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }
}

#[async_trait]
impl TaskExecutor for AgentExecutor {
    async fn execute(
        &self,
        request: &ResearchRequest,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<TaskOutput, delve_core::Error> {
        let settings = AgentSettings {
            max_iterations: request.max_iterations,
            ..self.settings.clone()
        };
        let mut agent = ResearchAgent::new(Arc::clone(&self.provider), settings);
        if let Some(bus) = &self.events {
            agent = agent.with_event_bus(Arc::clone(bus));
        }
        progress.checkpoint(delve_core::task::progress::AGENT_READY).await;

        let outcome = agent.research_until(&request.query, cancel).await?;
        progress.checkpoint(delve_core::task::progress::LOOP_FINISHED).await;

        let mut files_generated = agent.generated_files();
        if request.create_report && files_generated.is_empty() {
            let title: String = request.query.chars().take(REPORT_TITLE_CHARS).collect();
            match delve_tools::write_report(agent.reports_dir(), title.trim(), &outcome.answer).await {
                Ok(path) => {
                    info!(task_id = progress.task_id(), path = %path.display(), "Report written for task");
                    files_generated.push(path.display().to_string());
                }
                Err(e) => warn!(task_id = progress.task_id(), error = %e, "Could not write task report"),
            }
        }

        Ok(TaskOutput {
            result: outcome.answer,
            files_generated,
            truncated: outcome.truncated,
        })
    }
}
