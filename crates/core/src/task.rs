//! Background research task records and their store.
//!
//! A task moves through a small state machine:
//!
//! ```text
//! queued ──▶ processing ──▶ completed
//!   │             └───────▶ failed
//!   └──▶ cancelled
//! ```
//!
//! Every transition is a method on [`TaskRecord`] that either applies all
//! of its field changes or none of them. [`TaskStore::update`] runs such a
//! transition under the store's lock so readers never observe a half-applied
//! record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TaskError;

pub const MIN_QUERY_CHARS: usize = 3;
pub const MAX_QUERY_CHARS: usize = 1000;
pub const MIN_ITERATIONS: u32 = 1;
pub const MAX_ITERATIONS: u32 = 20;
pub const DEFAULT_ITERATIONS: u32 = 10;

/// Progress checkpoints reported while a task runs.
pub mod progress {
    pub const QUEUED: u8 = 0;
    pub const STARTED: u8 = 25;
    pub const AGENT_READY: u8 = 50;
    pub const LOOP_FINISHED: u8 = 75;
    pub const DONE: u8 = 100;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to research something in the background.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub query: String,

    #[serde(default = "default_iterations")]
    pub max_iterations: u32,

    #[serde(default)]
    pub create_report: bool,
}

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

impl ResearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_iterations: DEFAULT_ITERATIONS,
            create_report: false,
        }
    }

    /// Check the request against the accepted bounds.
    pub fn validate(&self) -> Result<(), TaskError> {
        let chars = self.query.chars().count();
        if chars < MIN_QUERY_CHARS {
            return Err(TaskError::InvalidRequest(format!(
                "query must be at least {MIN_QUERY_CHARS} characters"
            )));
        }
        if chars > MAX_QUERY_CHARS {
            return Err(TaskError::InvalidRequest(format!(
                "query must be at most {MAX_QUERY_CHARS} characters"
            )));
        }
        if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&self.max_iterations) {
            return Err(TaskError::InvalidRequest(format!(
                "max_iterations must be between {MIN_ITERATIONS} and {MAX_ITERATIONS}"
            )));
        }
        Ok(())
    }
}

/// The externally visible state of one background research task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub status: TaskStatus,
    pub query: String,
    pub max_iterations: u32,
    pub create_report: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: u8,
    pub result: Option<String>,
    pub error: Option<String>,
    pub files_generated: Vec<String>,
    /// The agent loop hit its iteration cap and the result is its last raw output.
    pub truncated: bool,
}

impl TaskRecord {
    pub fn new(request: &ResearchRequest) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            status: TaskStatus::Queued,
            query: request.query.clone(),
            max_iterations: request.max_iterations,
            create_report: request.create_report,
            created_at: Utc::now(),
            completed_at: None,
            progress: progress::QUEUED,
            result: None,
            error: None,
            files_generated: Vec::new(),
            truncated: false,
        }
    }

    /// queued → processing
    pub fn start(&mut self) -> Result<(), TaskError> {
        match self.status {
            TaskStatus::Queued => {
                self.status = TaskStatus::Processing;
                self.progress = progress::STARTED;
                Ok(())
            }
            TaskStatus::Cancelled => Err(TaskError::Cancelled),
            other => Err(TaskError::Execution(format!(
                "task {} cannot start from {other}",
                self.task_id
            ))),
        }
    }

    /// Move the progress checkpoint forward while processing.
    pub fn advance(&mut self, checkpoint: u8) -> Result<(), TaskError> {
        self.require_processing()?;
        self.progress = self.progress.max(checkpoint.min(progress::LOOP_FINISHED));
        Ok(())
    }

    /// processing → completed
    pub fn complete(
        &mut self,
        result: String,
        files_generated: Vec<String>,
        truncated: bool,
    ) -> Result<(), TaskError> {
        self.require_processing()?;
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.error = None;
        self.files_generated = files_generated;
        self.truncated = truncated;
        self.finish();
        Ok(())
    }

    /// processing → failed
    pub fn fail(&mut self, error: String) -> Result<(), TaskError> {
        self.require_processing()?;
        self.status = TaskStatus::Failed;
        self.error = Some(error);
        self.result = None;
        self.finish();
        Ok(())
    }

    /// queued → cancelled. Any other state rejects the cancel.
    pub fn cancel(&mut self) -> Result<(), TaskError> {
        if self.status != TaskStatus::Queued {
            return Err(TaskError::NotCancellable {
                task_id: self.task_id.clone(),
                status: self.status.to_string(),
            });
        }
        self.status = TaskStatus::Cancelled;
        self.finish();
        Ok(())
    }

    fn finish(&mut self) {
        self.progress = progress::DONE;
        self.completed_at = Some(Utc::now());
    }

    fn require_processing(&self) -> Result<(), TaskError> {
        if self.status == TaskStatus::Processing {
            Ok(())
        } else {
            Err(TaskError::Execution(format!(
                "task {} is {}, not processing",
                self.task_id, self.status
            )))
        }
    }
}

/// A transition applied atomically by [`TaskStore::update`].
pub type TaskMutation = Box<dyn FnOnce(&mut TaskRecord) -> Result<(), TaskError> + Send>;

/// Storage for task records.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert or replace a record.
    async fn put(&self, record: TaskRecord);

    /// Fetch a snapshot of one record.
    async fn get(&self, task_id: &str) -> Option<TaskRecord>;

    /// Snapshot of every record, newest first.
    async fn list(&self) -> Vec<TaskRecord>;

    /// Apply `mutation` to a copy of the record and store the copy only if
    /// the mutation succeeds. Returns the stored record.
    async fn update(&self, task_id: &str, mutation: TaskMutation) -> Result<TaskRecord, TaskError>;
}
