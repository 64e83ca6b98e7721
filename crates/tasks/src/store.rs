//! In-memory task storage.

use async_trait::async_trait;
use delve_core::error::TaskError;
use delve_core::task::{TaskMutation, TaskRecord, TaskStore};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Task records kept in a map behind one lock. Records live until the
/// process exits.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, TaskRecord>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn put(&self, record: TaskRecord) {
        self.tasks
            .write()
            .await
            .insert(record.task_id.clone(), record);
    }

    async fn get(&self, task_id: &str) -> Option<TaskRecord> {
        self.tasks.read().await.get(task_id).cloned()
    }

    async fn list(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> = self.tasks.read().await.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    async fn update(&self, task_id: &str, mutation: TaskMutation) -> Result<TaskRecord, TaskError> {
        let mut tasks = self.tasks.write().await;
        let current = tasks
            .get(task_id)
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;

        let mut next = current.clone();
        mutation(&mut next)?;
        tasks.insert(task_id.to_string(), next.clone());
        Ok(next)
    }
}
