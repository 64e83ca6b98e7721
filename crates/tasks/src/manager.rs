//! Task manager - accepts research requests and runs them in the background.
//!
//! Requests go into a bounded queue. A dispatcher takes a worker permit,
//! then a job, and spawns the job on a [`JoinSet`]; at most `max_workers`
//! jobs run at once. Every record change goes through
//! [`TaskStore::update`], so a poller only ever sees whole transitions.
//!
//! Each job carries a child of the manager's root [`CancellationToken`].
//! Cancelling a queued task fires its own token; [`TaskManager::shutdown`]
//! fires the root, which stops running agent loops between iterations.

use chrono::Utc;
use delve_core::error::TaskError;
use delve_core::event::{DomainEvent, EventBus};
use delve_core::task::{ResearchRequest, TaskRecord, TaskStatus, TaskStore};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::executor::{ProgressReporter, TaskExecutor, TaskOutput};

/// Error recorded for a run that finished without any answer text.
pub const NO_RESULT: &str = "Task produced no result";

/// Pool sizing.
#[derive(Debug, Clone, Copy)]
pub struct TaskManagerConfig {
    pub max_workers: usize,
    pub queue_capacity: usize,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            queue_capacity: 64,
        }
    }
}

impl From<&delve_config::GatewayConfig> for TaskManagerConfig {
    fn from(config: &delve_config::GatewayConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            queue_capacity: config.queue_capacity,
        }
    }
}

/// Totals reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub total: usize,
    /// Tasks currently processing.
    pub active: usize,
}

struct Job {
    task_id: String,
    request: ResearchRequest,
    cancel: CancellationToken,
}

/// Everything a worker needs, shared across jobs.
#[derive(Clone)]
struct WorkerContext {
    store: Arc<dyn TaskStore>,
    executor: Arc<dyn TaskExecutor>,
    events: Arc<EventBus>,
    tokens: Arc<Mutex<HashMap<String, CancellationToken>>>,
    root: CancellationToken,
}

pub struct TaskManager {
    ctx: WorkerContext,
    queue: mpsc::Sender<Job>,
    capacity: usize,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl TaskManager {
    /// Start the dispatcher. Must be called inside a Tokio runtime.
    pub fn new(
        store: Arc<dyn TaskStore>,
        executor: Arc<dyn TaskExecutor>,
        events: Arc<EventBus>,
        config: TaskManagerConfig,
    ) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (queue, rx) = mpsc::channel(capacity);
        let ctx = WorkerContext {
            store,
            executor,
            events,
            tokens: Arc::new(Mutex::new(HashMap::new())),
            root: CancellationToken::new(),
        };

        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));
        let handle = tokio::spawn(dispatch(ctx.clone(), rx, semaphore));
        info!(
            max_workers = config.max_workers,
            queue_capacity = capacity,
            "Task manager started"
        );

        Self {
            ctx,
            queue,
            capacity,
            dispatcher: Mutex::new(Some(handle)),
        }
    }

    /// Validate and enqueue a request. Returns the queued record at once.
    pub async fn submit(&self, request: ResearchRequest) -> Result<TaskRecord, TaskError> {
        request.validate()?;
        if self.ctx.root.is_cancelled() {
            return Err(TaskError::ShuttingDown);
        }

        let slot = match self.queue.try_reserve() {
            Ok(slot) => slot,
            Err(TrySendError::Full(())) => {
                warn!(capacity = self.capacity, "Task queue full, rejecting request");
                return Err(TaskError::QueueFull {
                    capacity: self.capacity,
                });
            }
            Err(TrySendError::Closed(())) => return Err(TaskError::ShuttingDown),
        };

        let record = TaskRecord::new(&request);
        let cancel = self.ctx.root.child_token();
        self.ctx.store.put(record.clone()).await;
        self.ctx
            .tokens
            .lock()
            .await
            .insert(record.task_id.clone(), cancel.clone());
        self.ctx.publish(&record);

        slot.send(Job {
            task_id: record.task_id.clone(),
            request,
            cancel,
        });

        info!(task_id = %record.task_id, "Research task queued");
        Ok(record)
    }

    pub async fn status(&self, task_id: &str) -> Result<TaskRecord, TaskError> {
        self.ctx
            .store
            .get(task_id)
            .await
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))
    }

    /// Same record as [`status`](Self::status); the HTTP layer shows more of it.
    pub async fn result(&self, task_id: &str) -> Result<TaskRecord, TaskError> {
        self.status(task_id).await
    }

    /// Cancel a queued task. Any other state is rejected.
    pub async fn cancel(&self, task_id: &str) -> Result<TaskRecord, TaskError> {
        let record = self
            .ctx
            .store
            .update(task_id, Box::new(|r| r.cancel()))
            .await?;

        if let Some(token) = self.ctx.tokens.lock().await.remove(task_id) {
            token.cancel();
        }
        info!(task_id, "Research task cancelled");
        self.ctx.publish(&record);
        Ok(record)
    }

    /// All tasks, newest first.
    pub async fn list(&self) -> Vec<TaskRecord> {
        self.ctx.store.list().await
    }

    pub async fn counts(&self) -> TaskCounts {
        let tasks = self.ctx.store.list().await;
        TaskCounts {
            total: tasks.len(),
            active: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Processing)
                .count(),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.ctx.root.is_cancelled()
    }

    /// Stop accepting work, interrupt running loops and wait for workers.
    ///
    /// Running tasks end as failed; tasks still in the queue end as cancelled.
    pub async fn shutdown(&self) {
        self.ctx.root.cancel();
        let handle = self.dispatcher.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Task dispatcher ended abnormally");
            }
        }
        info!("Task manager stopped");
    }
}

async fn dispatch(ctx: WorkerContext, mut rx: mpsc::Receiver<Job>, semaphore: Arc<Semaphore>) {
    let mut workers = JoinSet::new();

    loop {
        let permit = tokio::select! {
            biased;
            _ = ctx.root.cancelled() => break,
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let job = tokio::select! {
            biased;
            _ = ctx.root.cancelled() => break,
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        workers.spawn(run_job(ctx.clone(), job, permit));
        while workers.try_join_next().is_some() {}
    }

    rx.close();
    while let Ok(job) = rx.try_recv() {
        ctx.abandon(job).await;
    }
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Task worker ended abnormally");
        }
    }
}

async fn run_job(ctx: WorkerContext, job: Job, permit: OwnedSemaphorePermit) {
    let _permit = permit;
    let task_id = job.task_id.clone();

    match ctx.store.update(&task_id, Box::new(|r| r.start())).await {
        Ok(record) => ctx.publish(&record),
        Err(TaskError::Cancelled) => {
            debug!(task_id = %task_id, "Skipping cancelled task");
            ctx.forget(&task_id).await;
            return;
        }
        Err(e) => {
            warn!(task_id = %task_id, error = %e, "Task could not start");
            ctx.forget(&task_id).await;
            return;
        }
    }

    info!(task_id = %task_id, "Research task processing");
    let progress = ProgressReporter::new(
        Arc::clone(&ctx.store),
        Arc::clone(&ctx.events),
        task_id.clone(),
    );
    let run = ctx.executor.execute(&job.request, &progress, &job.cancel);
    let outcome = AssertUnwindSafe(run).catch_unwind().await;

    let finished = match outcome {
        Ok(Ok(output)) if output.result.trim().is_empty() => {
            warn!(task_id = %task_id, "Research task produced no result");
            ctx.fail(&task_id, NO_RESULT.to_string()).await
        }
        Ok(Ok(TaskOutput {
            result,
            files_generated,
            truncated,
        })) => {
            ctx.store
                .update(
                    &task_id,
                    Box::new(move |r| r.complete(result, files_generated, truncated)),
                )
                .await
        }
        Ok(Err(e)) => {
            let message = if ctx.root.is_cancelled() {
                TaskError::ShuttingDown.to_string()
            } else {
                e.to_string()
            };
            warn!(task_id = %task_id, error = %message, "Research task failed");
            ctx.fail(&task_id, message).await
        }
        Err(payload) => {
            let message = format!("Task panicked: {}", panic_message(payload.as_ref()));
            error!(task_id = %task_id, error = %message, "Research task panicked");
            ctx.fail(&task_id, message).await
        }
    };

    match finished {
        Ok(record) => {
            info!(task_id = %task_id, status = %record.status, "Research task finished");
            ctx.publish(&record);
        }
        Err(e) => error!(task_id = %task_id, error = %e, "Could not record task outcome"),
    }
    ctx.forget(&task_id).await;
}

impl WorkerContext {
    fn publish(&self, record: &TaskRecord) {
        self.events.publish(DomainEvent::TaskStatusChanged {
            task_id: record.task_id.clone(),
            status: record.status,
            progress: record.progress,
            timestamp: Utc::now(),
        });
    }

    async fn fail(&self, task_id: &str, message: String) -> Result<TaskRecord, TaskError> {
        self.events.publish(DomainEvent::ErrorOccurred {
            context: format!("task {task_id}"),
            error_message: message.clone(),
            timestamp: Utc::now(),
        });
        self.store
            .update(task_id, Box::new(move |r| r.fail(message)))
            .await
    }

    async fn forget(&self, task_id: &str) {
        self.tokens.lock().await.remove(task_id);
    }

    /// A queued job that will never run because the manager is stopping.
    async fn abandon(&self, job: Job) {
        match self.store.update(&job.task_id, Box::new(|r| r.cancel())).await {
            Ok(record) => {
                debug!(task_id = %job.task_id, "Queued task dropped at shutdown");
                self.publish(&record);
            }
            Err(e) => debug!(task_id = %job.task_id, error = %e, "Queued task already settled"),
        }
        self.forget(&job.task_id).await;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryTaskStore;
    use async_trait::async_trait;
    use delve_core::task::progress;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Scripted executor behaviours.
    enum Script {
        Answer(&'static str),
        /// Succeed with blank answer text.
        Blank,
        Fail(&'static str),
        Panic,
        /// Wait for `gate`, then answer.
        Gate(Arc<Notify>),
        /// Wait for the cancellation token.
        UntilCancelled,
    }

    struct ScriptedExecutor(Script);

    #[async_trait]
    impl TaskExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            request: &ResearchRequest,
            progress: &ProgressReporter,
            cancel: &CancellationToken,
        ) -> Result<TaskOutput, delve_core::Error> {
            progress.checkpoint(progress::AGENT_READY).await;
            match &self.0 {
                Script::Answer(text) => Ok(TaskOutput {
                    result: format!("{text}: {}", request.query),
                    ..TaskOutput::default()
                }),
                Script::Blank => Ok(TaskOutput {
                    result: " \n".into(),
                    truncated: true,
                    ..TaskOutput::default()
                }),
                Script::Fail(msg) => Err(delve_core::Error::Internal(msg.to_string())),
                Script::Panic => panic!("engine exploded"),
                Script::Gate(gate) => {
                    gate.notified().await;
                    Ok(TaskOutput {
                        result: "released".into(),
                        ..TaskOutput::default()
                    })
                }
                Script::UntilCancelled => {
                    cancel.cancelled().await;
                    Err(TaskError::Cancelled.into())
                }
            }
        }
    }

    fn manager(script: Script, config: TaskManagerConfig) -> TaskManager {
        TaskManager::new(
            Arc::new(InMemoryTaskStore::new()),
            Arc::new(ScriptedExecutor(script)),
            Arc::new(EventBus::default()),
            config,
        )
    }

    async fn wait_for(manager: &TaskManager, id: &str, status: TaskStatus) -> TaskRecord {
        for _ in 0..500 {
            let record = manager.status(id).await.unwrap();
            if record.status == status {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {id} never reached {status}");
    }

    #[tokio::test]
    async fn submit_runs_to_completion() {
        let manager = manager(Script::Answer("done"), TaskManagerConfig::default());
        let queued = manager.submit(ResearchRequest::new("tidal energy")).await.unwrap();
        assert_eq!(queued.status, TaskStatus::Queued);
        assert_eq!(queued.progress, 0);

        let done = wait_for(&manager, &queued.task_id, TaskStatus::Completed).await;
        assert_eq!(done.result.as_deref(), Some("done: tidal energy"));
        assert!(done.error.is_none());
        assert_eq!(done.progress, 100);
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn executor_error_fails_task() {
        let manager = manager(Script::Fail("engine unreachable"), TaskManagerConfig::default());
        let queued = manager.submit(ResearchRequest::new("anything")).await.unwrap();

        let failed = wait_for(&manager, &queued.task_id, TaskStatus::Failed).await;
        assert!(failed.error.as_deref().unwrap().contains("engine unreachable"));
        assert!(failed.result.is_none());
        assert_eq!(failed.progress, 100);
    }

    #[tokio::test]
    async fn blank_output_fails_task() {
        let manager = manager(Script::Blank, TaskManagerConfig::default());
        let queued = manager.submit(ResearchRequest::new("anything")).await.unwrap();

        let failed = wait_for(&manager, &queued.task_id, TaskStatus::Failed).await;
        assert_eq!(failed.error.as_deref(), Some(NO_RESULT));
        assert!(failed.result.is_none());
        assert_eq!(failed.progress, 100);
    }

    #[tokio::test]
    async fn failures_are_published_as_errors() {
        let events = Arc::new(EventBus::new(64));
        let mut rx = events.subscribe();
        let manager = TaskManager::new(
            Arc::new(InMemoryTaskStore::new()),
            Arc::new(ScriptedExecutor(Script::Fail("engine unreachable"))),
            Arc::clone(&events),
            TaskManagerConfig::default(),
        );
        let queued = manager.submit(ResearchRequest::new("doomed query")).await.unwrap();
        wait_for(&manager, &queued.task_id, TaskStatus::Failed).await;

        let mut errors = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::ErrorOccurred {
                context,
                error_message,
                ..
            } = event.as_ref()
            {
                errors.push((context.clone(), error_message.clone()));
            }
        }
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, format!("task {}", queued.task_id));
        assert!(errors[0].1.contains("engine unreachable"));
    }

    #[tokio::test]
    async fn panicking_executor_fails_task() {
        let manager = manager(Script::Panic, TaskManagerConfig::default());
        let queued = manager.submit(ResearchRequest::new("anything")).await.unwrap();

        let failed = wait_for(&manager, &queued.task_id, TaskStatus::Failed).await;
        assert_eq!(failed.error.as_deref(), Some("Task panicked: engine exploded"));

        // the pool keeps working after a panic
        let next = manager.submit(ResearchRequest::new("another")).await.unwrap();
        wait_for(&manager, &next.task_id, TaskStatus::Failed).await;
    }

    #[tokio::test]
    async fn invalid_request_is_rejected() {
        let manager = manager(Script::Answer("x"), TaskManagerConfig::default());
        let err = manager.submit(ResearchRequest::new("hi")).await.unwrap_err();
        assert!(matches!(err, TaskError::InvalidRequest(_)));
        assert!(manager.list().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let manager = manager(Script::Answer("x"), TaskManagerConfig::default());
        assert!(matches!(
            manager.status("nope").await,
            Err(TaskError::NotFound(_))
        ));
        assert!(matches!(
            manager.cancel("nope").await,
            Err(TaskError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn cancel_queued_and_reject_processing() {
        let gate = Arc::new(Notify::new());
        let manager = manager(
            Script::Gate(Arc::clone(&gate)),
            TaskManagerConfig {
                max_workers: 1,
                queue_capacity: 4,
            },
        );

        let running = manager.submit(ResearchRequest::new("first query")).await.unwrap();
        let processing = wait_for(&manager, &running.task_id, TaskStatus::Processing).await;
        assert!(processing.progress >= 25);

        let waiting = manager.submit(ResearchRequest::new("second query")).await.unwrap();
        let cancelled = manager.cancel(&waiting.task_id).await.unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);
        assert_eq!(cancelled.progress, 100);

        let err = manager.cancel(&running.task_id).await.unwrap_err();
        assert!(matches!(err, TaskError::NotCancellable { .. }));

        gate.notify_one();
        let done = wait_for(&manager, &running.task_id, TaskStatus::Completed).await;
        assert_eq!(done.result.as_deref(), Some("released"));

        // the cancelled task never starts
        tokio::time::sleep(Duration::from_millis(50)).await;
        let still = manager.status(&waiting.task_id).await.unwrap();
        assert_eq!(still.status, TaskStatus::Cancelled);
        assert!(still.result.is_none() && still.error.is_none());

        let err = manager.cancel(&running.task_id).await.unwrap_err();
        assert!(matches!(err, TaskError::NotCancellable { .. }));
    }

    #[tokio::test]
    async fn full_queue_rejects_submission() {
        let gate = Arc::new(Notify::new());
        let manager = manager(
            Script::Gate(Arc::clone(&gate)),
            TaskManagerConfig {
                max_workers: 1,
                queue_capacity: 1,
            },
        );

        let running = manager.submit(ResearchRequest::new("occupies worker")).await.unwrap();
        wait_for(&manager, &running.task_id, TaskStatus::Processing).await;

        manager.submit(ResearchRequest::new("fills queue")).await.unwrap();
        let err = manager.submit(ResearchRequest::new("overflow")).await.unwrap_err();
        assert!(matches!(err, TaskError::QueueFull { capacity: 1 }));
        assert_eq!(manager.counts().await, TaskCounts { total: 2, active: 1 });

        gate.notify_one();
    }

    #[tokio::test]
    async fn shutdown_interrupts_running_tasks() {
        let manager = manager(
            Script::UntilCancelled,
            TaskManagerConfig {
                max_workers: 1,
                queue_capacity: 4,
            },
        );
        let running = manager.submit(ResearchRequest::new("long research")).await.unwrap();
        wait_for(&manager, &running.task_id, TaskStatus::Processing).await;
        let queued = manager.submit(ResearchRequest::new("never started")).await.unwrap();

        manager.shutdown().await;

        let failed = manager.status(&running.task_id).await.unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("Task interrupted: shutting down"));

        let dropped = manager.status(&queued.task_id).await.unwrap();
        assert_eq!(dropped.status, TaskStatus::Cancelled);

        assert!(manager.is_shutting_down());
        let err = manager.submit(ResearchRequest::new("too late")).await.unwrap_err();
        assert!(matches!(err, TaskError::ShuttingDown));
    }

    #[tokio::test]
    async fn status_is_idempotent_and_list_newest_first() {
        let manager = manager(Script::Answer("ok"), TaskManagerConfig::default());
        let first = manager.submit(ResearchRequest::new("first query")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = manager.submit(ResearchRequest::new("second query")).await.unwrap();

        let done = wait_for(&manager, &first.task_id, TaskStatus::Completed).await;
        let again = manager.status(&first.task_id).await.unwrap();
        assert_eq!(done.status, again.status);
        assert_eq!(done.result, again.result);
        assert_eq!(done.completed_at, again.completed_at);

        let ids: Vec<String> = manager.list().await.into_iter().map(|t| t.task_id).collect();
        assert_eq!(ids, vec![second.task_id, first.task_id]);
    }

    #[tokio::test]
    async fn publishes_status_changes() {
        let events = Arc::new(EventBus::new(64));
        let mut rx = events.subscribe();
        let manager = TaskManager::new(
            Arc::new(InMemoryTaskStore::new()),
            Arc::new(ScriptedExecutor(Script::Answer("ok"))),
            Arc::clone(&events),
            TaskManagerConfig::default(),
        );
        let queued = manager.submit(ResearchRequest::new("events please")).await.unwrap();
        wait_for(&manager, &queued.task_id, TaskStatus::Completed).await;

        let mut progress_seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::TaskStatusChanged { progress, .. } = event.as_ref() {
                progress_seen.push(*progress);
            }
        }
        assert_eq!(progress_seen, vec![0, 25, 50, 100]);
    }
}
