//! Background research tasks for Delve.
//!
//! Clients submit a research request, get a task id back immediately and
//! poll for the outcome. The [`TaskManager`] owns the queue and the worker
//! pool; [`AgentExecutor`] runs one request through a fresh research agent.

pub mod executor;
pub mod manager;
pub mod store;

pub use executor::{AgentExecutor, ProgressReporter, TaskExecutor, TaskOutput};
pub use manager::{NO_RESULT, TaskCounts, TaskManager, TaskManagerConfig};
pub use store::InMemoryTaskStore;
