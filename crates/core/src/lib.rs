//! # Delve Core
//!
//! Domain types, traits, and error definitions for the Delve research agent.
//! This crate has **zero framework dependencies** - it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod task;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, TaskError, ToolError};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use tool::{Tool, ToolDescriptor, ToolRegistry};
pub use task::{ResearchRequest, TaskMutation, TaskRecord, TaskStatus, TaskStore};
pub use event::{DomainEvent, EventBus};
