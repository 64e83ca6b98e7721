//! The research agent - a bounded ReAct loop over the built-in tools.
//!
//! 1. **Build the prompt** (tool catalogue + memory context + transcript)
//! 2. **Call the reasoning engine** through the configured provider
//! 3. **Parse the reply** into an action or a final answer
//! 4. **If action**: run the tool, record the observation, loop to step 1
//! 5. **If final answer**: record it in memory and return it
//!
//! The loop also stops at the iteration cap or when its cancellation token
//! fires.

pub mod context;
pub mod engine;
pub mod patterns;
pub mod research;

pub use context::{EntryKind, PromptBuilder, Transcript, TranscriptEntry};
pub use engine::ReasoningEngine;
pub use patterns::{AgentOutcome, ITERATION_LIMIT_ANSWER, ParsedStep, ReactAgent, parse};
pub use research::{AgentInfo, AgentSettings, ResearchAgent};
pub use tokio_util::sync::CancellationToken;
