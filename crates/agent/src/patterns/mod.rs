//! Agent patterns - structured reasoning strategies.
//!
//! Only ReAct is implemented: a bounded Thought → Action → Observation loop
//! over the tool registry, with a text parser for the engine's replies.

pub mod parser;
pub mod react;

pub use parser::{ParsedStep, parse};
pub use react::{AgentOutcome, DEFAULT_MAX_ITERATIONS, ITERATION_LIMIT_ANSWER, ReactAgent};

#[cfg(test)]
pub(crate) mod test_helpers;
