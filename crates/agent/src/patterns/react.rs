//! ReAct pattern - Thought → Action → Observation loop.
//!
//! The engine reasons step by step, choosing tools to gather information,
//! then writes a final answer. Every step is recorded in the transcript and
//! the whole transcript is replayed in the next prompt.
//!
//! # Termination
//!
//! - `Final Answer:` in a reply ends the run with that answer.
//! - A reply that is neither an action nor an answer is reported back as an
//!   `Invalid format` observation and the engine tries again.
//! - After `max_iterations` engine calls the last raw reply is returned as a
//!   degraded answer with `truncated` set.
//! - A fired cancellation token stops the run before the next engine call.

use chrono::Utc;
use delve_core::error::TaskError;
use delve_core::event::{DomainEvent, EventBus};
use delve_core::tool::ToolRegistry;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::{PromptBuilder, Transcript};
use crate::engine::ReasoningEngine;
use crate::patterns::parser::{ParsedStep, parse};

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Answer given at the iteration cap when the last reply has no text.
pub const ITERATION_LIMIT_ANSWER: &str = "Agent stopped due to iteration limit or time limit.";

pub struct ReactAgent {
    engine: ReasoningEngine,
    tools: Arc<ToolRegistry>,
    max_iterations: u32,
    event_bus: Option<Arc<EventBus>>,
}

/// The result of a ReAct run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentOutcome {
    /// The final answer text.
    pub answer: String,
    /// Set when the iteration cap forced the answer.
    pub truncated: bool,
    /// Engine calls made.
    pub iterations: u32,
    pub tool_calls_made: usize,
    /// Complete reasoning transcript.
    pub transcript: Transcript,
}

impl ReactAgent {
    pub fn new(engine: ReasoningEngine, tools: Arc<ToolRegistry>) -> Self {
        Self {
            engine,
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            event_bus: None,
        }
    }

    /// Set max iterations (at least one).
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    /// Run the loop for `query` with `context` from conversation memory.
    ///
    /// Only cancellation produces an error; everything else ends in an
    /// outcome.
    pub async fn run(
        &self,
        query: &str,
        context: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentOutcome, delve_core::Error> {
        let prompts = PromptBuilder::new(self.tools.list());
        let mut transcript = Transcript::new();
        let mut tool_calls_made = 0usize;
        let mut last_reply = String::new();

        info!(model = %self.engine.model(), max_iter = self.max_iterations, "ReAct loop starting");

        for iteration in 1..=self.max_iterations {
            if cancel.is_cancelled() {
                warn!(iteration, "ReAct loop cancelled");
                return Err(TaskError::Cancelled.into());
            }

            debug!(iteration, "ReAct iteration");

            let prompt = prompts.build(query, context, &transcript);
            let started = Instant::now();
            let reply = self.engine.complete(&prompt).await;
            self.publish(DomainEvent::EngineResponded {
                iteration,
                duration_ms: started.elapsed().as_millis() as u64,
                response_chars: reply.chars().count(),
                timestamp: Utc::now(),
            });

            match parse(&reply) {
                ParsedStep::Action {
                    thought,
                    tool,
                    input,
                } => {
                    transcript.add_thought(&thought);
                    transcript.add_action(&tool, &input);

                    info!(tool = %tool, "ReAct executing tool");
                    let started = Instant::now();
                    let observation = self.tools.invoke(&tool, &input).await;
                    self.publish(DomainEvent::ToolExecuted {
                        tool_name: tool.clone(),
                        duration_ms: started.elapsed().as_millis() as u64,
                        timestamp: Utc::now(),
                    });

                    transcript.add_observation(&observation);
                    tool_calls_made += 1;
                }
                ParsedStep::FinalAnswer { thought, answer } => {
                    if !thought.is_empty() {
                        transcript.add_thought(&thought);
                    }
                    transcript.add_final_answer(&answer);
                    info!(iterations = iteration, tool_calls_made, "ReAct loop finished");
                    return Ok(AgentOutcome {
                        answer,
                        truncated: false,
                        iterations: iteration,
                        tool_calls_made,
                        transcript,
                    });
                }
                ParsedStep::Fault(fault) => {
                    debug!(%fault, "Unparseable engine reply");
                    transcript.add_thought(&reply);
                    transcript.add_observation(&format!(
                        "{fault}. Reply with 'Action:' and 'Action Input:' lines, or with 'Final Answer:'."
                    ));
                }
            }

            last_reply = reply;
        }

        warn!(max = self.max_iterations, "ReAct: max iterations reached");
        let answer = match last_reply.trim() {
            "" => ITERATION_LIMIT_ANSWER.to_string(),
            text => text.to_string(),
        };
        Ok(AgentOutcome {
            answer,
            truncated: true,
            iterations: self.max_iterations,
            tool_calls_made,
            transcript,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EntryKind;
    use crate::patterns::test_helpers::SequentialMockProvider;
    use async_trait::async_trait;
    use delve_core::tool::Tool;

    struct AddTool;

    #[async_trait]
    impl Tool for AddTool {
        fn name(&self) -> &str {
            "calculator"
        }
        fn description(&self) -> &str {
            "Adds things"
        }
        async fn invoke(&self, input: &str) -> String {
            format!("Result: {}", input.len())
        }
    }

    fn agent(texts: &[&str]) -> (ReactAgent, Arc<SequentialMockProvider>) {
        let provider = Arc::new(SequentialMockProvider::from_texts(texts));
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(AddTool));
        let engine = ReasoningEngine::new(provider.clone(), "mock-model");
        (ReactAgent::new(engine, Arc::new(registry)), provider)
    }

    #[tokio::test]
    async fn direct_final_answer() {
        let (agent, provider) = agent(&["I know this.\nFinal Answer: Paris"]);
        let out = agent
            .run("Capital of France?", "", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(out.answer, "Paris");
        assert!(!out.truncated);
        assert_eq!(out.iterations, 1);
        assert_eq!(out.tool_calls_made, 0);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn tool_then_answer() {
        let (agent, provider) = agent(&[
            "Thought: compute it\nAction: calculator\nAction Input: abcd",
            "Thought: I now know the final answer\nFinal Answer: four",
        ]);
        let out = agent.run("len?", "", &CancellationToken::new()).await.unwrap();

        assert_eq!(out.answer, "four");
        assert_eq!(out.tool_calls_made, 1);
        assert_eq!(out.iterations, 2);

        let kinds: Vec<EntryKind> = out.transcript.entries().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EntryKind::Thought,
                EntryKind::Action,
                EntryKind::Observation,
                EntryKind::Thought,
                EntryKind::FinalAnswer,
            ]
        );
        assert_eq!(out.transcript.entries()[2].content, "Result: 4");

        let prompts = provider.prompts();
        assert!(prompts[1].contains("Observation: Result: 4\nThought: "));
    }

    #[tokio::test]
    async fn unknown_tool_becomes_observation() {
        let (agent, _) = agent(&[
            "Action: weather\nAction Input: Paris",
            "Final Answer: unknown",
        ]);
        let out = agent.run("weather?", "", &CancellationToken::new()).await.unwrap();
        let observation = &out.transcript.entries()[2].content;
        assert!(observation.starts_with("Tool not found: weather"), "{observation}");
        assert_eq!(out.answer, "unknown");
    }

    #[tokio::test]
    async fn format_fault_is_retried() {
        let (agent, provider) = agent(&["Just some prose.", "Final Answer: fixed"]);
        let out = agent.run("q", "", &CancellationToken::new()).await.unwrap();

        assert_eq!(out.answer, "fixed");
        assert_eq!(out.iterations, 2);
        assert!(provider.prompts()[1].contains("Observation: Invalid format:"));
    }

    #[tokio::test]
    async fn iteration_cap_returns_last_reply() {
        let (agent, provider) = agent(&["rambling one", "rambling two", "rambling three"]);
        let agent = agent.with_max_iterations(3);
        let out = agent.run("q", "", &CancellationToken::new()).await.unwrap();

        assert!(out.truncated);
        assert_eq!(out.answer, "rambling three");
        assert_eq!(out.iterations, 3);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn blank_replies_at_cap_still_answer() {
        let (agent, _) = agent(&["", "   \n"]);
        let agent = agent.with_max_iterations(2);
        let out = agent.run("q", "", &CancellationToken::new()).await.unwrap();

        assert!(out.truncated);
        assert_eq!(out.answer, ITERATION_LIMIT_ANSWER);
    }

    #[tokio::test]
    async fn empty_final_answer_is_retried() {
        let (agent, provider) = agent(&["Final Answer:", "Final Answer: forty-two"]);
        let out = agent.run("q", "", &CancellationToken::new()).await.unwrap();

        assert_eq!(out.answer, "forty-two");
        assert_eq!(out.iterations, 2);
        assert!(provider.prompts()[1].contains("followed by no answer"));
    }

    #[tokio::test]
    async fn cancelled_before_first_call() {
        let (agent, provider) = agent(&["Final Answer: never"]);
        let token = CancellationToken::new();
        token.cancel();

        let err = agent.run("q", "", &token).await.unwrap_err();
        assert!(matches!(
            err,
            delve_core::Error::Task(TaskError::Cancelled)
        ));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn memory_context_reaches_prompt() {
        let (agent, provider) = agent(&["Final Answer: ok"]);
        agent
            .run("q", "Ongoing research topics: tidal power", &CancellationToken::new())
            .await
            .unwrap();
        assert!(provider.prompts()[0].contains("Ongoing research topics: tidal power"));
    }

    #[tokio::test]
    async fn publishes_engine_and_tool_events() {
        let (agent, _) = agent(&[
            "Action: calculator\nAction Input: ab",
            "Final Answer: two",
        ]);
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let agent = agent.with_event_bus(bus);
        agent.run("q", "", &CancellationToken::new()).await.unwrap();

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(match event.as_ref() {
                DomainEvent::EngineResponded { .. } => "engine",
                DomainEvent::ToolExecuted { .. } => "tool",
                _ => "other",
            });
        }
        assert_eq!(names, vec!["engine", "tool", "engine"]);
    }
}
