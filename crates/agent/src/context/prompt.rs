//! Prompt assembly for the ReAct loop.
//!
//! Every iteration sends one self-contained prompt: preamble, tool
//! catalogue, format instructions, memory context, the question and the
//! transcript so far. The engine's reply continues after the trailing
//! `Thought:`.

use delve_core::tool::ToolDescriptor;

use super::transcript::Transcript;

const PREAMBLE: &str = "You are a research assistant. Answer the research request as thoroughly \
and accurately as you can, using the tools when current information, arithmetic or a written \
report is needed. You have access to the following tools:";

const FORMAT_INSTRUCTIONS: &str = "Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question";

/// Builds the per-iteration prompt from fixed parts plus the running transcript.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    tools: Vec<ToolDescriptor>,
}

impl PromptBuilder {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self { tools }
    }

    pub fn build(&self, query: &str, context: &str, transcript: &Transcript) -> String {
        let catalogue = self
            .tools
            .iter()
            .map(|t| format!("{}: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n");
        let names = self
            .tools
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let mut prompt = String::new();
        prompt.push_str(PREAMBLE);
        prompt.push_str("\n\n");
        prompt.push_str(&catalogue);
        prompt.push_str("\n\n");
        prompt.push_str(&FORMAT_INSTRUCTIONS.replace("{tool_names}", &names));

        let context = context.trim();
        if !context.is_empty() {
            prompt.push_str("\n\nResearch context:\n");
            prompt.push_str(context);
        }

        prompt.push_str("\n\nBegin!\n\nQuestion: ");
        prompt.push_str(query);
        prompt.push_str("\nThought: ");
        prompt.push_str(&transcript.render_scratchpad());
        prompt
    }
}
