//! Transcript - the ordered reasoning record of one agent-loop run.
//!
//! Entries are append-only and numbered from 1. A transcript lives only as
//! long as the run that produced it; memory receives the final answer, never
//! the intermediate steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of transcript entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Thought,
    Action,
    Observation,
    FinalAnswer,
}

/// A single step in the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub step_index: usize,
    pub kind: EntryKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_thought(&mut self, thought: &str) {
        self.push(EntryKind::Thought, thought.trim());
    }

    /// Record a tool request as the two lines the engine is expected to emit.
    pub fn add_action(&mut self, tool: &str, input: &str) {
        self.push(
            EntryKind::Action,
            &format!("Action: {tool}\nAction Input: {input}"),
        );
    }

    pub fn add_observation(&mut self, observation: &str) {
        self.push(EntryKind::Observation, observation);
    }

    pub fn add_final_answer(&mut self, answer: &str) {
        self.push(EntryKind::FinalAnswer, answer);
    }

    fn push(&mut self, kind: EntryKind, content: &str) {
        self.entries.push(TranscriptEntry {
            step_index: self.entries.len() + 1,
            kind,
            content: content.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the transcript as the scratchpad that follows `Thought:` in the
    /// next prompt.
    pub fn render_scratchpad(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            match entry.kind {
                EntryKind::Thought | EntryKind::Action => {
                    out.push_str(&entry.content);
                    out.push('\n');
                }
                EntryKind::Observation => {
                    out.push_str(&format!("Observation: {}\nThought: ", entry.content));
                }
                EntryKind::FinalAnswer => {
                    out.push_str(&format!("Final Answer: {}\n", entry.content));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_numbered_from_one() {
        let mut t = Transcript::new();
        t.add_thought("I should search");
        t.add_action("web_search", "rust 2024 edition");
        t.add_observation("It shipped with Rust 1.85.");

        let indices: Vec<usize> = t.entries().iter().map(|e| e.step_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(t.entries()[1].kind, EntryKind::Action);
    }

    #[test]
    fn scratchpad_layout() {
        let mut t = Transcript::new();
        t.add_thought("I need the sum");
        t.add_action("calculator", "2 + 2");
        t.add_observation("Result: 4");

        assert_eq!(
            t.render_scratchpad(),
            "I need the sum\nAction: calculator\nAction Input: 2 + 2\nObservation: Result: 4\nThought: "
        );
    }

    #[test]
    fn empty_scratchpad() {
        assert_eq!(Transcript::new().render_scratchpad(), "");
        assert!(Transcript::new().is_empty());
    }

    #[test]
    fn kinds_serialize_snake_case() {
        let json = serde_json::to_string(&EntryKind::FinalAnswer).unwrap();
        assert_eq!(json, "\"final_answer\"");
    }
}
