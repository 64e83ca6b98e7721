//! Windowed conversation memory with research-topic tracking.

use std::collections::VecDeque;

use delve_core::message::{Message, Role};
use serde::Serialize;

use crate::topics::{KeywordTopicAnnotator, TopicAnnotator};

const SNIPPET_CHARS: usize = 100;
const HISTORY_CHARS: usize = 200;

/// Sizes that bound what memory keeps and what it hands to the prompt.
#[derive(Debug, Clone, Copy)]
pub struct MemoryLimits {
    pub window: usize,
    pub max_topics: usize,
    pub context_turns: usize,
    pub context_topics: usize,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self {
            window: 10,
            max_topics: 10,
            context_turns: 4,
            context_topics: 5,
        }
    }
}

impl From<&delve_config::MemoryConfig> for MemoryLimits {
    fn from(config: &delve_config::MemoryConfig) -> Self {
        Self {
            window: config.window,
            max_topics: config.max_topics,
            context_turns: config.context_turns,
            context_topics: config.context_topics,
        }
    }
}

/// Counters reported by the `stats` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub total_messages: usize,
    pub human_messages: usize,
    pub assistant_messages: usize,
    pub research_topics_count: usize,
    pub has_session_summary: bool,
}

/// Recent turns of one session plus the topics and summary derived from them.
///
/// The turn window is the authoritative log; topics are advisory.
pub struct ConversationMemory {
    limits: MemoryLimits,
    turns: VecDeque<Message>,
    topics: Vec<String>,
    summary: String,
    annotator: Box<dyn TopicAnnotator>,
}

impl ConversationMemory {
    pub fn new(limits: MemoryLimits) -> Self {
        Self::with_annotator(limits, Box::new(KeywordTopicAnnotator::new()))
    }

    pub fn with_annotator(limits: MemoryLimits, annotator: Box<dyn TopicAnnotator>) -> Self {
        Self {
            limits,
            turns: VecDeque::with_capacity(limits.window),
            topics: Vec::new(),
            summary: String::new(),
            annotator,
        }
    }

    /// Append a turn, evicting the oldest once the window is full.
    pub fn add_turn(&mut self, role: Role, text: impl Into<String>) {
        let text = text.into();
        if role == Role::User {
            self.record_topics(&text);
        }

        self.turns.push_back(Message {
            role,
            ..Message::user(text)
        });
        while self.turns.len() > self.limits.window {
            self.turns.pop_front();
        }
    }

    pub fn add_user_message(&mut self, text: impl Into<String>) {
        self.add_turn(Role::User, text);
    }

    pub fn add_assistant_message(&mut self, text: impl Into<String>) {
        self.add_turn(Role::Assistant, text);
    }

    fn record_topics(&mut self, text: &str) {
        for topic in self.annotator.annotate(text) {
            if !self.topics.contains(&topic) {
                self.topics.push(topic);
            }
        }
        if self.topics.len() > self.limits.max_topics {
            let excess = self.topics.len() - self.limits.max_topics;
            self.topics.drain(..excess);
        }
    }

    /// Turns in the window, oldest first.
    pub fn history(&self) -> Vec<Message> {
        self.turns.iter().cloned().collect()
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.summary = summary.into();
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty() && self.topics.is_empty() && self.summary.is_empty()
    }

    /// Context block for the next agent prompt.
    pub fn context_snippet(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        let skip = self.turns.len().saturating_sub(self.limits.context_turns);
        let recent: Vec<&Message> = self.turns.iter().skip(skip).collect();
        if !recent.is_empty() {
            parts.push("Recent conversation:".to_string());
            for msg in recent {
                let role = if msg.role == Role::User { "Human" } else { "Assistant" };
                parts.push(format!("- {role}: {}", truncate(&msg.content, SNIPPET_CHARS)));
            }
        }

        if !self.topics.is_empty() {
            let skip = self.topics.len().saturating_sub(self.limits.context_topics);
            parts.push(format!(
                "\nOngoing research topics: {}",
                self.topics[skip..].join(", ")
            ));
        }

        if !self.summary.is_empty() {
            parts.push(format!("\nSession summary: {}", self.summary));
        }

        if parts.is_empty() {
            "No previous context.".to_string()
        } else {
            parts.join("\n")
        }
    }

    /// Numbered transcript for display.
    pub fn formatted_history(&self) -> String {
        if self.turns.is_empty() {
            return "No conversation history yet.".to_string();
        }

        let mut out = format!("Conversation History:\n{}\n", "=".repeat(50));
        for (i, msg) in self.turns.iter().enumerate() {
            out.push_str(&format!(
                "{}. {}: {}\n\n",
                i + 1,
                msg.role.label(),
                truncate(&msg.content, HISTORY_CHARS)
            ));
        }
        out
    }

    /// Drop turns, topics and summary together.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.topics.clear();
        self.summary.clear();
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            total_messages: self.turns.len(),
            human_messages: self.turns.iter().filter(|m| m.role == Role::User).count(),
            assistant_messages: self
                .turns
                .iter()
                .filter(|m| m.role == Role::Assistant)
                .count(),
            research_topics_count: self.topics.len(),
            has_session_summary: !self.summary.is_empty(),
        }
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(MemoryLimits::default())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_keeps_last_k_in_order() {
        let mut memory = ConversationMemory::new(MemoryLimits {
            window: 3,
            ..MemoryLimits::default()
        });
        for i in 0..7 {
            memory.add_user_message(format!("message {i}"));
        }
        let history: Vec<String> = memory.history().into_iter().map(|m| m.content).collect();
        assert_eq!(history, vec!["message 4", "message 5", "message 6"]);
    }

    #[test]
    fn topics_recorded_from_human_turns_only() {
        let mut memory = ConversationMemory::default();
        memory.add_assistant_message("I will research quantum computing breakthroughs");
        assert!(memory.topics().is_empty());

        memory.add_user_message("research quantum computing breakthroughs");
        memory.add_user_message("research quantum computing breakthroughs");
        assert_eq!(memory.topics(), &["quantum computing breakthroughs".to_string()]);
    }

    #[test]
    fn topics_capped_to_most_recent() {
        let mut memory = ConversationMemory::new(MemoryLimits {
            max_topics: 2,
            ..MemoryLimits::default()
        });
        memory.add_user_message("research alpha topic here");
        memory.add_user_message("research beta topic here");
        memory.add_user_message("research gamma topic here");
        assert_eq!(
            memory.topics(),
            &["beta topic here".to_string(), "gamma topic here".to_string()]
        );
    }

    #[test]
    fn empty_context_snippet() {
        let memory = ConversationMemory::default();
        assert_eq!(memory.context_snippet(), "No previous context.");
    }

    #[test]
    fn context_snippet_combines_turns_topics_and_summary() {
        let mut memory = ConversationMemory::default();
        memory.add_user_message("first");
        memory.add_assistant_message("second");
        memory.add_user_message("third");
        memory.add_assistant_message("fourth");
        memory.add_user_message("Please analyze electric vehicle adoption");
        memory.set_summary("EV focus");

        let snippet = memory.context_snippet();
        assert!(snippet.starts_with("Recent conversation:\n- Assistant: second"));
        assert!(!snippet.contains("first"));
        assert!(snippet.contains("- Human: Please analyze electric vehicle adoption"));
        assert!(snippet.contains("\n\nOngoing research topics: electric vehicle adoption"));
        assert!(snippet.ends_with("\n\nSession summary: EV focus"));
    }

    #[test]
    fn snippet_truncates_long_turns() {
        let mut memory = ConversationMemory::default();
        memory.add_user_message("x".repeat(150));
        let snippet = memory.context_snippet();
        assert!(snippet.contains(&format!("- Human: {}...", "x".repeat(100))));
    }

    #[test]
    fn snippet_lists_at_most_five_topics() {
        let mut memory = ConversationMemory::default();
        for name in ["one", "two", "three", "four", "five", "six"] {
            memory.add_user_message(format!("research topic {name} now"));
        }
        let snippet = memory.context_snippet();
        assert!(!snippet.contains("topic one now"));
        assert!(snippet.contains("topic two now, topic three now"));
    }

    #[test]
    fn clear_resets_everything() {
        let mut memory = ConversationMemory::default();
        memory.add_user_message("research renewable energy trends");
        memory.set_summary("energy");
        memory.clear();

        assert!(memory.history().is_empty());
        assert!(memory.topics().is_empty());
        assert_eq!(memory.summary(), "");
        assert!(memory.is_empty());
        assert_eq!(memory.context_snippet(), "No previous context.");
    }

    #[test]
    fn formatted_history_numbers_turns() {
        let mut memory = ConversationMemory::default();
        assert_eq!(memory.formatted_history(), "No conversation history yet.");

        memory.add_user_message("hello");
        memory.add_assistant_message("y".repeat(250));
        let text = memory.formatted_history();
        assert!(text.contains("1. Human: hello"));
        assert!(text.contains(&format!("2. Assistant: {}...", "y".repeat(200))));
    }

    #[test]
    fn stats_count_roles() {
        let mut memory = ConversationMemory::default();
        memory.add_user_message("study ocean data trends");
        memory.add_assistant_message("done");
        memory.set_summary("oceans");
        assert_eq!(
            memory.stats(),
            MemoryStats {
                total_messages: 2,
                human_messages: 1,
                assistant_messages: 1,
                research_topics_count: 2,
                has_session_summary: true,
            }
        );
    }

    struct NoTopics;

    impl TopicAnnotator for NoTopics {
        fn annotate(&self, _message: &str) -> Vec<String> {
            Vec::new()
        }
    }

    #[test]
    fn annotator_is_swappable() {
        let mut memory = ConversationMemory::with_annotator(MemoryLimits::default(), Box::new(NoTopics));
        memory.add_user_message("research quantum computing breakthroughs");
        assert!(memory.topics().is_empty());
        assert_eq!(memory.history().len(), 1);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("hi", 5), "hi");
    }
}
