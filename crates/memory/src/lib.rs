//! Conversation memory for Delve research sessions.
//!
//! Keeps a bounded window of recent turns, the research topics annotated
//! from human turns, and an optional session summary.

pub mod conversation;
pub mod topics;

pub use conversation::{ConversationMemory, MemoryLimits, MemoryStats};
pub use topics::{KeywordTopicAnnotator, TopicAnnotator, RESEARCH_KEYWORDS};
