//! What the engine sees each iteration: the prompt and the transcript it
//! is built from.

pub mod prompt;
pub mod transcript;

pub use prompt::PromptBuilder;
pub use transcript::{EntryKind, Transcript, TranscriptEntry};
