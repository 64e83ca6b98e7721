//! Research-topic annotation.
//!
//! Topics are a best-effort hint for the next prompt. The conversation log
//! stays authoritative; an annotator only ever reads a human turn and
//! suggests fragments.

/// Derives research topics from a human message.
pub trait TopicAnnotator: Send + Sync {
    /// Candidate topics found in `message`, in discovery order.
    fn annotate(&self, message: &str) -> Vec<String>;
}

pub const RESEARCH_KEYWORDS: &[&str] = &[
    "research",
    "analyze",
    "study",
    "investigate",
    "examine",
    "explore",
    "report",
    "trends",
    "statistics",
    "data",
];

/// Words taken after a keyword to form a topic.
const TOPIC_WORDS: usize = 3;

/// Finds a keyword and keeps the few words that follow it.
///
/// For every keyword present in the message, the first word equal to the
/// keyword (ignoring case) is located and up to three following words
/// become the topic, with `?` and `.` removed. Fragments of three
/// characters or fewer are ignored.
#[derive(Debug, Clone)]
pub struct KeywordTopicAnnotator {
    keywords: Vec<String>,
}

impl KeywordTopicAnnotator {
    pub fn new() -> Self {
        Self::with_keywords(RESEARCH_KEYWORDS.iter().copied())
    }

    pub fn with_keywords<'a>(keywords: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            keywords: keywords.into_iter().map(str::to_lowercase).collect(),
        }
    }
}

impl Default for KeywordTopicAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicAnnotator for KeywordTopicAnnotator {
    fn annotate(&self, message: &str) -> Vec<String> {
        let lower = message.to_lowercase();
        let words: Vec<&str> = message.split_whitespace().collect();
        let mut topics: Vec<String> = Vec::new();

        for keyword in &self.keywords {
            if !lower.contains(keyword.as_str()) {
                continue;
            }

            let found = words
                .iter()
                .enumerate()
                .find(|(i, w)| w.to_lowercase() == *keyword && i + 1 < words.len());

            if let Some((i, _)) = found {
                let end = (i + 1 + TOPIC_WORDS).min(words.len());
                let topic = words[i + 1..end]
                    .join(" ")
                    .replace(['?', '.'], "")
                    .trim()
                    .to_string();
                if topic.chars().count() > 3 && !topics.contains(&topic) {
                    topics.push(topic);
                }
            }
        }

        topics
    }
}
