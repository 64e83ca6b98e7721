//! Parser for ReAct-formatted engine replies.
//!
//! A reply is one of:
//! - an action: `Action: <tool>` followed by `Action Input: <text>`
//! - a final answer: `Final Answer: <text>`
//! - anything else, which is a format fault the loop reports back
//!
//! When a reply holds both, whichever marker comes first decides. Text the
//! engine invents after the action input (a fake `Observation:`) is dropped.

const ACTION: &str = "Action:";
const ACTION_INPUT: &str = "Action Input:";
const FINAL_ANSWER: &str = "Final Answer:";
const OBSERVATION: &str = "Observation:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedStep {
    Action {
        thought: String,
        tool: String,
        input: String,
    },
    FinalAnswer {
        thought: String,
        answer: String,
    },
    Fault(String),
}

pub fn parse(reply: &str) -> ParsedStep {
    let final_at = reply.find(FINAL_ANSWER);
    let action_at = find_action(reply);

    match (action_at, final_at) {
        (Some(a), Some(f)) if a < f => parse_action(reply, a),
        (Some(a), None) => parse_action(reply, a),
        (_, Some(f)) => {
            let answer = reply[f + FINAL_ANSWER.len()..].trim();
            if answer.is_empty() {
                return ParsedStep::Fault(
                    "Invalid format: 'Final Answer:' is followed by no answer".to_string(),
                );
            }
            ParsedStep::FinalAnswer {
                thought: clean_thought(&reply[..f]),
                answer: answer.to_string(),
            }
        }
        (None, None) => {
            ParsedStep::Fault("Invalid format: missing 'Action:' after 'Thought:'".to_string())
        }
    }
}

/// Byte offset of the first `Action:` that is not part of `Action Input:`.
fn find_action(reply: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(rel) = reply[from..].find("Action") {
        let at = from + rel;
        if reply[at..].starts_with(ACTION) {
            return Some(at);
        }
        from = at + "Action".len();
    }
    None
}

fn parse_action(reply: &str, at: usize) -> ParsedStep {
    let after = &reply[at + ACTION.len()..];
    let Some(input_rel) = after.find(ACTION_INPUT) else {
        return ParsedStep::Fault(
            "Invalid format: missing 'Action Input:' after 'Action:'".to_string(),
        );
    };

    let tool = after[..input_rel].trim().to_string();
    if tool.is_empty() {
        return ParsedStep::Fault("Invalid format: 'Action:' names no tool".to_string());
    }

    let mut input = &after[input_rel + ACTION_INPUT.len()..];
    if let Some(obs) = input.find(OBSERVATION) {
        input = &input[..obs];
    }
    let input = input.trim().trim_matches('"').to_string();

    ParsedStep::Action {
        thought: clean_thought(&reply[..at]),
        tool,
        input,
    }
}

fn clean_thought(text: &str) -> String {
    let text = text.trim();
    text.strip_prefix("Thought:").unwrap_or(text).trim().to_string()
}
