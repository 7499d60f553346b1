//! Final-answer selection from a run transcript.
//!
//! Selection is an ordered list of rules; each is a pure function of the
//! transcript and the first one that matches wins. The selected text is
//! then reduced to the content after a final-answer marker when present.

use std::sync::LazyLock;

use regex::Regex;

use super::message::ChatMessage;

/// A selection rule over the transcript.
type Rule = fn(&[ChatMessage]) -> Option<&ChatMessage>;

/// Rules in priority order.
const RULES: [(&str, Rule); 3] = [
    ("last_final_model_turn", last_final_model_turn),
    ("last_model_turn", last_model_turn),
    ("last_entry", last_entry),
];

/// `最终答案` or `Final Answer`, a colon, then content up to a blank line or
/// the next ReAct section label.
static FINAL_ANSWER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?is)(?:最终答案|Final\s+Answer)\s*[:：]\s*(.+?)(?:\n\s*\n|\n\s*(?:思考|Thought|行动|Action|观察|Observation)\s*[:：]|\z)",
    )
    .ok()
});

fn last_final_model_turn(transcript: &[ChatMessage]) -> Option<&ChatMessage> {
    transcript.iter().rev().find(|m| m.is_final_model_turn())
}

fn last_model_turn(transcript: &[ChatMessage]) -> Option<&ChatMessage> {
    transcript.iter().rev().find(|m| m.is_model_turn())
}

fn last_entry(transcript: &[ChatMessage]) -> Option<&ChatMessage> {
    transcript.last()
}

/// Picks the message holding the final answer.
#[must_use]
pub fn select_final(transcript: &[ChatMessage]) -> Option<&ChatMessage> {
    RULES.iter().find_map(|(name, rule)| {
        let hit = rule(transcript);
        if hit.is_some() {
            tracing::trace!(rule = name, "final answer selected");
        }
        hit
    })
}

/// Content after a final-answer marker, or the trimmed text itself.
#[must_use]
pub fn extract_final_answer(text: &str) -> String {
    FINAL_ANSWER
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| text.trim())
        .to_string()
}

/// Selects and extracts the final answer; empty when the transcript is.
#[must_use]
pub fn final_answer(transcript: &[ChatMessage]) -> String {
    select_final(transcript).map_or_else(String::new, |m| extract_final_answer(&m.content))
}
