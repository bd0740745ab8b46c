//! Parse a model reply into a single intent.
//!
//! The model is asked to answer in the structured-chat ReAct format: an
//! optional `Thought:` line followed by one JSON blob
//! `{"action": "<tool>", "action_input": {...}}`, with `"Final Answer"` as the
//! action name when it is done. Replies drift from that format in a handful of
//! ways, so candidates are tried in priority order:
//! 1. JSON inside fenced code blocks
//! 2. the whole reply as JSON
//! 3. the outermost `{ ... }` span
//! 4. a plain-text `Final Answer:` marker

use crate::scratchpad::ToolCall;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static RE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("static regex"));
static RE_FINAL_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)final\s+answer\s*:\s*(.*)$").expect("static regex"));
static RE_THOUGHT_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*thought\s*:\s*").expect("static regex"));
static RE_ACTION_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*action\s*:\s*$").expect("static regex"));

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Action { thought: String, call: ToolCall },
    Final { thought: String, answer: String },
    /// Neither an action nor a final answer. `answer_candidate` holds a JSON
    /// object found in the reply, kept as best-effort output.
    Malformed {
        text: String,
        answer_candidate: Option<String>,
    },
}

struct Candidate<'a> {
    /// Byte offset where the candidate starts in the reply.
    start: usize,
    json: &'a str,
}

pub fn parse_intent(reply: &str) -> Intent {
    let mut answer_candidate = None;

    for candidate in candidates(reply) {
        let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(candidate.json.trim()) else {
            continue;
        };
        let thought = clean_thought(&reply[..candidate.start]);
        match intent_from_object(obj, thought) {
            Some(intent) => return intent,
            None => {
                if answer_candidate.is_none() {
                    answer_candidate = Some(candidate.json.trim().to_string());
                }
            }
        }
    }

    if let Some(caps) = RE_FINAL_MARKER.captures(reply) {
        let whole = caps.get(0).map_or(0, |m| m.start());
        let answer = caps.get(1).map_or("", |m| m.as_str()).trim();
        if !answer.is_empty() {
            return Intent::Final {
                thought: clean_thought(&reply[..whole]),
                answer: answer.to_string(),
            };
        }
    }

    Intent::Malformed {
        text: reply.to_string(),
        answer_candidate,
    }
}

fn candidates(reply: &str) -> Vec<Candidate<'_>> {
    let mut out: Vec<Candidate<'_>> = RE_FENCE
        .captures_iter(reply)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let inner = caps.get(1)?;
            Some(Candidate {
                start: whole.start(),
                json: inner.as_str(),
            })
        })
        .collect();

    out.push(Candidate {
        start: 0,
        json: reply,
    });

    if let (Some(open), Some(close)) = (reply.find('{'), reply.rfind('}')) {
        if open < close {
            out.push(Candidate {
                start: open,
                json: &reply[open..=close],
            });
        }
    }
    out
}

fn intent_from_object(mut obj: Map<String, Value>, thought: String) -> Option<Intent> {
    if let Some(Value::String(action)) = obj.get("action") {
        let action = action.trim().to_string();
        let input = obj.remove("action_input").unwrap_or(Value::Null);
        if is_final_action(&action) {
            return Some(Intent::Final {
                thought,
                answer: payload_text(input),
            });
        }
        if action.is_empty() {
            return None;
        }
        return Some(Intent::Action {
            thought,
            call: ToolCall {
                name: action,
                arguments: decode_arguments(input),
            },
        });
    }

    obj.remove("final_answer").map(|answer| Intent::Final {
        thought,
        answer: payload_text(answer),
    })
}

fn is_final_action(action: &str) -> bool {
    let normalized: String = action
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect();
    normalized.eq_ignore_ascii_case("finalanswer")
}

/// A final answer is text; structured payloads are re-serialized.
fn payload_text(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Models sometimes send `action_input` as a JSON string holding the object.
fn decode_arguments(input: Value) -> Value {
    if let Value::String(ref s) = input {
        if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(s.trim()) {
            return Value::Object(obj);
        }
    }
    input
}

fn clean_thought(prefix: &str) -> String {
    let without_action = RE_ACTION_LABEL.replace(prefix.trim_end(), "");
    RE_THOUGHT_LABEL
        .replace(&without_action, "")
        .trim()
        .to_string()
}
