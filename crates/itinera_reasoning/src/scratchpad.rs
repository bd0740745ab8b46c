//! Append-only record of one reasoning run.

use crate::api_types::Message;
use itinera_core::tools::{ToolErrorKind, ToolOutcome};
use serde::Serialize;
use serde_json::{json, Value};

/// A tool call the model asked for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScratchpadEntry {
    pub thought: String,
    pub action: Option<ToolCall>,
    pub observation: Option<String>,
    pub is_final: bool,
    /// Error kind of the tool invocation, `None` when it succeeded or no tool ran.
    pub outcome: Option<ToolErrorKind>,
}

impl ScratchpadEntry {
    pub fn action(thought: String, call: ToolCall, result: &ToolOutcome) -> Self {
        Self {
            thought,
            action: Some(call),
            observation: Some(result.content.clone()),
            is_final: false,
            outcome: result.error_kind,
        }
    }

    pub fn final_answer(thought: String) -> Self {
        Self {
            thought,
            action: None,
            observation: None,
            is_final: true,
            outcome: None,
        }
    }

    /// A reply that carried no usable intent. `nudge` is fed back so the model
    /// can correct its format.
    pub fn noop(reply: String, nudge: &str) -> Self {
        Self {
            thought: reply,
            action: None,
            observation: Some(nudge.to_string()),
            is_final: false,
            outcome: None,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.action.is_none() && !self.is_final
    }

    /// How the model's own turn is replayed to it.
    fn render_turn(&self) -> String {
        match &self.action {
            Some(call) => {
                let blob = json!({"action": call.name, "action_input": call.arguments});
                let blob = serde_json::to_string_pretty(&blob).unwrap_or_else(|_| blob.to_string());
                if self.thought.is_empty() {
                    format!("Action:\n```json\n{}\n```", blob)
                } else {
                    format!("Thought: {}\nAction:\n```json\n{}\n```", self.thought, blob)
                }
            }
            None => self.thought.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Scratchpad {
    entries: Vec<ScratchpadEntry>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ScratchpadEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ScratchpadEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tool calls made so far, in order.
    pub fn actions(&self) -> impl Iterator<Item = &ToolCall> {
        self.entries.iter().filter_map(|e| e.action.as_ref())
    }

    /// Chat transcript: the task, then each turn followed by its observation.
    pub fn to_messages(&self, task: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(1 + self.entries.len() * 2);
        messages.push(Message::user(task));
        for entry in &self.entries {
            messages.push(Message::assistant(entry.render_turn()));
            if let Some(ref observation) = entry.observation {
                messages.push(Message::user(format!("Observation: {}", observation)));
            }
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_types::Role;

    #[test]
    fn test_transcript_alternates_turns_and_observations() {
        let mut pad = Scratchpad::new();
        pad.push(ScratchpadEntry::action(
            "Need flights".into(),
            ToolCall {
                name: "get_flights".into(),
                arguments: json!({"origin": "Dallas"}),
            },
            &ToolOutcome::ok("[{\"airline\": \"AA\"}]"),
        ));
        pad.push(ScratchpadEntry::noop("hmm".into(), "Use the JSON format."));

        let msgs = pad.to_messages("Plan a trip");
        assert_eq!(msgs.len(), 5);
        assert_eq!(msgs[0].content, "Plan a trip");
        assert_eq!(msgs[1].role, Role::Assistant);
        assert!(msgs[1].content.starts_with("Thought: Need flights"));
        assert!(msgs[1].content.contains("\"action\": \"get_flights\""));
        assert_eq!(msgs[2].content, "Observation: [{\"airline\": \"AA\"}]");
        assert_eq!(msgs[3].content, "hmm");
        assert_eq!(msgs[4].content, "Observation: Use the JSON format.");
    }

    #[test]
    fn test_entry_records_error_kind() {
        let entry = ScratchpadEntry::action(
            String::new(),
            ToolCall {
                name: "get_weather".into(),
                arguments: json!({}),
            },
            &ToolOutcome::error(ToolErrorKind::Timeout, "timed out"),
        );
        assert_eq!(entry.outcome, Some(ToolErrorKind::Timeout));
        assert_eq!(entry.observation.as_deref(), Some("timed out"));
        assert!(!entry.is_noop());
        assert!(entry.render_turn().starts_with("Action:"));
    }

    #[test]
    fn test_actions_skip_noop_and_final_entries() {
        let mut pad = Scratchpad::new();
        pad.push(ScratchpadEntry::noop("??".into(), "nudge"));
        pad.push(ScratchpadEntry::action(
            String::new(),
            ToolCall {
                name: "get_hotels".into(),
                arguments: json!({"city": "Bangalore"}),
            },
            &ToolOutcome::ok("[]"),
        ));
        pad.push(ScratchpadEntry::final_answer("done".into()));

        let names: Vec<&str> = pad.actions().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["get_hotels"]);
        assert_eq!(pad.len(), 3);
    }
}
