//! Property-based tests for intent parsing, plan extraction and loop
//! termination.

use anyhow::Result;
use async_trait::async_trait;
use itinera_core::config::UnavailablePolicy;
use itinera_core::tools::{ToolDescriptor, ToolInputSchema, ToolOutcome, ToolProvider};
use itinera_reasoning::extraction::{extract, ExtractionOutcome};
use itinera_reasoning::intent::{parse_intent, Intent};
use itinera_reasoning::react_loop::{LoopResult, Reasoner, ReasoningLoop, Transcript};
use itinera_reasoning::{ToolCatalog, ToolInvoker};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Intent parsing
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// **Never panics** on arbitrary Unicode, including stray braces and fences.
    #[test]
    fn parse_intent_never_panics(s in "\\PC{0,600}") {
        let _ = parse_intent(&s);
    }

    #[test]
    fn parse_intent_never_panics_on_json_fragments(s in "[{}\"`:a-z ,\\n]{0,200}") {
        let _ = parse_intent(&s);
    }

    /// Any well-formed action blob yields that action, whatever prose surrounds it.
    #[test]
    fn fenced_action_is_recovered(
        name in "[a-z][a-z_]{0,20}",
        city in "[A-Za-z ]{1,20}",
        prose in "[A-Za-z .,]{0,80}",
    ) {
        prop_assume!(!name.replace('_', "").eq_ignore_ascii_case("finalanswer"));
        let blob = json!({"action": name, "action_input": {"city": city}});
        let reply = format!("{}\n```json\n{}\n```", prose, blob);
        match parse_intent(&reply) {
            Intent::Action { call, .. } => {
                prop_assert_eq!(call.name, name);
                prop_assert_eq!(call.arguments, json!({"city": city}));
            }
            other => prop_assert!(false, "Expected action, got {:?}", other),
        }
    }
}

// ============================================================================
// Extraction
// ============================================================================

fn plan_with_summary(summary: &str) -> Value {
    json!({
        "trip_summary": summary,
        "flights": [],
        "accommodations": [],
        "weather": {"forecast": "", "temperature": "", "precipitation": ""},
        "local_events": [],
        "itinerary": []
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Invalid output always carries the raw text byte for byte.
    #[test]
    fn extract_preserves_raw_text(s in "\\PC{0,400}") {
        if let ExtractionOutcome::Invalid { raw_text, .. } = extract(&s) {
            prop_assert_eq!(raw_text, s);
        }
    }

    /// Wrapping a plan in a fenced block does not change the result.
    #[test]
    fn fenced_plan_equals_bare_plan(summary in "[A-Za-z0-9 ,.]{0,60}", tagged in any::<bool>()) {
        let body = plan_with_summary(&summary).to_string();
        let fenced = if tagged {
            format!("Plan below\n```json\n{}\n```", body)
        } else {
            format!("```\n{}\n```", body)
        };
        let bare = extract(&body);
        prop_assert!(bare.is_valid());
        prop_assert_eq!(extract(&fenced), bare);
    }

    /// Dropping any section is reported, never silently accepted.
    #[test]
    fn dropped_section_is_invalid(idx in 0usize..6) {
        let mut plan = plan_with_summary("x");
        let key = plan.as_object().unwrap().keys().nth(idx).unwrap().clone();
        plan.as_object_mut().unwrap().remove(&key);
        prop_assert!(!extract(&plan.to_string()).is_valid());
    }
}

// ============================================================================
// Loop termination
// ============================================================================

struct OneTool;

#[async_trait]
impl ToolProvider for OneTool {
    fn name(&self) -> &str {
        "travel"
    }
    async fn discover(&self) -> Result<Vec<ToolDescriptor>> {
        Ok(vec![ToolDescriptor {
            name: "get_weather".into(),
            description: "weather".into(),
            input_schema: ToolInputSchema::default(),
        }])
    }
    async fn call(&self, _tool: &str, _arguments: &Value) -> ToolOutcome {
        ToolOutcome::ok("sunny")
    }
}

struct Replay(Mutex<VecDeque<String>>);

#[async_trait]
impl Reasoner for Replay {
    async fn reason(&self, _transcript: &Transcript<'_>) -> Result<String> {
        let next = self.0.lock().unwrap().pop_front();
        Ok(next.unwrap_or_default())
    }
}

fn reply_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("{\"action\": \"get_weather\", \"action_input\": {}}".to_string()),
        Just("{\"action\": \"no_such_tool\", \"action_input\": {}}".to_string()),
        Just("{\"action\": \"Final Answer\", \"action_input\": \"done\"}".to_string()),
        "\\PC{0,80}",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Whatever the model says, the loop queries it at most `budget` times.
    #[test]
    fn loop_terminates_within_budget(
        replies in prop::collection::vec(reply_strategy(), 0..40),
        budget in 0usize..12,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let run = rt.block_on(async {
            let providers: Vec<Arc<dyn ToolProvider>> = vec![Arc::new(OneTool)];
            let catalog = ToolCatalog::build(&providers, UnavailablePolicy::Fatal).await.unwrap();
            let invoker = ToolInvoker::new(Arc::new(catalog), Duration::from_secs(5));
            let reasoner = Arc::new(Replay(Mutex::new(replies.into_iter().collect())));
            ReasoningLoop::new(reasoner, invoker, budget).run("plan", None).await
        });
        prop_assert!(run.steps <= budget);
        prop_assert!(run.scratchpad.len() <= budget);
        prop_assert!(!matches!(run.result, LoopResult::Failed(_)));
        if let LoopResult::Exhausted(_) = run.result {
            prop_assert_eq!(run.steps, budget);
        }
    }
}
