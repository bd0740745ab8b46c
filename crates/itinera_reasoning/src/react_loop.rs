//! The ReAct loop: think, act, observe, until the model gives a final answer,
//! the step budget runs out, or the request deadline passes.

use crate::intent::{parse_intent, Intent};
use crate::invoker::ToolInvoker;
use crate::llm::{CompletionParams, LlmClient};
use crate::prompts::{PromptBuilder, FORMAT_NUDGE};
use crate::scratchpad::{Scratchpad, ScratchpadEntry, ToolCall};
use anyhow::Result;
use async_trait::async_trait;
use itinera_core::tools::ToolDescriptor;
use std::sync::Arc;
use tokio::time::Instant;

/// Text reported when the budget runs out with nothing answer-like seen.
pub const NO_ANSWER_MARKER: &str = "Agent stopped due to iteration limit or time limit.";

/// Everything the model sees at one step.
pub struct Transcript<'a> {
    pub task: &'a str,
    pub tools: &'a [ToolDescriptor],
    pub scratchpad: &'a Scratchpad,
}

/// Produces the model's next reply for a transcript.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn reason(&self, transcript: &Transcript<'_>) -> Result<String>;
}

/// `Reasoner` backed by a chat-completion client.
pub struct LlmReasoner {
    client: Arc<dyn LlmClient>,
    params: CompletionParams,
}

impl LlmReasoner {
    pub fn new(client: Arc<dyn LlmClient>, params: CompletionParams) -> Self {
        Self { client, params }
    }
}

#[async_trait]
impl Reasoner for LlmReasoner {
    async fn reason(&self, transcript: &Transcript<'_>) -> Result<String> {
        let system = PromptBuilder::system_prompt(transcript.tools);
        let messages = transcript.scratchpad.to_messages(transcript.task);
        let response = self
            .client
            .complete(&system, messages, self.params.clone())
            .await?;
        Ok(response.content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoopFailure {
    #[error("model unavailable: {0}")]
    Model(String),
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopResult {
    Finished(String),
    /// Step budget used up; carries the best answer-like text seen, or
    /// `NO_ANSWER_MARKER`.
    Exhausted(String),
    Failed(LoopFailure),
}

#[derive(Debug)]
pub struct LoopRun {
    pub result: LoopResult,
    pub scratchpad: Scratchpad,
    /// Number of model queries made.
    pub steps: usize,
    /// Most recent model reply, verbatim.
    pub last_reply: Option<String>,
}

enum Phase {
    Thinking,
    Dispatch { thought: String, call: ToolCall },
    Finishing { thought: String, answer: String },
}

pub struct ReasoningLoop {
    reasoner: Arc<dyn Reasoner>,
    invoker: ToolInvoker,
    step_budget: usize,
}

impl ReasoningLoop {
    pub fn new(reasoner: Arc<dyn Reasoner>, invoker: ToolInvoker, step_budget: usize) -> Self {
        Self {
            reasoner,
            invoker,
            step_budget,
        }
    }

    #[tracing::instrument(skip(self, task), fields(budget = self.step_budget))]
    pub async fn run(&self, task: &str, deadline: Option<Instant>) -> LoopRun {
        let mut scratchpad = Scratchpad::new();
        let mut steps = 0;
        let mut best_effort: Option<String> = None;
        let mut last_reply: Option<String> = None;
        let mut phase = Phase::Thinking;

        let result = loop {
            match phase {
                Phase::Thinking => {
                    if deadline_passed(deadline) {
                        break LoopResult::Failed(LoopFailure::DeadlineExceeded);
                    }
                    if steps >= self.step_budget {
                        tracing::warn!("Step budget of {} exhausted", self.step_budget);
                        break LoopResult::Exhausted(
                            best_effort
                                .take()
                                .unwrap_or_else(|| NO_ANSWER_MARKER.to_string()),
                        );
                    }
                    steps += 1;

                    let reply = {
                        let transcript = Transcript {
                            task,
                            tools: self.invoker.catalog().describe_all(),
                            scratchpad: &scratchpad,
                        };
                        let query = self.reasoner.reason(&transcript);
                        match deadline {
                            Some(at) => match tokio::time::timeout_at(at, query).await {
                                Ok(reply) => reply,
                                Err(_) => {
                                    tracing::warn!("Deadline reached while waiting for the model");
                                    break LoopResult::Failed(LoopFailure::DeadlineExceeded);
                                }
                            },
                            None => query.await,
                        }
                    };
                    let reply = match reply {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!("Model query failed at step {}: {:#}", steps, e);
                            break LoopResult::Failed(LoopFailure::Model(format!("{:#}", e)));
                        }
                    };

                    let intent = parse_intent(&reply);
                    last_reply = Some(reply);
                    phase = match intent {
                        Intent::Action { thought, call } => {
                            tracing::debug!("Step {}: action '{}'", steps, call.name);
                            Phase::Dispatch { thought, call }
                        }
                        Intent::Final { thought, answer } => {
                            tracing::debug!("Step {}: final answer ({} bytes)", steps, answer.len());
                            Phase::Finishing { thought, answer }
                        }
                        Intent::Malformed {
                            text,
                            answer_candidate,
                        } => {
                            tracing::warn!("Step {}: reply carried no usable intent", steps);
                            if answer_candidate.is_some() {
                                best_effort = answer_candidate;
                            }
                            scratchpad.push(ScratchpadEntry::noop(text, FORMAT_NUDGE));
                            Phase::Thinking
                        }
                    };
                }
                Phase::Dispatch { thought, call } => {
                    // A dispatched call finishes or times out on its own; the
                    // deadline is only observed afterwards.
                    let outcome = self.invoker.invoke(&call.name, &call.arguments).await;
                    scratchpad.push(ScratchpadEntry::action(thought, call, &outcome));
                    if deadline_passed(deadline) {
                        tracing::warn!("Deadline reached during tool call");
                        break LoopResult::Failed(LoopFailure::DeadlineExceeded);
                    }
                    phase = Phase::Thinking;
                }
                Phase::Finishing { thought, answer } => {
                    scratchpad.push(ScratchpadEntry::final_answer(thought));
                    break LoopResult::Finished(answer);
                }
            }
        };

        tracing::info!(
            "Reasoning loop ended after {} step(s): {}",
            steps,
            match &result {
                LoopResult::Finished(_) => "finished",
                LoopResult::Exhausted(_) => "exhausted",
                LoopResult::Failed(_) => "failed",
            }
        );
        LoopRun {
            result,
            scratchpad,
            steps,
            last_reply,
        }
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|at| Instant::now() >= at)
}
