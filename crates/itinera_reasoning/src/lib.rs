pub mod api_types;
pub mod catalog;
pub mod extraction;
pub mod intent;
pub mod invoker;
pub mod llm;
pub mod planner;
pub mod prompts;
pub mod providers;
pub mod react_loop;
pub mod retry;
pub mod scratchpad;

pub use catalog::{CatalogError, ToolCatalog, ToolCollision};
pub use extraction::{extract, ExtractionOutcome, InvalidReason};
pub use intent::{parse_intent, Intent};
pub use invoker::ToolInvoker;
pub use planner::PlanOrchestrator;
pub use react_loop::{LlmReasoner, LoopFailure, LoopResult, Reasoner, ReasoningLoop, Transcript};
pub use scratchpad::{Scratchpad, ScratchpadEntry, ToolCall};
