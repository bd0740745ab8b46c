pub mod config;
pub mod error;
pub mod plan;
pub mod tools;

pub use config::{ItineraConfig, McpServerConfig, McpTransport, PlannerConfig, UnavailablePolicy};
pub use error::PlanErrorKind;
pub use plan::{PlanResult, TravelPlan, TripParameters};
pub use tools::{ToolDescriptor, ToolErrorKind, ToolInputSchema, ToolOutcome, ToolProvider};
