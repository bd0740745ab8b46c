pub mod bridge;
pub mod manager;

pub use bridge::McpProvider;
pub use manager::McpManager;
