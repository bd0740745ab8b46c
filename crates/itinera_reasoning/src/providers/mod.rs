pub mod mock;
pub mod openai;

pub use mock::MockProvider;
pub use openai::OpenAiClient;

use crate::llm::LlmClient;
use anyhow::{Context, Result};
use itinera_core::config::LlmConfig;
use std::sync::Arc;
use std::time::Duration;

/// Build the configured model client. Fails when the provider is unknown or its
/// API key is not set.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider.as_str() {
        "deepseek" | "openai" => {
            let key_var = config.api_key_var();
            let api_key = std::env::var(&key_var)
                .ok()
                .filter(|k| !k.trim().is_empty())
                .with_context(|| format!("{} not found in environment", key_var))?;
            let client = OpenAiClient::new(
                &config.provider,
                &config.resolved_base_url(),
                &api_key,
                &config.model,
                Duration::from_secs(config.request_timeout_secs),
            )?;
            tracing::info!(
                "LLM client ready: provider={} model={}",
                config.provider,
                config.model
            );
            Ok(Arc::new(client))
        }
        other => anyhow::bail!("Unknown LLM provider '{}'", other),
    }
}
