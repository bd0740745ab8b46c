use crate::bridge::McpProvider;
use itinera_core::config::McpServerConfig;
use itinera_core::tools::ToolProvider;
use std::sync::Arc;

/// Owns one `McpProvider` per configured server, in configuration order.
///
/// Connections are opened lazily by the first discovery, so building the
/// manager never touches the network.
pub struct McpManager {
    providers: Vec<Arc<McpProvider>>,
}

impl McpManager {
    pub fn from_configs(configs: &[McpServerConfig]) -> Self {
        let mut providers = Vec::with_capacity(configs.len());
        for config in configs {
            if providers
                .iter()
                .any(|p: &Arc<McpProvider>| p.config().name == config.name)
            {
                tracing::warn!("Duplicate MCP server name '{}', ignoring the later entry", config.name);
                continue;
            }
            tracing::debug!("Registered MCP server '{}'", config.name);
            providers.push(Arc::new(McpProvider::new(config.clone())));
        }
        Self { providers }
    }

    /// Handles for the tool catalog. Order matters: an earlier server wins a
    /// duplicated tool name.
    pub fn providers(&self) -> Vec<Arc<dyn ToolProvider>> {
        self.providers
            .iter()
            .map(|p| p.clone() as Arc<dyn ToolProvider>)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Disconnect all MCP servers gracefully.
    pub async fn disconnect_all(&self) {
        for provider in &self.providers {
            provider.disconnect().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itinera_core::config::McpTransport;

    fn http(name: &str, url: &str) -> McpServerConfig {
        McpServerConfig {
            name: name.into(),
            transport: McpTransport::Http { url: url.into() },
        }
    }

    #[tokio::test]
    async fn test_keeps_order_and_drops_duplicates() {
        let manager = McpManager::from_configs(&[
            http("travel", "http://localhost:8000/mcp"),
            http("destination", "http://localhost:5000/mcp"),
            http("travel", "http://localhost:9000/mcp"),
        ]);
        let names: Vec<String> = manager
            .providers()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["travel", "destination"]);
        assert_eq!(manager.len(), 2);

        // Nothing connected yet, so this is a no-op.
        manager.disconnect_all().await;
    }
}
