use anyhow::Context;
use itinera_core::config::{McpServerConfig, McpTransport};
use itinera_core::tools::{ToolDescriptor, ToolErrorKind, ToolInputSchema, ToolOutcome, ToolProvider};
use rmcp::model::{CallToolRequestParams, CallToolResult, RawContent};
use rmcp::service::{Peer, RoleClient, RunningService, ServiceExt};
use rmcp::transport::{StreamableHttpClientTransport, TokioChildProcess};
use tokio::process::Command;
use tokio::sync::Mutex;

/// One MCP server exposed as a `ToolProvider`.
///
/// The connection is opened on first use and kept for later requests. A
/// failed listing drops it so the next discovery reconnects.
pub struct McpProvider {
    config: McpServerConfig,
    service: Mutex<Option<RunningService<RoleClient, ()>>>,
}

impl McpProvider {
    pub fn new(config: McpServerConfig) -> Self {
        Self {
            config,
            service: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    pub async fn is_connected(&self) -> bool {
        self.service.lock().await.is_some()
    }

    /// Shared peer handle, connecting first if needed.
    async fn peer(&self) -> anyhow::Result<Peer<RoleClient>> {
        let mut guard = self.service.lock().await;
        if let Some(service) = guard.as_ref() {
            return Ok(service.peer().clone());
        }
        let service = connect(&self.config).await?;
        let peer = service.peer().clone();
        *guard = Some(service);
        Ok(peer)
    }

    pub async fn disconnect(&self) {
        let Some(service) = self.service.lock().await.take() else {
            return;
        };
        if let Err(e) = service.cancel().await {
            tracing::warn!("Error cancelling MCP server '{}': {:?}", self.config.name, e);
        }
        tracing::info!("MCP server '{}' disconnected", self.config.name);
    }
}

async fn connect(config: &McpServerConfig) -> anyhow::Result<RunningService<RoleClient, ()>> {
    let service = match &config.transport {
        McpTransport::Http { url } => {
            tracing::info!("Connecting MCP server '{}' at {}", config.name, url);
            let transport = StreamableHttpClientTransport::from_uri(url.as_str());
            ().serve(transport).await.map_err(|e| {
                anyhow::anyhow!("MCP handshake failed for '{}': {}", config.name, e)
            })?
        }
        McpTransport::Stdio { command, args, env } => {
            tracing::info!("Spawning MCP server '{}': {}", config.name, command);
            let mut cmd = Command::new(command);
            cmd.args(args);
            for (k, v) in env {
                cmd.env(k, v);
            }
            let transport = TokioChildProcess::new(cmd)
                .with_context(|| format!("failed to spawn MCP server '{}'", config.name))?;
            ().serve(transport).await.map_err(|e| {
                anyhow::anyhow!("MCP handshake failed for '{}': {}", config.name, e)
            })?
        }
    };
    Ok(service)
}

#[async_trait::async_trait]
impl ToolProvider for McpProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn discover(&self) -> anyhow::Result<Vec<ToolDescriptor>> {
        let peer = self.peer().await?;
        match peer.list_all_tools().await {
            Ok(tools) => {
                for t in &tools {
                    tracing::debug!("  → tool '{}' from server '{}'", t.name, self.config.name);
                }
                Ok(tools.iter().map(convert_mcp_tool).collect())
            }
            Err(e) => {
                self.disconnect().await;
                Err(anyhow::anyhow!(
                    "list_tools failed for '{}': {}",
                    self.config.name,
                    e
                ))
            }
        }
    }

    async fn call(&self, tool: &str, arguments: &serde_json::Value) -> ToolOutcome {
        let peer = match self.peer().await {
            Ok(peer) => peer,
            Err(e) => {
                return ToolOutcome::transient_error(format!(
                    "MCP server '{}' is not reachable: {:#}",
                    self.config.name, e
                ))
            }
        };

        let params = CallToolRequestParams {
            meta: None,
            name: tool.to_string().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        };

        match peer.call_tool(params).await {
            Ok(result) => convert_call_result(result),
            Err(e) => {
                let msg = e.to_string();
                let kind = if msg.contains("closed") || msg.contains("timeout") {
                    ToolErrorKind::Transient
                } else {
                    ToolErrorKind::Permanent
                };
                ToolOutcome::error(kind, format!("MCP tool '{}' failed: {}", tool, msg))
            }
        }
    }
}

/// Convert MCP CallToolResult → ToolOutcome.
fn convert_call_result(result: CallToolResult) -> ToolOutcome {
    let is_error = result.is_error.unwrap_or(false);

    // Concatenate all text content blocks
    let content: String = result
        .content
        .iter()
        .filter_map(|c| match &c.raw {
            RawContent::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    let content = if content.is_empty() {
        "[no output]".to_string()
    } else {
        content
    };

    if is_error {
        ToolOutcome::permanent_error(content)
    } else {
        ToolOutcome::ok(content)
    }
}

fn convert_mcp_tool(mcp_tool: &rmcp::model::Tool) -> ToolDescriptor {
    ToolDescriptor {
        name: mcp_tool.name.to_string(),
        description: mcp_tool
            .description
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default(),
        input_schema: ToolInputSchema::from_json_schema(&mcp_tool.input_schema),
    }
}
