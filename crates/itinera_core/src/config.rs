use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ItineraConfig {
    pub llm: LlmConfig,
    pub planner: PlannerConfig,
    pub gateway: GatewayConfig,
    /// Tool providers in merge order. The first provider to advertise a tool
    /// name owns it.
    pub providers: Vec<McpServerConfig>,
}

impl Default for ItineraConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            planner: PlannerConfig::default(),
            gateway: GatewayConfig::default(),
            providers: default_providers(),
        }
    }
}

impl ItineraConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: ItineraConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Ok(v) = std::env::var("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("LLM_MAX_TOKENS") {
            if let Ok(n) = v.parse() {
                self.llm.max_tokens = n;
            }
        }
        if let Ok(v) = std::env::var("LLM_TEMPERATURE") {
            if let Ok(n) = v.parse() {
                self.llm.temperature = n;
            }
        }
        if let Ok(v) = std::env::var("ITINERA_STEP_BUDGET") {
            if let Ok(n) = v.parse() {
                self.planner.step_budget = n;
            }
        }
        // TRAVEL_MCP_URL, DESTINATION_MCP_URL, ...
        for provider in &mut self.providers {
            let key = format!("{}_MCP_URL", provider.name.to_uppercase().replace('-', "_"));
            if let Ok(url) = std::env::var(&key) {
                tracing::debug!("Provider '{}' endpoint overridden by {}", provider.name, key);
                provider.transport = McpTransport::Http { url };
            }
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// `deepseek` or `openai` (any OpenAI-compatible endpoint).
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// Name of the env var holding the API key. Defaults per provider.
    pub api_key_env: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            model: "deepseek-chat".to_string(),
            base_url: None,
            api_key_env: None,
            max_tokens: 4096,
            temperature: 0.1,
            request_timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    pub fn api_key_var(&self) -> String {
        if let Some(ref v) = self.api_key_env {
            return v.clone();
        }
        match self.provider.as_str() {
            "deepseek" => "DEEPSEEK_API_KEY".to_string(),
            _ => "OPENAI_API_KEY".to_string(),
        }
    }

    pub fn resolved_base_url(&self) -> String {
        if let Some(ref url) = self.base_url {
            return url.trim_end_matches('/').to_string();
        }
        match self.provider.as_str() {
            "deepseek" => "https://api.deepseek.com/v1".to_string(),
            _ => "https://api.openai.com/v1".to_string(),
        }
    }
}

/// What to do when a provider cannot be reached during tool discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailablePolicy {
    /// Abort the whole catalog build.
    #[default]
    Fatal,
    /// Leave the provider out and continue with the rest.
    Omit,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Maximum number of model queries per request.
    pub step_budget: usize,
    pub tool_timeout_secs: u64,
    /// Overall per-request deadline. `None` disables it.
    pub request_deadline_secs: Option<u64>,
    pub on_provider_unavailable: UnavailablePolicy,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            step_budget: 15,
            tool_timeout_secs: 30,
            request_deadline_secs: Some(300),
            on_provider_unavailable: UnavailablePolicy::Fatal,
        }
    }
}

impl PlannerConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn request_deadline(&self) -> Option<Duration> {
        self.request_deadline_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8001,
        }
    }
}

/// One MCP tool-provider endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    #[serde(flatten)]
    pub transport: McpTransport,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum McpTransport {
    /// Streamable HTTP endpoint, e.g. `http://localhost:8000/mcp`.
    Http { url: String },
    /// Child process speaking MCP over stdio.
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
}

fn default_providers() -> Vec<McpServerConfig> {
    vec![
        McpServerConfig {
            name: "travel".to_string(),
            transport: McpTransport::Http {
                url: "http://localhost:8000/mcp".to_string(),
            },
        },
        McpServerConfig {
            name: "destination".to_string(),
            transport: McpTransport::Http {
                url: "http://localhost:5000/mcp".to_string(),
            },
        },
    ]
}

// ============================================================================
// Tests
// ============================================================================
