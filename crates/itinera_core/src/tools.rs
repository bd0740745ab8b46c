//! Tool abstraction types shared by the reasoning loop and the provider
//! connections (MCP or otherwise).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A callable tool as advertised by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

/// JSON Schema for tool input parameters.
///
/// `type`, `properties` and `required` are lifted out; every other keyword the
/// provider sent (`$defs`, `additionalProperties`, ...) is kept in `extra` so the
/// full schema can be rebuilt for validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type", default = "default_schema_type")]
    pub schema_type: String,
    #[serde(default = "empty_object")]
    pub properties: Value,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_schema_type() -> String {
    "object".to_string()
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        Self {
            schema_type: default_schema_type(),
            properties: empty_object(),
            required: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl ToolInputSchema {
    /// Split a raw JSON Schema object into the typed fields plus leftovers.
    pub fn from_json_schema(schema: &Map<String, Value>) -> Self {
        let mut extra = schema.clone();
        let schema_type = extra
            .remove("type")
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(default_schema_type);
        let properties = extra.remove("properties").unwrap_or_else(empty_object);
        let required = extra
            .remove("required")
            .and_then(|v| {
                v.as_array().map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
            })
            .unwrap_or_default();
        Self {
            schema_type,
            properties,
            required,
            extra,
        }
    }

    /// Reassemble the complete JSON Schema document.
    pub fn to_json_schema(&self) -> Value {
        let mut schema = self.extra.clone();
        schema.insert("type".into(), Value::String(self.schema_type.clone()));
        schema.insert("properties".into(), self.properties.clone());
        if !self.required.is_empty() {
            schema.insert(
                "required".into(),
                Value::Array(self.required.iter().cloned().map(Value::String).collect()),
            );
        }
        Value::Object(schema)
    }
}

/// Classification of tool execution errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// No tool of that name in the catalog.
    NotFound,
    /// Arguments failed the input schema check.
    InvalidArguments,
    /// The call did not complete within its timeout.
    Timeout,
    /// Connection reset, provider disconnected. Worth one retry.
    Transient,
    /// The provider ran the tool and it failed.
    Permanent,
}

/// Structured result from a tool execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub content: String,
    pub is_error: bool,
    pub error_kind: Option<ToolErrorKind>,
}

impl ToolOutcome {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
            error_kind: None,
        }
    }

    pub fn error(kind: ToolErrorKind, msg: impl Into<String>) -> Self {
        Self {
            content: msg.into(),
            is_error: true,
            error_kind: Some(kind),
        }
    }

    pub fn transient_error(msg: impl Into<String>) -> Self {
        Self::error(ToolErrorKind::Transient, msg)
    }

    pub fn permanent_error(msg: impl Into<String>) -> Self {
        Self::error(ToolErrorKind::Permanent, msg)
    }
}

/// One independent tool-provider connection.
///
/// `discover` may connect lazily; a failure there means the provider is
/// unreachable. `call` never fails outright: provider-side errors come back as
/// an error `ToolOutcome`.
#[async_trait::async_trait]
pub trait ToolProvider: Send + Sync {
    /// Stable provider name used in logs and collision reports.
    fn name(&self) -> &str;

    /// List the tools this provider exposes, in the provider's own order.
    async fn discover(&self) -> anyhow::Result<Vec<ToolDescriptor>>;

    /// Execute `tool` with JSON `arguments`.
    async fn call(&self, tool: &str, arguments: &Value) -> ToolOutcome;
}
