//! In-process tool servers
//!
//! Lightweight tool servers hosted inside this process. A [`ToolServer`]
//! groups [`Tool`] implementations under one server name; the agent runtime
//! reaches it through the session's control channel (see `mcp.rs` for the
//! JSON-RPC surface). Parameters are validated against each tool's JSON
//! schema before execution.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, Instrument};

pub mod builtin;
pub mod mcp;

/// A callable operation exposed by an in-process tool server
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and JSON schema for the parameters
    fn describe(&self) -> ToolDescription;

    /// Run the tool; parameters have already been validated against the schema.
    /// Returns an MCP tool result (`{"content": [...]}`).
    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError>;
}

/// Tool metadata advertised through `tools/list`
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Name the runtime uses for a server's tool in allow-lists
pub fn qualified_tool_name(server: &str, tool: &str) -> String {
    format!("mcp__{server}__{tool}")
}

/// Build an MCP text result
pub fn text_result(text: impl Into<String>) -> Value {
    json!({
        "content": [
            {"type": "text", "text": text.into()}
        ]
    })
}

/// Named, versioned collection of tools
pub struct ToolServer {
    name: String,
    version: String,
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolServer {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            tools: BTreeMap::new(),
        }
    }

    /// Add a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.describe().name;
        self.tools.insert(name, tool);
    }

    pub fn with_tool(mut self, tool: Box<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Descriptions of every tool, ordered by name
    pub fn list_tools(&self) -> Vec<ToolDescription> {
        self.tools.values().map(|tool| tool.describe()).collect()
    }

    /// Allow-list names for every tool on this server
    pub fn qualified_tool_names(&self) -> Vec<String> {
        self.tools
            .keys()
            .map(|tool| qualified_tool_name(&self.name, tool))
            .collect()
    }

    /// Validate parameters and execute a tool
    pub async fn call_tool(&self, tool_name: &str, parameters: &Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        validate_parameters(&tool.describe(), parameters)?;

        let span = crate::tool_span!(server = %self.name, tool = tool_name);
        let started = Instant::now();
        let result = tool.execute(parameters).instrument(span).await;
        debug!(
            server = %self.name,
            tool = tool_name,
            success = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Tool executed"
        );
        result
    }
}

impl fmt::Debug for ToolServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolServer")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Validate parameters against a tool's schema
fn validate_parameters(description: &ToolDescription, parameters: &Value) -> Result<(), ToolError> {
    let validator = jsonschema::validator_for(&description.parameters)
        .map_err(|e| ToolError::SchemaError(format!("Schema compilation error: {e}")))?;

    validator.validate(parameters).map_err(|errors| {
        let error_messages: Vec<String> = errors
            .map(|e| format!("At '{}': {}", e.instance_path, e))
            .collect();
        ToolError::ValidationError(error_messages.join("; "))
    })
}

/// Tool system errors
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Parameter validation failed: {0}")]
    ValidationError(String),
    #[error("Schema error: {0}")]
    SchemaError(String),
    #[error("Tool execution failed: {0}")]
    ExecutionError(String),
}
