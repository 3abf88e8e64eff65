//! Builtin tools for in-process tool servers
//!
//! Each tool has its own module with pure functions separated from I/O.

pub mod code_analysis;
pub mod documentation;

pub use code_analysis::{AnalyzeCodeTool, CheckType};
pub use documentation::{DocFormat, GenerateDocsTool};

use super::{Tool, ToolError};
use std::path::Path;

/// Largest source file the builtin tools will read
pub const MAX_SOURCE_SIZE: u64 = 1024 * 1024;

/// Names accepted in `[sdk_servers.*].tools`
pub const BUILTIN_TOOL_NAMES: [&str; 2] = ["analyze_code", "generate_docs"];

/// Instantiate a builtin tool by name
pub fn create_builtin_tool(name: &str) -> Option<Box<dyn Tool>> {
    match name {
        "analyze_code" => Some(Box::new(AnalyzeCodeTool::new())),
        "generate_docs" => Some(Box::new(GenerateDocsTool::new())),
        _ => None,
    }
}

/// Read a source file after checking that it exists and fits the size limit
pub(crate) async fn read_source(path: &Path, max_size: u64) -> Result<String, ToolError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| ToolError::ExecutionError(format!("File not found: {} ({e})", path.display())))?;

    if !metadata.is_file() {
        return Err(ToolError::ExecutionError(format!(
            "Path is not a file: {}",
            path.display()
        )));
    }

    if metadata.len() > max_size {
        return Err(ToolError::ExecutionError(format!(
            "File too large: {} bytes (max: {max_size})",
            metadata.len()
        )));
    }

    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ToolError::ExecutionError(e.to_string()))
}

/// JSON schema for a parameter struct
pub(crate) fn parameter_schema<T: schemars::JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema).unwrap_or_else(|_| serde_json::json!({"type": "object"}))
}
