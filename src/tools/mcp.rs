//! Minimal MCP JSON-RPC surface for in-process tool servers
//!
//! Supports the methods the agent runtime needs to discover and call tools:
//! `initialize`, `notifications/initialized`, `tools/list` and `tools/call`.
//! Tool failures are reported inside the result (`isError: true`) so the
//! model can see them; protocol problems become JSON-RPC errors.

use super::ToolServer;
use serde_json::{json, Value};
use tracing::warn;

const PROTOCOL_VERSION: &str = "2024-11-05";

const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INVALID_REQUEST: i64 = -32600;

impl ToolServer {
    /// Handle one JSON-RPC message; notifications produce no response
    ///
    /// ```rust
    /// use mcp_isolation::tools::builtin::AnalyzeCodeTool;
    /// use mcp_isolation::tools::ToolServer;
    /// use serde_json::json;
    ///
    /// # tokio_test::block_on(async {
    /// let server = ToolServer::new("code-tools", "1.0.0").with_tool(Box::new(AnalyzeCodeTool::new()));
    ///
    /// let reply = server
    ///     .handle_message(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
    ///     .await
    ///     .unwrap();
    /// assert_eq!(reply["result"]["tools"][0]["name"], "analyze_code");
    ///
    /// let ack = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    /// assert!(server.handle_message(&ack).await.is_none());
    /// # });
    /// ```
    pub async fn handle_message(&self, message: &Value) -> Option<Value> {
        let id = message.get("id").cloned();
        let Some(method) = message.get("method").and_then(Value::as_str) else {
            return Some(error_response(
                id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "missing method",
            ));
        };

        // Requests without an id are notifications
        let id = match id {
            Some(id) => id,
            None => return None,
        };

        let params = message.get("params").cloned().unwrap_or(Value::Null);

        let response = match method {
            "initialize" => success_response(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": self.name(), "version": self.version()},
                }),
            ),
            "tools/list" => {
                let tools: Vec<Value> = self
                    .list_tools()
                    .into_iter()
                    .map(|tool| {
                        json!({
                            "name": tool.name,
                            "description": tool.description,
                            "inputSchema": tool.parameters,
                        })
                    })
                    .collect();
                success_response(id, json!({ "tools": tools }))
            }
            "tools/call" => self.handle_tool_call(id, &params).await,
            other => {
                warn!(server = self.name(), method = other, "Unsupported MCP method");
                error_response(id, METHOD_NOT_FOUND, &format!("method not found: {other}"))
            }
        };

        Some(response)
    }

    async fn handle_tool_call(&self, id: Value, params: &Value) -> Value {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return error_response(id, INVALID_PARAMS, "tools/call requires a tool name");
        };
        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| json!({}));

        match self.call_tool(name, &arguments).await {
            Ok(result) => success_response(id, result),
            Err(error) => {
                warn!(server = self.name(), tool = name, error = %error, "Tool call failed");
                success_response(
                    id,
                    json!({
                        "content": [{"type": "text", "text": error.to_string()}],
                        "isError": true,
                    }),
                )
            }
        }
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message},
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::AnalyzeCodeTool;

    fn server() -> ToolServer {
        ToolServer::new("code-tools", "1.0.0").with_tool(Box::new(AnalyzeCodeTool::new()))
    }

    #[tokio::test]
    async fn test_initialize_reports_server_info() {
        let response = server()
            .handle_message(&json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}))
            .await
            .unwrap();

        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["serverInfo"]["name"], "code-tools");
        assert_eq!(response["result"]["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_notification_has_no_response() {
        let response = server()
            .handle_message(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_tools_list_includes_schema() {
        let response = server()
            .handle_message(&json!({"jsonrpc": "2.0", "id": "a", "method": "tools/list"}))
            .await
            .unwrap();

        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "analyze_code");
        assert!(tools[0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn test_unknown_method_is_method_not_found() {
        let response = server()
            .handle_message(&json!({"jsonrpc": "2.0", "id": 7, "method": "resources/list"}))
            .await
            .unwrap();

        assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_arguments_are_reported_in_result() {
        let response = server()
            .handle_message(&json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "tools/call",
                "params": {"name": "analyze_code", "arguments": {"file_path": "x.rs"}}
            }))
            .await
            .unwrap();

        assert_eq!(response["result"]["isError"], true);
    }

    #[tokio::test]
    async fn test_missing_method_is_invalid_request() {
        let response = server()
            .handle_message(&json!({"jsonrpc": "2.0", "id": 9}))
            .await
            .unwrap();

        assert_eq!(response["error"]["code"], INVALID_REQUEST);
    }
}
