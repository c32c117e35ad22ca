//! MCP Protocol Handler
//!
//! Implements JSON-RPC 2.0 for Model Context Protocol. The same dispatcher
//! backs the streamable HTTP transport and the stdio transport.
//! Reference: https://modelcontextprotocol.io/specification

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::tools::{ToolCall, ToolRegistry};

/// Protocol revision announced when the client does not ask for one
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-03-26";

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// `None` only when the member is absent; `"id": null` is `Some(Null)`
    #[serde(default, deserialize_with = "present_id")]
    pub id: Option<serde_json::Value>,
}

fn present_id<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl McpRequest {
    /// Requests without an id member expect no response
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl McpResponse {
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<serde_json::Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(McpError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }
}

/// MCP Error Codes
pub mod error_codes {
    // JSON-RPC standard errors
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;

    // MCP custom errors (-32000 to -32099)
    pub const TOOL_NOT_FOUND: i32 = -32000;
}

/// MCP Server
pub struct McpServer {
    name: String,
    tools: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(tools: ToolRegistry) -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            tools: Arc::new(tools),
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Parse and dispatch one raw JSON-RPC message.
    ///
    /// Returns `None` for notifications.
    pub async fn handle_message(&self, raw: &str) -> Option<McpResponse> {
        let request = match serde_json::from_str::<McpRequest>(raw) {
            Ok(request) => request,
            Err(e) => {
                error!("Parse error: {}", e);
                return Some(McpResponse::error(
                    None,
                    error_codes::PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
            }
        };

        if request.jsonrpc != "2.0" {
            return Some(McpResponse::error(
                request.id,
                error_codes::INVALID_REQUEST,
                "jsonrpc must be \"2.0\"",
            ));
        }

        if request.is_notification() {
            debug!("Notification: {}", request.method);
            return None;
        }

        Some(self.handle_request(request).await)
    }

    /// Handle a single MCP request
    pub async fn handle_request(&self, request: McpRequest) -> McpResponse {
        match request.method.as_str() {
            // Lifecycle
            "initialize" => self.handle_initialize(request.id, &request.params),
            "shutdown" => {
                info!("Shutdown requested");
                McpResponse::success(request.id, serde_json::json!({}))
            }

            // Tools
            "tools/list" => self.handle_tools_list(request.id),
            "tools/call" => self.handle_tools_call(request.id, request.params).await,

            "ping" => McpResponse::success(request.id, serde_json::json!({})),

            method => {
                warn!("Unknown method: {}", method);
                McpResponse::error(
                    request.id,
                    error_codes::METHOD_NOT_FOUND,
                    format!("Method not found: {}", method),
                )
            }
        }
    }

    fn handle_initialize(
        &self,
        id: Option<serde_json::Value>,
        params: &serde_json::Value,
    ) -> McpResponse {
        let version = params
            .get("protocolVersion")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);

        McpResponse::success(
            id,
            serde_json::json!({
                "protocolVersion": version,
                "capabilities": {
                    "tools": {
                        "listChanged": false
                    }
                },
                "serverInfo": {
                    "name": self.name,
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Option<serde_json::Value>) -> McpResponse {
        McpResponse::success(id, serde_json::json!({ "tools": self.tools.to_mcp_format() }))
    }

    async fn handle_tools_call(
        &self,
        id: Option<serde_json::Value>,
        params: serde_json::Value,
    ) -> McpResponse {
        let name = match params.get("name").and_then(|v| v.as_str()) {
            Some(n) => n,
            None => {
                return McpResponse::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    "Missing 'name' parameter",
                )
            }
        };

        if !self.tools.contains(name) {
            return McpResponse::error(
                id,
                error_codes::TOOL_NOT_FOUND,
                format!("Tool not found: {}", name),
            );
        }

        let arguments = params
            .get("arguments")
            .cloned()
            .filter(|a| !a.is_null())
            .unwrap_or(serde_json::json!({}));

        let call = ToolCall::new(name, arguments);
        let result = self.tools.execute(&call).await;

        McpResponse::success(
            id,
            serde_json::json!({
                "content": [{
                    "type": "text",
                    "text": result.content
                }],
                "isError": !result.success
            }),
        )
    }

    /// Serve newline-delimited JSON-RPC over stdin/stdout until EOF
    pub async fn run_stdio(&self) -> anyhow::Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        info!("MCP server ready on stdio, waiting for requests...");

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                info!("Client disconnected (EOF)");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!("← {}", trimmed);

            let Some(response) = self.handle_message(trimmed).await else {
                continue;
            };

            let response_json = serde_json::to_string(&response)?;
            debug!("→ {}", response_json);

            stdout.write_all(response_json.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Tool, ToolResult, ToolSchema};

    fn server() -> McpServer {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::new(
            ToolSchema::new("latest_news_details", "Получение списка последних новостей"),
            |_params| async move {
                Ok(ToolResult::success(
                    "latest_news_details",
                    "{\n    \"news_items\": [],\n    \"total_count\": 0\n}".to_string(),
                ))
            },
        ));
        McpServer::new(registry)
    }

    #[tokio::test]
    async fn test_initialize_echoes_version() {
        let response = server()
            .handle_message(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
            )
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "tourscrape-mcp");
    }

    #[tokio::test]
    async fn test_notification_has_no_response() {
        let response = server()
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_null_id_is_answered() {
        let response = server()
            .handle_message(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#)
            .await
            .unwrap();
        assert!(response.result.is_some());
        assert_eq!(response.id, Some(serde_json::Value::Null));

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.as_object().unwrap().contains_key("id"));
    }

    #[tokio::test]
    async fn test_parse_error() {
        let response = server().handle_message("{not json").await.unwrap();
        assert_eq!(response.error.unwrap().code, error_codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = server()
            .handle_message(r#"{"jsonrpc":"2.0","id":2,"method":"resources/list"}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tools_list() {
        let response = server()
            .handle_message(r#"{"jsonrpc":"2.0","id":3,"method":"tools/list"}"#)
            .await
            .unwrap();
        let tools = response.result.unwrap()["tools"].clone();
        assert_eq!(tools[0]["name"], "latest_news_details");
        assert!(tools[0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn test_tools_call_returns_text_content() {
        let response = server()
            .handle_message(
                r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"latest_news_details"}}"#,
            )
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], false);
        let text = result["content"][0]["text"].as_str().unwrap();
        let body: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(body["total_count"], 0);
    }

    #[tokio::test]
    async fn test_tools_call_unknown_tool() {
        let response = server()
            .handle_message(
                r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"get_hot_tours_mars"}}"#,
            )
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, error_codes::TOOL_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tools_call_missing_name() {
        let response = server()
            .handle_message(r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{}}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, error_codes::INVALID_PARAMS);
    }
}
