//! Tool Registry
//!
//! Named, independently callable procedures with JSON-schema parameters:
//! - Registration with description + schema
//! - Parameter validation
//! - Dispatch by name with failures caught at the boundary
//!
//! Every result body is JSON text. A failing or panicking handler becomes an
//! `{"error": ...}` payload; it never reaches the transport loop.

use anyhow::{anyhow, Result};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::extract::error_payload;

/// JSON Schema for tool parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name (snake_case)
    pub name: String,
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: Value,
    pub required: Vec<String>,
}

impl ToolSchema {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
            required: vec![],
        }
    }

    /// Add a numeric parameter
    pub fn with_number_param(mut self, name: &str, description: &str, required: bool) -> Self {
        if let Some(props) = self.parameters.get_mut("properties") {
            props[name] = serde_json::json!({
                "type": "number",
                "description": description
            });
        }
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Validate parameters against schema
    pub fn validate(&self, params: &Value) -> Result<()> {
        if !params.is_object() && !params.is_null() {
            return Err(anyhow!("Arguments must be a JSON object"));
        }

        for req in &self.required {
            if params.get(req).is_none() {
                return Err(anyhow!("Missing required parameter: {}", req));
            }
        }

        if let Some(obj) = self.parameters.get("properties").and_then(|p| p.as_object()) {
            for (name, schema) in obj {
                let Some(value) = params.get(name) else {
                    continue;
                };
                let expected_type = schema.get("type").and_then(|t| t.as_str());
                let valid = match expected_type {
                    Some("string") => value.is_string(),
                    Some("integer") => value.is_i64() || value.is_u64(),
                    Some("number") => value.is_number(),
                    Some("boolean") => value.is_boolean(),
                    Some("array") => value.is_array(),
                    Some("object") => value.is_object(),
                    _ => true,
                };
                if !valid {
                    return Err(anyhow!(
                        "Parameter '{}' has wrong type, expected {}",
                        name,
                        expected_type.unwrap_or("unknown")
                    ));
                }
            }
        }

        Ok(())
    }

    /// MCP `tools/list` entry
    pub fn to_mcp_format(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": {
                "type": "object",
                "properties": self.parameters.get("properties").cloned().unwrap_or(Value::Object(Default::default())),
                "required": self.required
            }
        })
    }
}

/// Result from tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    /// False when `content` is an error payload
    pub success: bool,
    /// JSON text returned to the caller
    pub content: String,
    pub duration_ms: u64,
}

impl ToolResult {
    pub fn success(tool_name: &str, content: String) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            success: true,
            content,
            duration_ms: 0,
        }
    }

    /// Error payload `{"error": message}`
    pub fn error(tool_name: &str, message: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            success: false,
            content: error_payload(message),
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }
}

/// A tool call request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID
    pub id: String,
    pub name: String,
    pub parameters: Value,
}

impl ToolCall {
    pub fn new(name: &str, parameters: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            parameters,
        }
    }
}

/// Type alias for tool handler function
pub type ToolHandler = Arc<
    dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<ToolResult>> + Send>>
        + Send
        + Sync
>;

/// A registered tool with schema and handler
pub struct Tool {
    pub schema: ToolSchema,
    handler: ToolHandler,
}

impl Tool {
    pub fn new<F, Fut>(schema: ToolSchema, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolResult>> + Send + 'static,
    {
        Self {
            schema,
            handler: Arc::new(move |params| Box::pin(handler(params))),
        }
    }

    /// Validate and run the handler
    pub async fn execute(&self, params: Value) -> Result<ToolResult> {
        let start = Instant::now();
        self.schema.validate(&params)?;

        let mut result = (self.handler)(params).await?;
        result.duration_ms = start.elapsed().as_millis() as u64;

        Ok(result)
    }
}

/// Tool registry, immutable once serving starts
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; a later registration under the same name replaces it
    pub fn register(&mut self, tool: Tool) {
        info!("Registered tool: {}", tool.schema.name);
        let name = tool.schema.name.clone();
        match self.index.get(&name) {
            Some(&pos) => self.tools[pos] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&pos| &self.tools[pos])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tool names in registration order
    pub fn list(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.schema.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a single tool call; never fails, never panics
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.get(&call.name) else {
            return ToolResult::error(&call.name, format!("Unknown tool: {}", call.name));
        };

        let start = Instant::now();
        let outcome = AssertUnwindSafe(tool.execute(call.parameters.clone()))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!("Tool '{}' ({}) failed: {:#}", call.name, call.id, e);
                ToolResult::error(&call.name, format!("{:#}", e))
            }
            Err(_) => {
                error!("Tool '{}' ({}) panicked", call.name, call.id);
                ToolResult::error(&call.name, format!("Tool '{}' panicked", call.name))
            }
        };

        let elapsed = start.elapsed().as_millis() as u64;
        info!(
            tool = %call.name,
            call_id = %call.id,
            elapsed_ms = elapsed,
            success = result.success,
            "Tool call finished"
        );

        result.with_duration(elapsed)
    }

    /// MCP `tools/list` entries
    pub fn to_mcp_format(&self) -> Vec<Value> {
        self.tools.iter().map(|t| t.schema.to_mcp_format()).collect()
    }
}
