//! Tool registry and helpers for writing tool handlers.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::mcp::protocol::{ContentBlock, Tool, ToolResult};

/// Handler for MCP tool calls.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Get the tool definition.
    fn definition(&self) -> Tool;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: HashMap<String, Value>) -> Result<ToolResult>;
}

/// A descriptor bound to the handler that serves it.
#[derive(Clone)]
struct RegisteredTool {
    descriptor: Tool,
    handler: Arc<dyn ToolHandler>,
}

/// Registry of tool handlers, keyed by tool name.
///
/// Populated during startup and then moved into the server, after which it is
/// only read.
pub struct McpHandler {
    tools: HashMap<String, RegisteredTool>,
}

impl McpHandler {
    /// Create a new handler registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool handler under the name from its own definition.
    pub fn register<T: ToolHandler + 'static>(&mut self, handler: T) {
        let tool = handler.definition();
        self.register_tool(tool, Arc::new(handler));
    }

    /// Register a handler under an explicit descriptor.
    ///
    /// Replaces any tool already registered under `descriptor.name`.
    pub fn register_tool(&mut self, descriptor: Tool, handler: Arc<dyn ToolHandler>) {
        let name = descriptor.name.clone();
        if self
            .tools
            .insert(name.clone(), RegisteredTool { descriptor, handler })
            .is_some()
        {
            debug!("Replaced existing tool registration: {}", name);
        }
    }

    /// Get all registered tools.
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.values().map(|t| t.descriptor.clone()).collect()
    }

    /// Get a tool handler by name.
    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).map(|t| t.handler.clone())
    }

    /// Check if a tool exists.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get the number of registered tools.
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Invoke a tool by name, returning the handler's outcome unchanged.
    pub async fn invoke(&self, name: &str, arguments: HashMap<String, Value>) -> Result<ToolResult> {
        let handler = self
            .get_tool(name)
            .ok_or_else(|| Error::ToolNotFound(name.to_string()))?;
        handler.execute(arguments).await
    }
}

impl Default for McpHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper to create a text content block.
pub fn text_content(text: impl Into<String>) -> ContentBlock {
    ContentBlock::Text { text: text.into() }
}

/// Helper to create a successful tool result.
pub fn success_result(text: impl Into<String>) -> ToolResult {
    ToolResult {
        content: vec![text_content(text)],
        is_error: false,
    }
}

/// Helper to create an error tool result.
pub fn error_result(text: impl Into<String>) -> ToolResult {
    ToolResult {
        content: vec![text_content(text)],
        is_error: true,
    }
}

/// Helper to extract a required, non-empty string argument.
pub fn get_string_arg(args: &HashMap<String, Value>, name: &str) -> Result<String> {
    match args.get(name) {
        None | Some(Value::Null) => Err(Error::InvalidParams(format!(
            "required argument {} is missing",
            name
        ))),
        Some(Value::String(s)) if s.is_empty() => Err(Error::InvalidParams(format!(
            "required argument {} cannot be empty",
            name
        ))),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(Error::InvalidParams(format!(
            "argument {} must be a string",
            name
        ))),
    }
}

/// Helper to extract an optional string argument.
pub fn get_optional_string_arg(args: &HashMap<String, Value>, name: &str) -> Option<String> {
    args.get(name).and_then(|v| v.as_str()).map(String::from)
}

/// Helper to extract a required integer argument.
///
/// Numeric strings are rejected; clients must send JSON numbers.
pub fn get_int_arg(args: &HashMap<String, Value>, name: &str) -> Result<i64> {
    match args.get(name) {
        None | Some(Value::Null) => Err(Error::InvalidParams(format!(
            "required argument {} is missing",
            name
        ))),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| Error::InvalidParams(format!("argument {} must be an integer", name))),
        Some(_) => Err(Error::InvalidParams(format!(
            "argument {} must be a number",
            name
        ))),
    }
}

/// Helper to extract an optional boolean argument with a default.
pub fn get_bool_arg(args: &HashMap<String, Value>, name: &str, default: bool) -> bool {
    args.get(name).and_then(|v| v.as_bool()).unwrap_or(default)
}

/// Helper to extract a string array argument.
pub fn get_string_array_arg(args: &HashMap<String, Value>, name: &str) -> Result<Vec<String>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(String::from).ok_or_else(|| {
                    Error::InvalidParams(format!("argument {} must contain only strings", name))
                })
            })
            .collect(),
        Some(_) => Err(Error::InvalidParams(format!(
            "argument {} must be an array",
            name
        ))),
    }
}
