/// Tool Registry
///
/// Holds tool definitions for discovery and typed handlers for execution.
/// Arguments are deserialized into the handler's parameter type before the
/// handler runs, so a malformed call never reaches tool logic.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::core::auth::CallContext;
use crate::core::error::ToolCallError;
use crate::core::utils;

/// MCP tool definition structure.
///
/// Each tool has a unique name, a description, and a JSON schema describing
/// its input parameters. Serialized as-is in `tools/list` responses.
#[derive(Serialize, Debug, Clone)]
pub struct MCPTool {
    /// Unique tool identifier (e.g., "add", "calculate")
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema defining the tool's input parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Handler-level failures. These are not protocol errors: they travel back
/// to the caller as text content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFailure {
    Unauthorized,
    DivisionByZero,
}

impl ToolFailure {
    pub fn message(&self) -> &'static str {
        match self {
            ToolFailure::Unauthorized => "Unauthorized: Invalid or missing token",
            ToolFailure::DivisionByZero => "Error: Cannot divide by zero",
        }
    }
}

/// Result of running a tool handler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToolOutcome {
    Success(f64),
    Failure(ToolFailure),
}

impl ToolOutcome {
    /// Text carried in the single content block of the response.
    pub fn text(&self) -> String {
        match self {
            ToolOutcome::Success(value) => utils::format_number(*value),
            ToolOutcome::Failure(failure) => failure.message().to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutcome::Failure(_))
    }

    /// Flatten into the MCP `tools/call` result shape.
    pub fn into_call_result(self) -> Value {
        serde_json::json!({
            "content": [
                {
                    "type": "text",
                    "text": self.text()
                }
            ],
            "isError": self.is_error()
        })
    }
}

/// Tool handler function type definition.
///
/// Handlers receive raw JSON arguments plus the call context. Handlers built
/// with `ToolRegistry::register_typed` validate the arguments first. Must be
/// Send + Sync to work across threads in the HTTP server.
pub type ToolHandler =
    Box<dyn Fn(Value, &CallContext) -> Result<ToolOutcome, ToolCallError> + Send + Sync>;

/// Registry of available MCP tools.
pub struct ToolRegistry {
    /// All registered tools, in registration order (for tools/list)
    tools: Vec<MCPTool>,
    /// Map of tool names to their handler functions (for tools/call)
    handlers: HashMap<String, ToolHandler>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            handlers: HashMap::new(),
        }
    }

    /// Register a tool with an untyped handler.
    ///
    /// Re-registering a name replaces the previous definition and handler.
    pub fn register(&mut self, tool: MCPTool, handler: ToolHandler) {
        let name = tool.name.clone();
        self.tools.retain(|existing| existing.name != name);
        self.tools.push(tool);
        self.handlers.insert(name, handler);
    }

    /// Register a tool whose arguments deserialize into `A`.
    ///
    /// Arguments that are not a JSON object or do not match `A` are rejected with
    /// `ToolCallError::InvalidParams` before `handler` is invoked.
    pub fn register_typed<A, F>(&mut self, tool: MCPTool, handler: F)
    where
        A: DeserializeOwned + 'static,
        F: Fn(A, &CallContext) -> ToolOutcome + Send + Sync + 'static,
    {
        let boxed: ToolHandler = Box::new(
            move |args: Value, ctx: &CallContext| -> Result<ToolOutcome, ToolCallError> {
                // serde would otherwise accept a positional array for a struct
                if !args.is_object() {
                    return Err(ToolCallError::InvalidParams(
                        "arguments must be an object".to_string(),
                    ));
                }
                let parsed: A = serde_json::from_value(args)
                    .map_err(|e| ToolCallError::InvalidParams(e.to_string()))?;
                Ok(handler(parsed, ctx))
            },
        );
        self.register(tool, boxed);
    }

    /// Look up and execute a tool.
    pub fn dispatch(
        &self,
        name: &str,
        args: Value,
        ctx: &CallContext,
    ) -> Result<ToolOutcome, ToolCallError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| ToolCallError::UnknownTool(name.to_string()))?;
        debug!(tool = name, "dispatching tool call");
        handler(args, ctx)
    }

    pub fn tools(&self) -> &[MCPTool] {
        &self.tools
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Deserialize)]
    struct Pair {
        a: f64,
        b: f64,
    }

    fn pair_tool(name: &str) -> MCPTool {
        MCPTool {
            name: name.to_string(),
            description: "test tool".to_string(),
            input_schema: serde_json::json!({ "type": "object" }),
        }
    }

    #[test]
    fn test_register_and_dispatch() {
        let mut registry = ToolRegistry::new();
        registry.register_typed(pair_tool("sum"), |Pair { a, b }: Pair, _ctx: &CallContext| {
            ToolOutcome::Success(a + b)
        });

        assert_eq!(registry.tool_count(), 1);
        let outcome = registry
            .dispatch("sum", serde_json::json!({ "a": 1, "b": 2.5 }), &CallContext::default())
            .unwrap();
        assert_eq!(outcome, ToolOutcome::Success(3.5));
    }

    #[test]
    fn test_invalid_arguments_never_reach_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();

        let mut registry = ToolRegistry::new();
        registry.register_typed(pair_tool("sum"), move |Pair { a, b }: Pair, _ctx: &CallContext| {
            seen.fetch_add(1, Ordering::SeqCst);
            ToolOutcome::Success(a + b)
        });

        let ctx = CallContext::default();
        for args in [
            serde_json::json!({ "a": "1", "b": 2 }),
            serde_json::json!({ "a": 1 }),
            serde_json::json!(null),
            serde_json::json!([1, 2]),
        ] {
            let err = registry.dispatch("sum", args, &ctx).unwrap_err();
            assert!(matches!(err, ToolCallError::InvalidParams(_)));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry
            .dispatch("nope", serde_json::json!({}), &CallContext::default())
            .unwrap_err();
        assert_eq!(err, ToolCallError::UnknownTool("nope".to_string()));
    }

    #[test]
    fn test_reregister_replaces_tool() {
        let mut registry = ToolRegistry::new();
        registry.register_typed(pair_tool("op"), |Pair { a, b }: Pair, _: &CallContext| {
            ToolOutcome::Success(a + b)
        });
        registry.register_typed(pair_tool("op"), |Pair { a, b }: Pair, _: &CallContext| {
            ToolOutcome::Success(a * b)
        });

        assert_eq!(registry.tool_count(), 1);
        let outcome = registry
            .dispatch("op", serde_json::json!({ "a": 3, "b": 4 }), &CallContext::default())
            .unwrap();
        assert_eq!(outcome, ToolOutcome::Success(12.0));
    }

    #[test]
    fn test_outcome_flattening() {
        let ok = ToolOutcome::Success(12.0).into_call_result();
        assert_eq!(ok["content"][0]["type"], "text");
        assert_eq!(ok["content"][0]["text"], "12");
        assert_eq!(ok["isError"], false);

        let denied = ToolOutcome::Failure(ToolFailure::Unauthorized).into_call_result();
        assert_eq!(denied["content"][0]["text"], "Unauthorized: Invalid or missing token");
        assert_eq!(denied["isError"], true);
    }

    #[test]
    fn test_tool_definition_uses_camel_case_schema_key() {
        let json = serde_json::to_value(pair_tool("sum")).unwrap();
        assert!(json.get("inputSchema").is_some());
        assert!(json.get("input_schema").is_none());
    }
}
