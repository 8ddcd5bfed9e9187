/// Add Tool Implementation
///
/// Adds two numbers. Gated by the credential check like every other tool.

use serde::Deserialize;
use std::sync::Arc;

use crate::core::auth::{CallContext, CredentialGate};
use crate::core::registry::{MCPTool, ToolFailure, ToolOutcome, ToolRegistry};

/// Arguments for the `add` tool.
#[derive(Debug, Deserialize)]
pub struct AddArgs {
    pub a: f64,
    pub b: f64,
}

/// Register the add tool with the tool registry.
pub fn register(registry: &mut ToolRegistry, gate: Arc<CredentialGate>) {
    let tool = MCPTool {
        name: "add".to_string(),
        description: "Add two numbers.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "a": { "type": "number" },
                "b": { "type": "number" }
            },
            "required": ["a", "b"]
        }),
    };

    registry.register_typed(tool, move |args: AddArgs, ctx: &CallContext| {
        add(&gate, ctx, args)
    });
}

pub fn add(gate: &CredentialGate, ctx: &CallContext, AddArgs { a, b }: AddArgs) -> ToolOutcome {
    if !gate.authorize(ctx) {
        return ToolOutcome::Failure(ToolFailure::Unauthorized);
    }
    ToolOutcome::Success(a + b)
}
