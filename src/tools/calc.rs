/// Calculate Tool Implementation
///
/// Four-function calculator. The operation selector is a closed enum, so an
/// unknown operation fails argument validation instead of reaching the handler.

use serde::Deserialize;
use std::sync::Arc;

use crate::core::auth::{CallContext, CredentialGate};
use crate::core::registry::{MCPTool, ToolFailure, ToolOutcome, ToolRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    /// Wire names, in the order advertised by the input schema.
    pub const NAMES: [&'static str; 4] = ["add", "subtract", "multiply", "divide"];

    pub fn apply(self, a: f64, b: f64) -> ToolOutcome {
        match self {
            Operation::Add => ToolOutcome::Success(a + b),
            Operation::Subtract => ToolOutcome::Success(a - b),
            Operation::Multiply => ToolOutcome::Success(a * b),
            // -0.0 == 0.0, so negative zero is rejected too
            Operation::Divide if b == 0.0 => ToolOutcome::Failure(ToolFailure::DivisionByZero),
            Operation::Divide => ToolOutcome::Success(a / b),
        }
    }
}

/// Arguments for the `calculate` tool.
#[derive(Debug, Deserialize)]
pub struct CalculateArgs {
    pub operation: Operation,
    pub a: f64,
    pub b: f64,
}

/// Register the calculate tool with the tool registry.
pub fn register(registry: &mut ToolRegistry, gate: Arc<CredentialGate>) {
    let tool = MCPTool {
        name: "calculate".to_string(),
        description: "Perform a basic arithmetic operation on two numbers.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": Operation::NAMES
                },
                "a": { "type": "number" },
                "b": { "type": "number" }
            },
            "required": ["operation", "a", "b"]
        }),
    };

    registry.register_typed(tool, move |args: CalculateArgs, ctx: &CallContext| {
        calculate(&gate, ctx, args)
    });
}

pub fn calculate(gate: &CredentialGate, ctx: &CallContext, args: CalculateArgs) -> ToolOutcome {
    if !gate.authorize(ctx) {
        return ToolOutcome::Failure(ToolFailure::Unauthorized);
    }
    args.operation.apply(args.a, args.b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::TokenSource;
    use crate::core::error::ToolCallError;

    fn registry_with_secret(secret: Option<&str>, source: TokenSource) -> ToolRegistry {
        let gate = Arc::new(CredentialGate::new(secret.map(str::to_string), source));
        let mut registry = ToolRegistry::new();
        register(&mut registry, gate);
        registry
    }

    fn call(
        registry: &ToolRegistry,
        args: serde_json::Value,
    ) -> Result<ToolOutcome, ToolCallError> {
        registry.dispatch("calculate", args, &CallContext::default())
    }

    #[test]
    fn test_operations() {
        let registry = registry_with_secret(Some("S"), TokenSource::Configured);

        let cases = [
            ("add", 2.0, 3.0, "5"),
            ("subtract", 2.0, 5.0, "-3"),
            ("multiply", 3.0, 4.0, "12"),
            ("divide", 7.0, 2.0, "3.5"),
            ("divide", 1.0, 3.0, "0.3333333333333333"),
        ];
        for (operation, a, b, expected) in cases {
            let outcome = call(
                &registry,
                serde_json::json!({ "operation": operation, "a": a, "b": b }),
            )
            .unwrap();
            assert_eq!(outcome.text(), expected, "{} {} {}", operation, a, b);
        }
    }

    #[test]
    fn test_divide_by_zero_is_text_not_error() {
        let registry = registry_with_secret(Some("S"), TokenSource::Configured);

        for a in [0.0, 5.0, -5.0] {
            for b in [0.0, -0.0] {
                let outcome = call(
                    &registry,
                    serde_json::json!({ "operation": "divide", "a": a, "b": b }),
                )
                .unwrap();
                assert_eq!(outcome, ToolOutcome::Failure(ToolFailure::DivisionByZero));
                assert_eq!(outcome.text(), "Error: Cannot divide by zero");
            }
        }
    }

    #[test]
    fn test_unauthorized_takes_precedence_over_division_by_zero() {
        let registry = registry_with_secret(None, TokenSource::Configured);
        let outcome = call(
            &registry,
            serde_json::json!({ "operation": "divide", "a": 1, "b": 0 }),
        )
        .unwrap();
        assert_eq!(outcome.text(), "Unauthorized: Invalid or missing token");
    }

    #[test]
    fn test_unknown_operation_rejected_before_handler() {
        let registry = registry_with_secret(Some("S"), TokenSource::Configured);
        let err = call(
            &registry,
            serde_json::json!({ "operation": "modulo", "a": 5, "b": 3 }),
        )
        .unwrap_err();
        assert!(matches!(err, ToolCallError::InvalidParams(_)));

        // Validation runs before the credential check.
        let registry = registry_with_secret(None, TokenSource::Configured);
        let err = call(
            &registry,
            serde_json::json!({ "operation": "add", "a": "five", "b": 3 }),
        )
        .unwrap_err();
        assert_eq!(err.code(), -32602);
    }

    #[test]
    fn test_configured_secret_ignores_caller_credential() {
        let registry = registry_with_secret(Some("S"), TokenSource::Configured);
        let ctx = CallContext::with_bearer("not-the-secret");
        let outcome = registry
            .dispatch(
                "calculate",
                serde_json::json!({ "operation": "multiply", "a": 3, "b": 4 }),
                &ctx,
            )
            .unwrap();
        assert_eq!(outcome.text(), "12");
    }

    #[test]
    fn test_caller_source_requires_matching_bearer() {
        let registry = registry_with_secret(Some("S"), TokenSource::Caller);
        let args = serde_json::json!({ "operation": "add", "a": 1, "b": 1 });

        let denied = registry
            .dispatch("calculate", args.clone(), &CallContext::with_bearer("nope"))
            .unwrap();
        assert_eq!(denied, ToolOutcome::Failure(ToolFailure::Unauthorized));

        let allowed = registry
            .dispatch("calculate", args, &CallContext::with_bearer("S"))
            .unwrap();
        assert_eq!(allowed.text(), "2");
    }

    #[test]
    fn test_schema_lists_every_operation() {
        let registry = registry_with_secret(Some("S"), TokenSource::Configured);
        let schema = &registry.tools()[0].input_schema;
        assert_eq!(
            schema["properties"]["operation"]["enum"],
            serde_json::json!(["add", "subtract", "multiply", "divide"])
        );
    }
}
