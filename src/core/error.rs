/// Error Types
///
/// Startup errors abort the process. Tool call errors are protocol-level
/// failures that become JSON-RPC error objects; they are distinct from the
/// textual failures a tool returns as ordinary content.

use thiserror::Error;

/// Errors raised while configuring or starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to read configuration: {0}")]
    Config(#[from] envy::Error),

    #[error("invalid value '{value}' for {name}: expected {expected}")]
    InvalidSetting {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised by the dispatch layer before or instead of running a handler.
#[derive(Debug, Error, PartialEq)]
pub enum ToolCallError {
    /// Arguments did not match the tool's declared schema.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// No tool registered under this name. Reported as invalid params, like
    /// any other bad `tools/call` argument.
    #[error("Tool {0} not found")]
    UnknownTool(String),
}

impl ToolCallError {
    /// JSON-RPC 2.0 error code for this failure.
    pub fn code(&self) -> i32 {
        match self {
            ToolCallError::InvalidParams(_) | ToolCallError::UnknownTool(_) => -32602,
        }
    }
}
