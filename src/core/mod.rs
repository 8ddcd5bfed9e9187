/// Core Server Framework Module
///
/// This module contains the core server implementation including:
/// - auth.rs: Credential gate shared by every tool
/// - config.rs: Environment-driven configuration
/// - error.rs: Startup and dispatch error types
/// - registry.rs: Tool definitions, typed handlers and results
/// - server.rs: MCP server implementation with HTTP, SSE and STDIO transports
/// - utils.rs: Number rendering and header helpers

pub mod auth;
pub mod config;
pub mod error;
pub mod registry;
pub mod server;
pub mod utils;
