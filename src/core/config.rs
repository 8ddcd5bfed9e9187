/// Server Configuration
///
/// All settings come from environment variables (uppercase names matching
/// the field names, e.g. `MCP_TRANSPORT_MODE`, `AUTH_TOKEN`). Values are read
/// once at startup and passed down explicitly; nothing below `main` looks at
/// the environment.

use serde::Deserialize;

use crate::core::auth::TokenSource;
use crate::core::error::ServerError;

/// Which transports the server runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Line-delimited JSON-RPC on stdin/stdout (MCP Inspector, local clients)
    Stdio,
    /// Actix Web server with `/mcp` and `/sse` endpoints
    Http,
    /// Both of the above, concurrently
    Both,
}

/// Log output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Environment variables as they arrive, before validation.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_server_name")]
    server_name: String,

    #[serde(default = "default_server_version")]
    server_version: String,

    #[serde(default = "default_transport_mode")]
    mcp_transport_mode: String,

    #[serde(default = "default_host")]
    host: String,

    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    worker_threads: Option<usize>,

    #[serde(default)]
    auth_token: Option<String>,

    #[serde(default = "default_token_source")]
    auth_token_source: String,

    #[serde(default = "default_log_format")]
    log_format: String,
}

fn default_server_name() -> String {
    "Authenticated Calculator".to_string()
}

fn default_server_version() -> String {
    "1.0.0".to_string()
}

fn default_transport_mode() -> String {
    "both".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_token_source() -> String {
    "configured".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server name reported in `initialize` responses
    pub server_name: String,
    /// Server version reported in `initialize` responses
    pub server_version: String,
    pub transport: TransportMode,
    /// Bind address for HTTP mode
    pub host: String,
    pub port: u16,
    /// Actix worker count; defaults to the CPU count capped at 16
    pub worker_threads: usize,
    /// Shared secret gating tool access. `None` or empty denies every call.
    pub auth_token: Option<String>,
    pub token_source: TokenSource,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_raw(envy::from_env()?)
    }

    /// Load configuration from an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> Result<Self, ServerError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self::from_raw(envy::from_iter(vars)?)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ServerError> {
        let transport = match raw.mcp_transport_mode.to_ascii_lowercase().as_str() {
            "stdio" => TransportMode::Stdio,
            "http" => TransportMode::Http,
            "both" => TransportMode::Both,
            _ => {
                return Err(ServerError::InvalidSetting {
                    name: "MCP_TRANSPORT_MODE",
                    value: raw.mcp_transport_mode,
                    expected: "stdio, http or both",
                });
            }
        };

        let token_source = match raw.auth_token_source.to_ascii_lowercase().as_str() {
            "configured" => TokenSource::Configured,
            "caller" => TokenSource::Caller,
            _ => {
                return Err(ServerError::InvalidSetting {
                    name: "AUTH_TOKEN_SOURCE",
                    value: raw.auth_token_source,
                    expected: "configured or caller",
                });
            }
        };

        let log_format = match raw.log_format.to_ascii_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            _ => {
                return Err(ServerError::InvalidSetting {
                    name: "LOG_FORMAT",
                    value: raw.log_format,
                    expected: "pretty or json",
                });
            }
        };

        // Capped at 16 to avoid excessive context switching
        let worker_threads = raw
            .worker_threads
            .filter(|n| *n > 0)
            .unwrap_or_else(|| num_cpus::get().clamp(1, 16));

        Ok(Self {
            server_name: raw.server_name,
            server_version: raw.server_version,
            transport,
            host: raw.host,
            port: raw.port,
            worker_threads,
            auth_token: raw.auth_token,
            token_source,
            log_format,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
