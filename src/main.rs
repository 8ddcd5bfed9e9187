/// Authenticated Calculator MCP Server Entry Point
///
/// Loads configuration from environment variables, sets up logging, builds
/// the tool registry and starts the configured transports.
///
/// Environment Variables:
/// - SERVER_NAME: Name of the server (default: "Authenticated Calculator")
/// - SERVER_VERSION: Version string (default: "1.0.0")
/// - MCP_TRANSPORT_MODE: "stdio", "http", or "both" (default: "both")
/// - HOST: Bind address for HTTP mode (default: "0.0.0.0")
/// - PORT: Port number for HTTP mode (default: 3000)
/// - WORKER_THREADS: HTTP worker count (default: CPU count, max 16)
/// - AUTH_TOKEN: Shared secret; every tool call is unauthorized while unset
/// - AUTH_TOKEN_SOURCE: "configured" or "caller" (default: "configured")
/// - LOG_FORMAT: "pretty" or "json" (default: "pretty")
/// - RUST_LOG: Log filter (default: "info")

mod core;
mod tools;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::core::auth::{CredentialGate, TokenSource};
use crate::core::config::{Config, LogFormat, TransportMode};
use crate::core::error::ServerError;
use crate::core::server::{self, AppState};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the STDIO protocol stream, so logs always go to stderr
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    match (&config.auth_token, config.token_source) {
        (None, _) => warn!("AUTH_TOKEN is not set; every tool call will be unauthorized"),
        (Some(token), _) if token.is_empty() => {
            warn!("AUTH_TOKEN is empty; every tool call will be unauthorized")
        }
        (Some(_), TokenSource::Configured) => warn!(
            "AUTH_TOKEN_SOURCE=configured compares the secret with itself; \
             caller credentials are not checked"
        ),
        (Some(_), TokenSource::Caller) => info!("tool calls require a matching bearer token"),
    }

    let gate = CredentialGate::new(config.auth_token.clone(), config.token_source);
    let state = AppState::new(
        config.server_name.clone(),
        config.server_version.clone(),
        server::initialize_tools(gate),
    );

    match config.transport {
        TransportMode::Stdio => server::run_server_stdio(state).await?,
        TransportMode::Http => server::run_server_http(&config, state).await?,
        TransportMode::Both => {
            // STDIO in the background for MCP Inspector, HTTP in the foreground
            let stdio_state = state.clone();
            let stdio_handle = tokio::spawn(async move {
                if let Err(e) = server::run_server_stdio(stdio_state).await {
                    error!(error = %e, "STDIO server error");
                }
            });

            let http_result = server::run_server_http(&config, state).await;
            stdio_handle.abort();
            http_result?;
        }
    }

    Ok(())
}
