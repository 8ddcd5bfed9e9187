/// MCP Server Implementation
///
/// This module contains the core MCP server implementation including:
/// - JSON-RPC 2.0 request/response structures
/// - Method routing shared by every transport
/// - HTTP server setup with Actix Web (`/mcp` request/response, `/sse` streaming)
/// - STDIO server implementation for line-based communication

use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer, Result,
    http::header,
    middleware::{Compress, DefaultHeaders, Logger},
    web,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::core::auth::{CallContext, CredentialGate};
use crate::core::config::Config;
use crate::core::error::ToolCallError;
use crate::core::registry::ToolRegistry;
use crate::core::utils;
use crate::tools;

/// MCP protocol revision reported by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Path clients POST to after opening an SSE stream.
const SSE_MESSAGE_PATH: &str = "/sse/message";

/// Application state shared by all transports.
///
/// Cloning is cheap: the registry and the SSE session table are behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server name as reported in MCP initialize responses
    pub server_name: String,
    /// Server version string as reported in MCP initialize responses
    pub server_version: String,
    pub registry: Arc<ToolRegistry>,
    pub sessions: SseSessions,
}

impl AppState {
    pub fn new(server_name: String, server_version: String, registry: Arc<ToolRegistry>) -> Self {
        Self {
            server_name,
            server_version,
            registry,
            sessions: SseSessions::default(),
        }
    }
}

/// JSON-RPC 2.0 request structure for MCP protocol.
#[derive(Deserialize, Debug)]
pub struct MCPRequest {
    /// JSON-RPC version identifier, must be "2.0"
    #[allow(dead_code)]
    jsonrpc: String,
    /// Request ID for correlating responses. None indicates a notification.
    #[serde(default)]
    id: Option<Value>,
    /// MCP method name (e.g., "initialize", "tools/list", "tools/call")
    method: String,
    /// Method-specific parameters as JSON value
    #[serde(default)]
    params: Option<Value>,
}

/// JSON-RPC 2.0 response structure for MCP protocol.
///
/// Carries either a result or an error, never both.
#[derive(Serialize, Debug)]
pub struct MCPResponse {
    jsonrpc: String,
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<MCPError>,
}

impl MCPResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Option<Value>, error: MCPError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC 2.0 error structure.
#[derive(Serialize, Debug)]
pub struct MCPError {
    /// JSON-RPC error code (e.g., -32601 for method not found)
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl MCPError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<ToolCallError> for MCPError {
    fn from(err: ToolCallError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// `tools/call` parameters.
#[derive(Deserialize, Debug)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

/// Initialize and register all tools.
///
/// Every tool shares the same credential gate.
pub fn initialize_tools(gate: CredentialGate) -> Arc<ToolRegistry> {
    let gate = Arc::new(gate);
    let mut registry = ToolRegistry::new();

    tools::add::register(&mut registry, gate.clone());
    tools::calc::register(&mut registry, gate);

    Arc::new(registry)
}

/// Parse a raw JSON-RPC message.
///
/// Malformed JSON yields a parse error (-32700). Batches, non-object
/// messages, null ids and objects that are not requests yield an invalid
/// request error (-32600).
fn parse_request(body: &[u8]) -> std::result::Result<MCPRequest, MCPResponse> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "failed to parse JSON-RPC message");
        MCPResponse::failure(None, MCPError::new(-32700, format!("Parse error: {}", e)))
    })?;

    let invalid = |id: Option<Value>, message: &str| {
        warn!(reason = message, "invalid JSON-RPC request");
        MCPResponse::failure(id, MCPError::new(-32600, format!("Invalid Request: {}", message)))
    };

    let object = match &value {
        Value::Object(object) => object,
        Value::Array(_) => return Err(invalid(None, "batch requests are not supported")),
        _ => return Err(invalid(None, "expected a JSON-RPC request object")),
    };

    // Absent id means notification; an explicit null id is not allowed
    let id = object.get("id").cloned();
    if id.as_ref().is_some_and(Value::is_null) {
        return Err(invalid(None, "id must not be null"));
    }

    serde_json::from_value(value).map_err(|e| {
        warn!(error = %e, "invalid JSON-RPC request");
        MCPResponse::failure(id, MCPError::new(-32600, format!("Invalid Request: {}", e)))
    })
}

/// Route a JSON-RPC request to its method handler.
///
/// Returns `None` for notifications, which never get a response.
fn handle_request(state: &AppState, req: MCPRequest, ctx: &CallContext) -> Option<MCPResponse> {
    if req.id.is_none() {
        debug!(method = %req.method, "notification received");
        return None;
    }

    let id = req.id;
    let response = match req.method.as_str() {
        "initialize" => MCPResponse::success(
            id,
            serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": state.server_name,
                    "version": state.server_version
                }
            }),
        ),
        "ping" => MCPResponse::success(id, serde_json::json!({})),
        "tools/list" => MCPResponse::success(
            id,
            serde_json::json!({
                "tools": state.registry.tools()
            }),
        ),
        "tools/call" => handle_tools_call(&state.registry, id, req.params, ctx),
        other => MCPResponse::failure(
            id,
            MCPError::new(-32601, format!("Method not found: {}", other)),
        ),
    };
    Some(response)
}

/// Handle MCP tools/call method.
///
/// Protocol-level failures (bad params, unknown tool) become JSON-RPC errors.
/// Handler failures (unauthorized, division by zero) become text content
/// with `isError: true`.
fn handle_tools_call(
    registry: &ToolRegistry,
    id: Option<Value>,
    params: Option<Value>,
    ctx: &CallContext,
) -> MCPResponse {
    let params: ToolCallParams = match params.map(serde_json::from_value) {
        Some(Ok(p)) => p,
        Some(Err(e)) => {
            let error = MCPError::new(-32602, format!("Invalid params: {}", e));
            return MCPResponse::failure(id, error);
        }
        None => return MCPResponse::failure(id, MCPError::new(-32602, "Invalid params")),
    };

    let arguments = params.arguments.unwrap_or_else(|| serde_json::json!({}));
    match registry.dispatch(&params.name, arguments, ctx) {
        Ok(outcome) => MCPResponse::success(id, outcome.into_call_result()),
        Err(err) => {
            debug!(tool = %params.name, error = %err, "tool call rejected");
            MCPResponse::failure(id, err.into())
        }
    }
}

/// Parse and handle one message, returning the response to send back, if any.
fn process_message(state: &AppState, body: &[u8], ctx: &CallContext) -> Option<MCPResponse> {
    match parse_request(body) {
        Ok(req) => handle_request(state, req, ctx),
        Err(response) => Some(response),
    }
}

/// Build the per-call context from HTTP headers.
fn call_context(req: &HttpRequest) -> CallContext {
    let bearer_token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(utils::bearer_token);
    CallContext { bearer_token }
}

// -----------------------------------------------------------------------------
// SSE sessions
// -----------------------------------------------------------------------------

type SessionSender = mpsc::UnboundedSender<Bytes>;

/// Open SSE streams, keyed by session id.
///
/// A session id only routes responses back to a stream. It is never a
/// credential: each POST is authorized on its own headers.
#[derive(Clone, Default)]
pub struct SseSessions {
    inner: Arc<Mutex<HashMap<String, SessionSender>>>,
}

impl SseSessions {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionSender>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn open(&self) -> (String, mpsc::UnboundedReceiver<Bytes>) {
        let id = uuid::Uuid::new_v4().to_string();
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock().insert(id.clone(), sender);
        (id, receiver)
    }

    /// Push an event onto a session's stream. Returns false if the session
    /// is unknown or its client has gone away.
    fn send(&self, id: &str, event: Bytes) -> bool {
        let mut sessions = self.lock();
        let Some(sender) = sessions.get(id) else {
            return false;
        };
        if sender.send(event).is_err() {
            sessions.remove(id);
            return false;
        }
        true
    }

    fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    fn remove(&self, id: &str) {
        self.lock().remove(id);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes the session when the client's stream is dropped.
struct SessionGuard {
    id: String,
    sessions: SseSessions,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.remove(&self.id);
        debug!(session = %self.id, "SSE session closed");
    }
}

fn sse_event(event: &str, data: &str) -> Bytes {
    Bytes::from(format!("event: {}\ndata: {}\n\n", event, data))
}

#[derive(Deserialize)]
struct SessionQuery {
    #[serde(rename = "sessionId")]
    session_id: String,
}

// -----------------------------------------------------------------------------
// HTTP handlers
// -----------------------------------------------------------------------------

/// Single request/response endpoint.
///
/// The JSON-RPC response is returned in the HTTP body. Notifications get
/// `202 Accepted` with no body.
async fn mcp_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let ctx = call_context(&req);
    match process_message(&state, &body, &ctx) {
        Some(response) => Ok(HttpResponse::Ok().json(response)),
        None => Ok(HttpResponse::Accepted().finish()),
    }
}

/// Open a Server-Sent Events stream.
///
/// The first event tells the client where to POST its requests; responses
/// to those requests arrive on this stream as `message` events.
async fn sse_connect(state: web::Data<AppState>) -> Result<HttpResponse> {
    let (session_id, receiver) = state.sessions.open();
    info!(session = %session_id, "SSE session opened");

    let endpoint = format!("{}?sessionId={}", SSE_MESSAGE_PATH, session_id);
    state.sessions.send(&session_id, sse_event("endpoint", &endpoint));

    let guard = SessionGuard {
        id: session_id,
        sessions: state.sessions.clone(),
    };
    let stream =
        futures_util::stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
            receiver
                .recv()
                .await
                .map(|chunk| (Ok::<_, std::convert::Infallible>(chunk), (receiver, guard)))
        });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(header::CacheControl(vec![
            header::CacheDirective::NoCache,
            header::CacheDirective::NoStore,
            header::CacheDirective::MustRevalidate,
        ]))
        // Keep the compression middleware off the stream
        .insert_header((header::CONTENT_ENCODING, "identity"))
        // Disable nginx buffering for real-time streaming
        .insert_header(("x-accel-buffering", "no"))
        .streaming(stream))
}

/// Accept a request for an open SSE session.
///
/// The caller credential comes from this POST's `Authorization` header only.
async fn sse_message(
    state: web::Data<AppState>,
    query: web::Query<SessionQuery>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let session_id = &query.session_id;
    if !state.sessions.contains(session_id) {
        return Ok(HttpResponse::NotFound().body("Session not found"));
    }

    let ctx = call_context(&req);

    if let Some(response) = process_message(&state, &body, &ctx) {
        let payload = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "failed to serialize response");
                return Ok(HttpResponse::InternalServerError().finish());
            }
        };
        if !state.sessions.send(session_id, sse_event("message", &payload)) {
            return Ok(HttpResponse::Gone().body("Session closed"));
        }
    }

    Ok(HttpResponse::Accepted().body("Accepted"))
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().body("Not found")
}

/// Register the MCP routes. Unmatched paths fall through to the app's default service.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/mcp", web::post().to(mcp_handler))
        .route("/sse", web::get().to(sse_connect))
        .route(SSE_MESSAGE_PATH, web::post().to(sse_message));
}

/// Run the MCP server in HTTP mode.
///
/// The server is configured with:
/// - Worker threads: from configuration (CPU count capped at 16 by default)
/// - Max connections: 10,000 concurrent connections
/// - Connection rate limit: 1,000 connections per second
/// - Keep-alive: 30 seconds
/// - Request timeout: 30 seconds
/// - Disconnect timeout: 2 seconds
/// - Shutdown timeout: 10 seconds
pub async fn run_server_http(config: &Config, state: AppState) -> std::io::Result<()> {
    use std::time::Duration;

    let bind_addr = config.bind_addr();
    let workers = config.worker_threads;

    info!(
        name = %state.server_name,
        version = %state.server_version,
        bind_addr = %bind_addr,
        workers,
        tools = state.registry.tool_count(),
        "MCP server starting (HTTP mode)"
    );

    let app_state = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            // Enable compression for JSON responses (gzip/brotli)
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("X-XSS-Protection", "1; mode=block")),
            )
            // %r = request line, %s = status, %Dms = duration in milliseconds
            .wrap(Logger::new("%r %s %Dms"))
            .configure(configure_routes)
            .default_service(web::to(not_found))
    })
    .workers(workers)
    .max_connections(10000)
    .max_connection_rate(1000)
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_secs(30))
    .client_disconnect_timeout(Duration::from_secs(2))
    .shutdown_timeout(10)
    .bind(&bind_addr)?
    .run()
    .await
}

/// Run the MCP server in STDIO mode.
///
/// Reads JSON-RPC requests line-by-line from stdin and writes responses to
/// stdout. Logging goes to stderr so it never interleaves with the protocol
/// stream. There are no headers on this transport, so calls carry no caller
/// credential.
pub async fn run_server_stdio(state: AppState) -> std::io::Result<()> {
    info!(
        name = %state.server_name,
        version = %state.server_version,
        tools = state.registry.tool_count(),
        "MCP server starting (STDIO mode)"
    );

    let stdin = BufReader::with_capacity(8192, tokio::io::stdin());
    let stdout = BufWriter::with_capacity(8192, tokio::io::stdout());
    serve_lines(&state, stdin, stdout).await?;

    info!("stdin closed, STDIO server exiting");
    Ok(())
}

/// Serve line-delimited JSON-RPC until `reader` reaches end of input.
async fn serve_lines<R, W>(state: &AppState, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let ctx = CallContext::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let Some(response) = process_message(state, line.as_bytes(), &ctx) else {
            continue;
        };

        let response_json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "failed to serialize response");
                continue;
            }
        };

        // One response per line, flushed immediately
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    Ok(())
}
