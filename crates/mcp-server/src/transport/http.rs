//! Streamable HTTP transport with per-session protocol connections

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header::HeaderName, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use futures::StreamExt;
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use super::session::{SessionTable, SessionTransport, SESSION_ID_HEADER};
use super::bind;
use crate::error::{panic_message, TransportError};
use crate::protocol::{McpError, McpMessage, ServerIdentity};
use crate::tools::Dispatcher;

/// Maximum accepted request body
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Listener and CORS settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// `*` allows any origin
    pub cors_origin: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            cors_origin: "*".to_string(),
        }
    }
}

/// Shared state for streamable HTTP handlers
#[derive(Clone)]
struct HttpState {
    sessions: SessionTable,
    identity: ServerIdentity,
    started: Instant,
}

/// Streamable HTTP transport for MCP protocol
pub struct StreamableHttpTransport {
    config: HttpConfig,
    sessions: SessionTable,
    started: Instant,
}

impl StreamableHttpTransport {
    /// Create a new streamable HTTP transport
    pub fn new(dispatcher: Arc<Dispatcher>, config: HttpConfig) -> Self {
        Self {
            config,
            sessions: SessionTable::new(dispatcher),
            started: Instant::now(),
        }
    }

    /// Live sessions of this transport
    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Build the HTTP routes
    pub fn router(&self) -> Result<Router, TransportError> {
        let state = HttpState {
            sessions: self.sessions.clone(),
            identity: ServerIdentity::default(),
            started: self.started,
        };

        Ok(Router::new()
            .route("/health", get(health))
            .route("/mcp", get(open_stream).post(post_messages).delete(terminate))
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .layer(cors_layer(&self.config.cors_origin)?)
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::custom(handle_panic))
            .with_state(state))
    }

    /// Run the HTTP server until `shutdown` resolves, then close every session
    pub async fn run<F>(&self, shutdown: F) -> Result<(), TransportError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router()?;
        let listener = bind(&self.config.host, self.config.port).await?;
        info!(
            "{} running on Streamable HTTP transport at http://{}:{}/mcp",
            ServerIdentity::default().name,
            self.config.host,
            self.config.port
        );

        let sessions = self.sessions.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                sessions.shutdown();
            })
            .await?;

        info!("Streamable HTTP transport shut down");
        Ok(())
    }
}

fn cors_layer(origin: &str) -> Result<CorsLayer, TransportError> {
    let allow_origin = if origin == "*" {
        AllowOrigin::any()
    } else {
        let value = HeaderValue::from_str(origin)
            .map_err(|e| TransportError::Config(format!("Invalid CORS origin {:?}: {}", origin, e)))?;
        AllowOrigin::exact(value)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(SESSION_ID_HEADER)]))
}

/// Session named by the request header, or a fresh one
fn resolve_session(state: &HttpState, headers: &HeaderMap) -> Arc<SessionTransport> {
    let requested = headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());

    let session_id = match requested {
        Some(id) => id.to_string(),
        None => SessionTable::generate_id(),
    };

    state.sessions.get_or_create(&session_id).0
}

fn with_session_header(mut response: Response, session: &SessionTransport) -> Response {
    if let Ok(value) = HeaderValue::from_str(session.session_id()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(SESSION_ID_HEADER), value);
    }
    response
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}

/// Health check endpoint
async fn health(State(state): State<HttpState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": state.identity.name,
        "version": state.identity.version,
        "transport": "Streamable HTTP",
        "uptime": state.started.elapsed().as_secs(),
        "activeSessions": state.sessions.len(),
    }))
}

/// Handle a single JSON-RPC message or a batch.
///
/// A session is only looked up or minted once the body holds at least one
/// decodable JSON-RPC message.
async fn post_messages(State(state): State<HttpState>, headers: HeaderMap, body: Bytes) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to parse request body: {}", e);
            return (StatusCode::BAD_REQUEST, Json(McpMessage::parse_error(e))).into_response();
        }
    };

    let (items, batched) = match payload {
        Value::Array(batch) if batch.is_empty() => {
            return (
                StatusCode::BAD_REQUEST,
                Json(McpMessage::error_response(Some(Value::Null), McpError::invalid_request())),
            )
                .into_response();
        }
        Value::Array(batch) => (batch, true),
        single => (vec![single], false),
    };

    let messages: Vec<Result<McpMessage, serde_json::Error>> =
        items.into_iter().map(serde_json::from_value).collect();
    let session = messages
        .iter()
        .any(Result::is_ok)
        .then(|| resolve_session(&state, &headers));

    let mut responses = Vec::new();
    for message in messages {
        let outcome = match (message, &session) {
            (Ok(message), Some(session)) => dispatch(session, message).await,
            (Err(e), _) => {
                debug!("Invalid JSON-RPC message: {}", e);
                Ok(Some(McpMessage::error_response(
                    Some(Value::Null),
                    McpError::invalid_request().with_data(Value::String(e.to_string())),
                )))
            }
            (Ok(_), None) => Ok(None),
        };

        match outcome {
            Ok(Some(response)) => responses.push(response),
            Ok(None) => {}
            Err(e) => {
                error!("Error handling MCP request: {}", e);
                let response = internal_error();
                return match &session {
                    Some(session) => with_session_header(response, session),
                    None => response,
                };
            }
        }
    }

    let response = if responses.is_empty() {
        StatusCode::ACCEPTED.into_response()
    } else if batched {
        Json(responses).into_response()
    } else {
        Json(responses.remove(0)).into_response()
    };

    match &session {
        Some(session) => with_session_header(response, session),
        None => response,
    }
}

async fn dispatch(session: &SessionTransport, message: McpMessage) -> Result<Option<McpMessage>, TransportError> {
    let tool = message
        .params
        .as_ref()
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string);
    info!(
        session_id = %session.session_id(),
        id = ?message.id,
        method = ?message.method,
        tool = ?tool,
        "POST /mcp"
    );

    session.handle(message).await
}

/// Event stream for server-initiated messages; ends when the session closes
async fn open_stream(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    let session = resolve_session(&state, &headers);
    info!(session_id = %session.session_id(), "GET /mcp stream opened");

    let closing = session.clone();
    let stream = futures::stream::once(async move { closing.wait_closed().await })
        .filter_map(|_| async { None::<Result<Event, Infallible>> });

    let response = Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response();
    with_session_header(response, &session)
}

/// Explicit session termination
async fn terminate(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    let Some(session_id) = headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Session ID required for termination" })),
        )
            .into_response();
    };

    if !state.sessions.remove(session_id) {
        debug!(session_id = %session_id, "Termination requested for unknown session");
    }

    (
        StatusCode::OK,
        Json(json!({ "message": "Session terminated successfully" })),
    )
        .into_response()
}

fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    error!("Error handling MCP request: panic: {}", panic_message(err.as_ref()));
    internal_error()
}
