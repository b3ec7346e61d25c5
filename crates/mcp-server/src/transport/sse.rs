//! Single-connection HTTP + Server-Sent Events transport
//!
//! A client opens `GET /sse`, learns the POST endpoint from the first
//! `endpoint` event and then sends JSON-RPC messages to `POST /messages`.
//! Responses come back as `message` events on the stream. Only one stream is
//! bound at a time; opening a new one replaces the previous binding.

use std::convert::Infallible;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::bind;
use crate::error::{panic_message, TransportError};
use crate::protocol::{McpMessage, RequestHandler, ServerIdentity};
use crate::tools::Dispatcher;

/// Path announced to clients in the `endpoint` event
pub const MESSAGES_PATH: &str = "/messages";

/// The currently bound event stream
struct SseConnection {
    id: Uuid,
    /// Messages waiting for this connection's protocol worker
    inbox: mpsc::UnboundedSender<McpMessage>,
}

/// Shared state for SSE handlers
struct SseState {
    dispatcher: Arc<Dispatcher>,
    identity: ServerIdentity,
    active: Mutex<Option<Arc<SseConnection>>>,
    closed: watch::Sender<bool>,
}

impl SseState {
    fn active(&self) -> Option<Arc<SseConnection>> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn bind(&self, connection: Arc<SseConnection>) {
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(connection);

        if let Some(previous) = previous {
            warn!(connection_id = %previous.id, "Replacing existing SSE connection");
        }
    }

    /// Unbind `id` unless a newer stream already took its place
    fn release(&self, id: Uuid) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|c| c.id == id) {
            *active = None;
            info!(connection_id = %id, "SSE connection closed");
        }
    }

    /// End every open event stream and unbind the active connection
    fn close(&self) {
        self.closed.send_replace(true);
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(previous) = previous {
            info!(connection_id = %previous.id, "Closing SSE connection for shutdown");
        }
    }
}

/// Clears the binding when the event stream is dropped
struct ConnectionGuard {
    state: Arc<SseState>,
    id: Uuid,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.state.release(self.id);
    }
}

/// Handles a connection's messages one at a time, so responses reach the
/// stream in the order the requests were posted. Ends once the connection
/// is unbound and its inbox drained, or the stream is gone.
async fn run_connection(
    id: Uuid,
    mut handler: RequestHandler,
    mut inbox: mpsc::UnboundedReceiver<McpMessage>,
    outbox: mpsc::UnboundedSender<McpMessage>,
) {
    while let Some(message) = inbox.recv().await {
        if let Some(response) = handler.handle(message).await {
            if outbox.send(response).is_err() {
                debug!(connection_id = %id, "SSE stream gone; stopping connection worker");
                break;
            }
        }
    }
}

/// SSE transport for MCP protocol
pub struct SseTransport {
    state: Arc<SseState>,
    host: String,
    port: u16,
}

impl SseTransport {
    /// Create a new SSE transport
    pub fn new(dispatcher: Arc<Dispatcher>, host: impl Into<String>, port: u16) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            state: Arc::new(SseState {
                dispatcher,
                identity: ServerIdentity::default(),
                active: Mutex::new(None),
                closed,
            }),
            host: host.into(),
            port,
        }
    }

    /// Build the HTTP routes
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(describe))
            .route("/health", get(health))
            .route("/sse", get(open_stream))
            .route(MESSAGES_PATH, post(post_message))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::custom(handle_panic))
            .with_state(self.state.clone())
    }

    /// Close the bound connection and end every open event stream
    pub fn close(&self) {
        self.state.close();
    }

    /// Run the HTTP server until `shutdown` resolves, then close the bound connection
    pub async fn run<F>(&self, shutdown: F) -> Result<(), TransportError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = bind(&self.host, self.port).await?;
        info!(
            "{} running on SSE transport at http://{}:{}/sse",
            self.state.identity.name, self.host, self.port
        );

        let state = self.state.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                state.close();
            })
            .await?;

        info!("SSE transport shut down");
        Ok(())
    }
}

/// Server descriptor with the full tool list
async fn describe(State(state): State<Arc<SseState>>) -> Json<Value> {
    let tools: Vec<Value> = state
        .dispatcher
        .tools()
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name(),
                "description": tool.description(),
                "schema": tool.schema().to_json_schema(),
            })
        })
        .collect();

    Json(json!({
        "name": state.identity.name,
        "version": state.identity.version,
        "transport": "SSE",
        "capabilities": { "tools": true },
        "toolCount": tools.len(),
        "tools": tools,
    }))
}

/// Health check endpoint
async fn health(State(state): State<Arc<SseState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": state.identity.name,
        "version": state.identity.version,
        "transport": "SSE",
    }))
}

/// Bind a new event stream, replacing any previous one
async fn open_stream(
    State(state): State<Arc<SseState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (outbox, mut receiver) = mpsc::unbounded_channel();
    let (inbox, pending) = mpsc::unbounded_channel();
    let connection = Arc::new(SseConnection {
        id: Uuid::new_v4(),
        inbox,
    });

    info!(connection_id = %connection.id, "SSE connection established");

    tokio::spawn(run_connection(
        connection.id,
        RequestHandler::new(state.dispatcher.clone()),
        pending,
        outbox,
    ));

    let guard = ConnectionGuard {
        state: state.clone(),
        id: connection.id,
    };
    let mut closed = state.closed.subscribe();
    state.bind(connection);

    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok(Event::default().event("endpoint").data(MESSAGES_PATH));

        loop {
            let next = tokio::select! {
                message = receiver.recv() => message,
                _ = closed.wait_for(|closed| *closed) => None,
            };
            let Some(message) = next else {
                break;
            };

            match serde_json::to_string(&message) {
                Ok(data) => yield Ok(Event::default().event("message").data(data)),
                Err(e) => error!("Failed to serialize message: {}", e),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Accept a JSON-RPC message for the bound stream
async fn post_message(State(state): State<Arc<SseState>>, body: Bytes) -> Response {
    let Some(connection) = state.active() else {
        debug!("No SSE stream bound; dropping message");
        return StatusCode::ACCEPTED.into_response();
    };

    let message: McpMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            error!("Failed to parse message: {}", e);
            return (StatusCode::BAD_REQUEST, Json(McpMessage::parse_error(e))).into_response();
        }
    };

    debug!(
        connection_id = %connection.id,
        id = ?message.id,
        method = ?message.method,
        "Received message"
    );

    if connection.inbox.send(message).is_err() {
        debug!(connection_id = %connection.id, "SSE connection worker gone; message dropped");
    }

    StatusCode::ACCEPTED.into_response()
}

fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    error!("Request handler panicked: {}", panic_message(err.as_ref()));
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}
