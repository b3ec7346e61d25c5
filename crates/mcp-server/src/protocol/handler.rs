//! MCP request handler

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::capabilities::ServerCapabilities;
use super::types::*;
use crate::tools::Dispatcher;

/// Name reported in `initialize` and on the HTTP info endpoints
pub const SERVER_NAME: &str = "Fireblocks MCP Server";

/// Server name and version advertised to clients
#[derive(Debug, Clone, PartialEq)]
pub struct ServerIdentity {
    pub name: String,
    pub version: String,
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Handler for MCP requests.
///
/// One handler is bound per client connection or session; the dispatcher
/// behind it is shared.
pub struct RequestHandler {
    dispatcher: Arc<Dispatcher>,
    identity: ServerIdentity,
    initialized: bool,
}

impl RequestHandler {
    /// Create a new request handler
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self::with_identity(dispatcher, ServerIdentity::default())
    }

    pub fn with_identity(dispatcher: Arc<Dispatcher>, identity: ServerIdentity) -> Self {
        Self {
            dispatcher,
            identity,
            initialized: false,
        }
    }

    /// Whether the client completed `initialize`
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Handle an incoming message
    pub async fn handle(&mut self, message: McpMessage) -> Option<McpMessage> {
        match (message.method, message.id) {
            (Some(method), Some(id)) => {
                debug!("Handling request: {}", method);

                let result = match method.as_str() {
                    "initialize" => self.handle_initialize(message.params),
                    "ping" => Ok(serde_json::json!({})),
                    "tools/list" => self.handle_tools_list(),
                    "tools/call" => self.handle_tools_call(message.params).await,
                    _ => Err(McpError::method_not_found(&method)),
                };

                Some(match result {
                    Ok(result) => McpMessage::response(id, result),
                    Err(error) => McpMessage::error_response(Some(id), error),
                })
            }
            (Some(method), None) => {
                debug!("Received notification: {}", method);

                match method.as_str() {
                    "notifications/initialized" | "initialized" => {
                        info!("Client initialized");
                    }
                    "notifications/cancelled" => {
                        debug!("Request cancelled");
                    }
                    _ => {
                        debug!("Unknown notification: {}", method);
                    }
                }

                None
            }
            (None, Some(id)) if message.result.is_none() && message.error.is_none() => {
                Some(McpMessage::error_response(Some(id), McpError::invalid_request()))
            }
            _ => {
                // Response - we don't expect these in server mode
                debug!("Received unexpected response");
                None
            }
        }
    }

    /// Handle initialize request
    fn handle_initialize(&mut self, params: Option<Value>) -> Result<Value, McpError> {
        let params: InitializeParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::invalid_params(e.to_string()))?
            .ok_or_else(|| McpError::invalid_params("Missing params"))?;

        match &params.client_info {
            Some(client) => info!(
                "Initializing session with client: {} v{} (protocol {})",
                client.name, client.version, params.protocol_version
            ),
            None => info!("Initializing session (protocol {})", params.protocol_version),
        }

        self.initialized = true;

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities::with_tools(),
            server_info: ServerInfo {
                name: self.identity.name.clone(),
                version: self.identity.version.clone(),
            },
        };

        serde_json::to_value(result).map_err(|e| McpError::internal_error(e.to_string()))
    }

    /// Handle tools/list request
    fn handle_tools_list(&self) -> Result<Value, McpError> {
        serde_json::to_value(self.dispatcher.list_tools())
            .map_err(|e| McpError::internal_error(e.to_string()))
    }

    /// Handle tools/call request
    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: ToolCallParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::invalid_params(e.to_string()))?
            .ok_or_else(|| McpError::invalid_params("Missing params"))?;

        debug!("Calling tool: {}", params.name);

        let result = self
            .dispatcher
            .call_tool(&params.name, params.arguments)
            .await?;

        serde_json::to_value(result).map_err(|e| McpError::internal_error(e.to_string()))
    }
}
