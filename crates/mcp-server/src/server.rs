//! Main MCP server orchestration

use std::future::Future;
use std::sync::Arc;

use fireblocks_client::CustodyApi;
use tracing::info;

use crate::error::{RegistryError, TransportError};
use crate::operations;
use crate::tools::{Dispatcher, ToolRegistry};
use crate::transport::{HttpConfig, SseTransport, StdioTransport, StreamableHttpTransport};

/// Server mode
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServerMode {
    /// stdio transport (for desktop MCP clients)
    #[default]
    Stdio,
    /// Single-connection SSE transport
    Sse { host: String, port: u16 },
    /// Session-multiplexed streamable HTTP transport
    Http(HttpConfig),
}

/// Register every Fireblocks operation and wrap them in a dispatcher.
///
/// Fails if two operations share a name.
pub fn build_dispatcher(api: Arc<dyn CustodyApi>, allow_writes: bool) -> Result<Dispatcher, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register(operations::all(&api, allow_writes))?;
    info!("Registered {} tools", registry.len());
    Ok(Dispatcher::new(registry))
}

/// MCP server
pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
    mode: ServerMode,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            mode: ServerMode::default(),
        }
    }

    /// Set the server mode
    pub fn with_mode(mut self, mode: ServerMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> &ServerMode {
        &self.mode
    }

    /// Run the selected transport until it ends or `shutdown` resolves
    pub async fn run<F>(&self, shutdown: F) -> Result<(), TransportError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match &self.mode {
            ServerMode::Stdio => {
                info!("Starting MCP server in stdio mode");
                let mut transport = StdioTransport::new(self.dispatcher.clone());
                tokio::select! {
                    result = transport.run() => result,
                    _ = shutdown => {
                        info!("Closing stdio transport");
                        Ok(())
                    }
                }
            }
            ServerMode::Sse { host, port } => {
                info!("Starting MCP server in SSE mode on {}:{}", host, port);
                SseTransport::new(self.dispatcher.clone(), host.clone(), *port)
                    .run(shutdown)
                    .await
            }
            ServerMode::Http(config) => {
                info!(
                    "Starting MCP server in streamable HTTP mode on {}:{}",
                    config.host, config.port
                );
                StreamableHttpTransport::new(self.dispatcher.clone(), config.clone())
                    .run(shutdown)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::test_support::StubApi;
    use serde_json::Value;

    #[test]
    fn test_build_dispatcher_respects_write_gate() {
        let api: Arc<dyn CustodyApi> = Arc::new(StubApi::returning(Value::Null));

        let read_only = build_dispatcher(api.clone(), false).unwrap();
        assert_eq!(read_only.tools().len(), 16);

        let writable = build_dispatcher(api, true).unwrap();
        assert_eq!(writable.tools().len(), 17);
    }

    #[test]
    fn test_default_mode_is_stdio() {
        let server = McpServer::new(Arc::new(Dispatcher::new(ToolRegistry::new())));
        assert_eq!(server.mode(), &ServerMode::Stdio);
    }
}
