//! Transport implementations for MCP server

mod http;
mod session;
mod sse;
mod stdio;

pub use http::{HttpConfig, StreamableHttpTransport, MAX_BODY_BYTES};
pub use session::{SessionTable, SessionTransport, SESSION_ID_HEADER};
pub use sse::{SseTransport, MESSAGES_PATH};
pub use stdio::StdioTransport;

use tokio::net::TcpListener;

use crate::error::TransportError;

/// Bind a TCP listener, naming the address on failure
async fn bind(host: &str, port: u16) -> Result<TcpListener, TransportError> {
    let addr = format!("{}:{}", host, port);
    let bound = TcpListener::bind(addr.as_str()).await;
    match bound {
        Ok(listener) => Ok(listener),
        Err(source) => Err(TransportError::Bind { addr, source }),
    }
}
