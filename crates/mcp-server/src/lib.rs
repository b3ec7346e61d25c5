//! # fireblocks-mcp
//!
//! MCP (Model Context Protocol) server for the Fireblocks custody API.
//! Exposes a fixed set of Fireblocks operations as MCP tools over stdio,
//! single-connection SSE or session-multiplexed streamable HTTP.

pub mod config;
pub mod error;
pub mod operations;
pub mod protocol;
mod server;
pub mod tools;
pub mod transport;

pub use config::{Cli, TransportKind};
pub use error::{ErrorCode, NormalizedError, ToolError, TransportError};
pub use protocol::{McpError, McpMessage, ServerCapabilities};
pub use server::{build_dispatcher, McpServer, ServerMode};
pub use tools::{Dispatcher, Tool, ToolRegistry};
pub use transport::{HttpConfig, SseTransport, StdioTransport, StreamableHttpTransport};
