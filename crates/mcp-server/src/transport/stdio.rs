//! stdio transport for MCP (used by desktop MCP clients)

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use crate::error::TransportError;
use crate::protocol::{McpMessage, RequestHandler};
use crate::tools::Dispatcher;

/// stdio transport for MCP protocol
pub struct StdioTransport {
    handler: RequestHandler,
}

impl StdioTransport {
    /// Create a new stdio transport
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            handler: RequestHandler::new(dispatcher),
        }
    }

    /// Serve the process stdin/stdout until EOF
    pub async fn run(&mut self) -> Result<(), TransportError> {
        info!("Starting MCP server on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC over any reader/writer pair.
    ///
    /// Messages are handled one at a time, so responses go out in request
    /// order.
    pub async fn serve<R, W>(&mut self, reader: R, mut writer: W) -> Result<(), TransportError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();

            let bytes_read = reader.read_until(b'\n', &mut buf).await?;
            if bytes_read == 0 {
                info!("EOF received, shutting down");
                break;
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    error!("Received a line that is not valid UTF-8: {}", e);
                    write_message(&mut writer, &McpMessage::parse_error(e)).await?;
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }

            debug!("Received: {}", line);

            let message: McpMessage = match serde_json::from_str(line) {
                Ok(msg) => msg,
                Err(e) => {
                    error!("Failed to parse message: {}", e);
                    write_message(&mut writer, &McpMessage::parse_error(e)).await?;
                    continue;
                }
            };

            if let Some(response) = self.handler.handle(message).await {
                write_message(&mut writer, &response).await?;
            }
        }

        writer.flush().await?;
        Ok(())
    }
}

async fn write_message<W>(writer: &mut W, message: &McpMessage) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let mut response_line = serde_json::to_string(message)?;
    debug!("Sending: {}", response_line);
    response_line.push('\n');
    writer.write_all(response_line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;
    use serde_json::{json, Value};
    use tokio::io::{duplex, AsyncReadExt};

    async fn exchange(input: impl AsRef<[u8]>) -> Vec<Value> {
        let (mut client, server) = duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);

        let mut transport = StdioTransport::new(Arc::new(Dispatcher::new(ToolRegistry::new())));
        let task = tokio::spawn(async move { transport.serve(server_read, server_write).await });

        client.write_all(input.as_ref()).await.unwrap();
        client.shutdown().await.unwrap();

        let mut output = String::new();
        client.read_to_string(&mut output).await.unwrap();
        task.await.unwrap().unwrap();

        output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_responses_in_request_order() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n"
        );

        let responses = exchange(input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], json!(1));
        assert_eq!(responses[1]["id"], json!(2));
        assert_eq!(responses[1]["result"], json!({ "tools": [] }));
    }

    #[tokio::test]
    async fn test_parse_error_keeps_reading() {
        let input = "not json\n{\"jsonrpc\":\"2.0\",\"id\":9,\"method\":\"ping\"}\n";

        let responses = exchange(input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["error"]["code"], json!(-32700));
        assert_eq!(responses[1]["id"], json!(9));
    }

    #[tokio::test]
    async fn test_invalid_utf8_keeps_reading() {
        let input = b"\xff\xfe\n{\"jsonrpc\":\"2.0\",\"id\":9,\"method\":\"ping\"}\n";

        let responses = exchange(input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[0]["error"]["code"], json!(-32700));
        assert_eq!(responses[1]["id"], json!(9));
        assert_eq!(responses[1]["result"], json!({}));
    }
}
