//! Transport-independent tool dispatch
//!
//! Resolves a tool by name, validates its arguments, runs the handler and
//! shapes the outcome into a `tools/call` result. Handler failures and panics
//! never escape: they come back as error-flagged results.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error};

use super::registry::{Tool, ToolOutput, ToolRegistry};
use crate::error::{normalize, panic_message, ToolError};
use crate::protocol::{McpError, McpTool, ToolCallResult, ToolsListResult};

/// Dispatcher over an immutable tool set
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    /// Create a dispatcher over a fully built registry
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Registered tools in registration order
    pub fn tools(&self) -> &[Tool] {
        self.registry.list()
    }

    /// Describe every tool for `tools/list`
    pub fn list_tools(&self) -> ToolsListResult {
        let tools = self
            .registry
            .list()
            .iter()
            .map(|tool| McpTool {
                name: tool.name().to_string(),
                description: Some(tool.description().to_string()),
                input_schema: tool.schema().to_json_schema(),
            })
            .collect();

        ToolsListResult { tools }
    }

    /// Run a tool by name.
    ///
    /// Only an unknown tool name is reported as a protocol error; every
    /// other failure becomes a result with `isError` set.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<ToolCallResult, McpError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| McpError::internal_error(format!("Tool not found: {}", name)))?;

        let arguments = arguments.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        debug!(tool = %name, args = %arguments, "Handling tool call");

        match run(tool, &arguments).await {
            Ok(output) => Ok(ToolCallResult::text(render(output))),
            Err(err) => {
                let normalized = normalize(&err);
                if normalized.code.is_caller_error() {
                    error!(tool = %name, code = %normalized.code, "Error in {} tool: {}", name, normalized.message);
                } else {
                    error!(tool = %name, code = %normalized.code, error = ?err, "Error in {} tool: {}", name, normalized.message);
                }
                Ok(ToolCallResult::error(normalized.message))
            }
        }
    }
}

/// Validate then invoke, catching panics from the handler
async fn run(tool: &Tool, arguments: &Value) -> Result<ToolOutput, ToolError> {
    let validated = tool.schema().validate(arguments)?;

    match AssertUnwindSafe(tool.invoke(validated)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(ToolError::Unknown(panic_message(panic.as_ref()))),
    }
}

/// Text passes through; structured values are pretty-printed
fn render(output: ToolOutput) -> String {
    match output {
        ToolOutput::Text(text) => text,
        ToolOutput::Json(Value::String(text)) => text,
        ToolOutput::Json(value) => {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
        }
    }
}
