//! Error types and error normalization for the MCP server
//!
//! Every failure that can happen while running a tool is funnelled into
//! [`ToolError`] and then classified by [`normalize`] into one of three
//! JSON-RPC error codes with a single human-readable message.

use std::fmt;

use fireblocks_client::ClientError;
use thiserror::Error;

use crate::protocol::{codes, McpError};
use crate::tools::ValidationError;

/// Result type alias for tool handlers
pub type ToolResult<T> = std::result::Result<T, ToolError>;

/// Failure raised while validating or running a tool
#[derive(Error, Debug)]
pub enum ToolError {
    /// Arguments did not match the tool's input schema
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The Fireblocks API answered with an error
    #[error("{message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// Any other error raised by a handler
    #[error("{0}")]
    Unexpected(String),

    /// A failure that carried no error value (e.g. a handler panic payload)
    #[error("{0}")]
    Unknown(String),
}

impl From<ClientError> for ToolError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api { status, message } => Self::Upstream { status, message },
            other => Self::Unexpected(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unexpected(err.to_string())
    }
}

/// Stable error classes reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidRequest,
    InvalidParams,
    InternalError,
}

impl ErrorCode {
    /// JSON-RPC numeric code
    pub fn code(self) -> i32 {
        match self {
            Self::InvalidRequest => codes::INVALID_REQUEST,
            Self::InvalidParams => codes::INVALID_PARAMS,
            Self::InternalError => codes::INTERNAL_ERROR,
        }
    }

    /// Whether failures of this class are caller mistakes rather than server faults
    pub fn is_caller_error(self) -> bool {
        matches!(self, Self::InvalidRequest | Self::InvalidParams)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InvalidParams => "INVALID_PARAMS",
            Self::InternalError => "INTERNAL_ERROR",
        };
        f.write_str(name)
    }
}

/// A classified failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedError {
    pub code: ErrorCode,
    pub message: String,
}

impl NormalizedError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<NormalizedError> for McpError {
    fn from(err: NormalizedError) -> Self {
        McpError::new(err.code.code(), err.message)
    }
}

/// Classify a tool failure.
///
/// Upstream API failures are matched before the generic fallback so that
/// status-specific hints are never lost.
pub fn normalize(error: &ToolError) -> NormalizedError {
    match error {
        ToolError::Validation(e) => {
            NormalizedError::new(ErrorCode::InvalidParams, format!("Invalid input: {}", e))
        }
        ToolError::Upstream { status, message } => normalize_upstream(*status, message),
        ToolError::Unexpected(message) => {
            NormalizedError::new(ErrorCode::InternalError, format!("Unexpected error: {}", message))
        }
        ToolError::Unknown(value) => NormalizedError::new(
            ErrorCode::InternalError,
            format!("Unknown error occurred: {}", value),
        ),
    }
}

fn normalize_upstream(status: Option<u16>, message: &str) -> NormalizedError {
    match status {
        Some(401) => NormalizedError::new(
            ErrorCode::InvalidRequest,
            "Fireblocks API authentication failed. Please check your API key and private key",
        ),
        Some(403) => NormalizedError::new(
            ErrorCode::InvalidRequest,
            format!(
                "Fireblocks API access forbidden. Please check your API permissions. {}",
                message
            ),
        ),
        Some(429) => NormalizedError::new(
            ErrorCode::InternalError,
            format!(
                "Fireblocks API rate limit exceeded. Please try again later. {}",
                message
            ),
        ),
        Some(500) => NormalizedError::new(
            ErrorCode::InternalError,
            format!(
                "Fireblocks API internal server error. Please try again later. {}",
                message
            ),
        ),
        _ => NormalizedError::new(
            ErrorCode::InternalError,
            format!("Fireblocks API error: {}", message),
        ),
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

/// Registry construction errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),
}

/// Transport-level errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Session {0} is closed")]
    Closed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Field, ObjectSchema};
    use serde_json::json;

    fn upstream(status: u16, message: &str) -> ToolError {
        ToolError::Upstream {
            status: Some(status),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_validation_error_is_invalid_params() {
        let schema = ObjectSchema::strict().field("id", Field::string());
        let err = ToolError::from(schema.validate(&json!({})).unwrap_err());

        let normalized = normalize(&err);
        assert_eq!(normalized.code, ErrorCode::InvalidParams);
        assert!(normalized.message.starts_with("Invalid input: "));
        assert!(normalized.message.contains("id"));
    }

    #[test]
    fn test_unauthorized_is_invalid_request() {
        let normalized = normalize(&upstream(401, "Unauthorized"));
        assert_eq!(normalized.code, ErrorCode::InvalidRequest);
        assert!(normalized.message.contains("authentication failed"));
        assert!(normalized.message.contains("API key"));
    }

    #[test]
    fn test_forbidden_includes_upstream_message() {
        let normalized = normalize(&upstream(403, "IP not whitelisted"));
        assert_eq!(normalized.code, ErrorCode::InvalidRequest);
        assert!(normalized.message.contains("forbidden"));
        assert!(normalized.message.contains("IP not whitelisted"));
    }

    #[test]
    fn test_rate_limit_is_internal_with_retry_hint() {
        let normalized = normalize(&upstream(429, "Too many requests"));
        assert_eq!(normalized.code, ErrorCode::InternalError);
        assert!(normalized.message.contains("rate limit"));
        assert!(normalized.message.contains("try again later"));
    }

    #[test]
    fn test_server_error_is_internal_with_retry_hint() {
        let normalized = normalize(&upstream(500, "boom"));
        assert_eq!(normalized.code, ErrorCode::InternalError);
        assert!(normalized.message.contains("internal server error"));
        assert!(normalized.message.contains("try again later"));
    }

    #[test]
    fn test_other_status_is_generic_upstream_error() {
        let normalized = normalize(&upstream(404, "Not found"));
        assert_eq!(normalized.code, ErrorCode::InternalError);
        assert_eq!(normalized.message, "Fireblocks API error: Not found");

        let normalized = normalize(&ToolError::Upstream {
            status: None,
            message: "no status".to_string(),
        });
        assert_eq!(normalized.message, "Fireblocks API error: no status");
    }

    #[test]
    fn test_generic_error_is_wrapped() {
        let normalized = normalize(&ToolError::Unexpected("X".to_string()));
        assert_eq!(normalized.code, ErrorCode::InternalError);
        assert_eq!(normalized.message, "Unexpected error: X");
    }

    #[test]
    fn test_unknown_value_is_stringified() {
        let normalized = normalize(&ToolError::Unknown("42".to_string()));
        assert_eq!(normalized.code, ErrorCode::InternalError);
        assert_eq!(normalized.message, "Unknown error occurred: 42");
    }

    #[test]
    fn test_client_api_error_maps_to_upstream() {
        let err = ToolError::from(ClientError::api(429, "slow down"));
        assert!(matches!(err, ToolError::Upstream { status: Some(429), .. }));

        let err = ToolError::from(ClientError::Config("bad".to_string()));
        assert!(matches!(err, ToolError::Unexpected(_)));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }

    #[test]
    fn test_normalized_error_to_mcp_error() {
        let mcp: McpError = normalize(&upstream(401, "")).into();
        assert_eq!(mcp.code, -32600);
    }
}
