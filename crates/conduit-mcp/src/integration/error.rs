//! MCP Operation Errors
//!
//! The error type seen by users of the high-level client and by provider
//! implementations. Wire errors keep their JSON-RPC code; timeout and
//! connection-closed rejections from the correlation engine keep their
//! distinction, so callers can tell "the server said no" from "the server
//! never answered".

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::correlation::CorrelationError;
use crate::protocol::{ProtocolError, TransportError};

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

/// MCP operation failures
#[derive(Debug, Error)]
pub enum McpError {
    /// Transport-level failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Codec or protocol-shape failure
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Session is not initialized or the transport is gone
    #[error("Not connected to MCP peer")]
    NotConnected,

    /// Initialization was already completed
    #[error("Already initialized")]
    AlreadyInitialized,

    /// Peer does not advertise the requested capability
    #[error("Peer does not support {capability}")]
    UnsupportedCapability { capability: String },

    /// Tool lookup failed
    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    /// Tool handler failed; surfaces result-plane on the wire
    #[error("Tool execution failed: {name} - {reason}")]
    ToolExecutionFailed { name: String, reason: String },

    /// Resource lookup failed
    #[error("Resource not found: {uri}")]
    ResourceNotFound { uri: String },

    /// Prompt lookup failed
    #[error("Prompt not found: {name}")]
    PromptNotFound { name: String },

    /// Request arguments failed validation
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Peer answered with a JSON-RPC error
    #[error("Wire error {code}: {message}")]
    WireError { code: i32, message: String },

    /// Request deadline elapsed
    #[error("Request timed out")]
    Timeout,

    /// Transport closed while the request was in flight
    #[error("Connection closed with the request pending")]
    ConnectionClosed,

    /// Response did not match the expected shape
    #[error("Invalid response: {reason}")]
    InvalidResponse { reason: String },

    /// Free-form failure
    #[error("{message}")]
    Custom { message: String },
}

impl McpError {
    /// Create an unsupported-capability error
    pub fn unsupported_capability(capability: impl Into<String>) -> Self {
        Self::UnsupportedCapability {
            capability: capability.into(),
        }
    }

    /// Create a tool-not-found error
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound { name: name.into() }
    }

    /// Create a tool-execution-failed error
    pub fn tool_execution_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ToolExecutionFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a resource-not-found error
    pub fn resource_not_found(uri: impl Into<String>) -> Self {
        Self::ResourceNotFound { uri: uri.into() }
    }

    /// Create a prompt-not-found error
    pub fn prompt_not_found(name: impl Into<String>) -> Self {
        Self::PromptNotFound { name: name.into() }
    }

    /// Create an invalid-request error
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Create an invalid-response error
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Create a free-form error
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    /// Error category for logs and telemetry
    pub fn category(&self) -> &'static str {
        match self {
            McpError::Transport(_) => "transport",
            McpError::Protocol(_) => "protocol",
            McpError::NotConnected | McpError::ConnectionClosed => "connection",
            McpError::AlreadyInitialized => "state",
            McpError::UnsupportedCapability { .. } => "capability",
            McpError::ToolNotFound { .. } | McpError::ToolExecutionFailed { .. } => "tool",
            McpError::ResourceNotFound { .. } => "resource",
            McpError::PromptNotFound { .. } => "prompt",
            McpError::InvalidRequest { .. } => "request",
            McpError::WireError { .. } => "wire",
            McpError::Timeout => "timeout",
            McpError::InvalidResponse { .. } => "response",
            McpError::Custom { .. } => "custom",
        }
    }
}

impl From<CorrelationError> for McpError {
    fn from(err: CorrelationError) -> Self {
        match err {
            CorrelationError::Timeout { .. } => McpError::Timeout,
            CorrelationError::ConnectionClosed { .. } => McpError::ConnectionClosed,
            CorrelationError::WireError { code, message } => McpError::WireError { code, message },
            other => McpError::custom(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RequestId;
    use chrono::TimeDelta;

    #[test]
    fn categories_cover_the_common_paths() {
        assert_eq!(McpError::NotConnected.category(), "connection");
        assert_eq!(McpError::tool_not_found("x").category(), "tool");
        assert_eq!(McpError::Timeout.category(), "timeout");
        assert_eq!(
            McpError::WireError {
                code: -32601,
                message: "Method not found".to_string()
            }
            .category(),
            "wire"
        );
    }

    #[test]
    fn correlation_distinctions_are_preserved() {
        let timeout = CorrelationError::Timeout {
            id: RequestId::new("1"),
            deadline: TimeDelta::seconds(60),
        };
        assert!(matches!(McpError::from(timeout), McpError::Timeout));

        let closed = CorrelationError::ConnectionClosed {
            id: RequestId::new("2"),
        };
        assert!(matches!(McpError::from(closed), McpError::ConnectionClosed));

        let wire = CorrelationError::WireError {
            code: -32602,
            message: "Invalid params".to_string(),
        };
        match McpError::from(wire) {
            McpError::WireError { code, .. } => assert_eq!(code, -32602),
            other => panic!("expected wire error, got {other:?}"),
        }
    }

    #[test]
    fn tool_execution_error_names_the_tool() {
        let err = McpError::tool_execution_failed("divide", "divide by zero");
        assert!(err.to_string().contains("divide"));
        assert!(err.to_string().contains("divide by zero"));
    }
}
