//! Protocol Error Types
//!
//! Two disjoint error planes live here:
//! - `JsonRpcError` mirrors the JSON-RPC error taxonomy that travels on
//!   the wire inside `Response.error`.
//! - `ProtocolError` covers failures of the codec and protocol layer
//!   itself (malformed messages, invalid versions, bad content tags).
//!
//! Tool-level failures are deliberately absent: those are result-plane
//! (`CallToolResult { is_error: true }`) and never surface as errors.

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Layer 3: Internal module imports
use crate::protocol::constants::error_codes;

/// Convenient result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors of the message codec and protocol layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum ProtocolError {
    /// Payload was not valid JSON at all
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// JSON was valid but does not classify as request/notification/response
    #[error("Invalid message: {message}")]
    InvalidMessage { message: String },

    /// Serialization of an outgoing message failed
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Protocol version string is not in YYYY-MM-DD form
    #[error("Invalid protocol version: {0}")]
    InvalidProtocolVersion(String),

    /// URI failed validation
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// MIME type failed validation
    #[error("Invalid MIME type: {0}")]
    InvalidMimeType(String),

    /// Base64 payload failed validation
    #[error("Invalid base64 data")]
    InvalidBase64Data,
}

impl ProtocolError {
    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create an invalid message error
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            message: err.to_string(),
        }
    }
}

/// JSON-RPC level error kinds with their numeric codes
///
/// These are the errors a server is allowed to put on the wire. The
/// numeric code is derived from the variant; `ServerError` carries its
/// own code from the reserved -32000..-32099 range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum JsonRpcError {
    /// Parse error (-32700)
    #[error("Parse error: {message}")]
    ParseError { message: String },

    /// Invalid request (-32600)
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Method not found (-32601)
    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    /// Invalid parameters (-32602)
    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },

    /// Internal error (-32603)
    #[error("Internal error: {message}")]
    InternalError { message: String },

    /// Server error (implementation-defined -32000..-32099)
    #[error("Server error {code}: {message}")]
    ServerError { code: i32, message: String },
}

impl JsonRpcError {
    /// Get the JSON-RPC error code for this error
    pub fn error_code(&self) -> i32 {
        match self {
            JsonRpcError::ParseError { .. } => error_codes::PARSE_ERROR,
            JsonRpcError::InvalidRequest { .. } => error_codes::INVALID_REQUEST,
            JsonRpcError::MethodNotFound { .. } => error_codes::METHOD_NOT_FOUND,
            JsonRpcError::InvalidParams { .. } => error_codes::INVALID_PARAMS,
            JsonRpcError::InternalError { .. } => error_codes::INTERNAL_ERROR,
            JsonRpcError::ServerError { code, .. } => *code,
        }
    }

    /// Create a parse error
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a method not found error
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            method: method.into(),
        }
    }

    /// Create an invalid parameters error
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Create a server error with a custom code
    pub fn server_error(code: i32, message: impl Into<String>) -> Self {
        Self::ServerError {
            code,
            message: message.into(),
        }
    }
}
