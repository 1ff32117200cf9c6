//! Correlation Error Types
//!
//! Failure modes of the pending-request table. The distinctions matter to
//! callers: a timeout is retryable, a connection-closed rejection means
//! every in-flight request on that transport died together, and a
//! not-found correlation is the normal fate of a late response whose
//! caller already gave up.

// Layer 2: Third-party crate imports
use chrono::TimeDelta;
use thiserror::Error;

// Layer 3: Internal module imports
use crate::protocol::RequestId;

/// Result type for correlation operations
pub type CorrelationResult<T> = Result<T, CorrelationError>;

/// Correlation failure modes
#[derive(Debug, Clone, Error)]
pub enum CorrelationError {
    /// Request deadline elapsed before a response arrived
    #[error("Request {id} timed out after {deadline}")]
    Timeout {
        /// The request that timed out
        id: RequestId,
        /// The deadline that was exceeded
        deadline: TimeDelta,
    },

    /// No pending request with this id (completed, cancelled, or never sent)
    #[error("Request {id} not found (may have completed or been cancelled)")]
    RequestNotFound {
        /// The id that failed to correlate
        id: RequestId,
    },

    /// The waiting caller dropped its receiver before correlation
    #[error("Response channel closed for request {id}")]
    ChannelClosed {
        /// The request whose channel closed
        id: RequestId,
    },

    /// Request was cancelled by its caller
    #[error("Request {id} was cancelled")]
    Cancelled {
        /// The cancelled request
        id: RequestId,
    },

    /// The transport closed with this request still in flight
    #[error("Connection closed with request {id} pending")]
    ConnectionClosed {
        /// The orphaned request
        id: RequestId,
    },

    /// The peer answered with a JSON-RPC error
    #[error("Wire error {code}: {message}")]
    WireError {
        /// JSON-RPC error code
        code: i32,
        /// Error message from the peer
        message: String,
    },

    /// Internal table failure (capacity, shutdown races)
    #[error("Internal correlation error: {message}")]
    Internal {
        /// Description of the failure
        message: String,
    },
}

impl CorrelationError {
    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_names_the_request() {
        let err = CorrelationError::Timeout {
            id: RequestId::new("req-9"),
            deadline: TimeDelta::seconds(60),
        };
        let text = err.to_string();
        assert!(text.contains("req-9"));
        assert!(text.contains("timed out"));
    }

    #[test]
    fn wire_error_keeps_code_and_message() {
        let err = CorrelationError::WireError {
            code: -32601,
            message: "Method not found".to_string(),
        };
        assert!(err.to_string().contains("-32601"));
        assert!(err.to_string().contains("Method not found"));
    }
}
