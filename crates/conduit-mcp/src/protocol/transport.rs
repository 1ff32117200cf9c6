//! Transport Abstraction
//!
//! The event-driven contract every concrete transport implements. A
//! transport delivers bytes and frames; protocol semantics live in the
//! [`MessageHandler`] it was built with. Instead of hidden subscriber
//! lists, a transport is a producer of handler events plus a `send`
//! method:
//!
//! - `handle_message` fires once per decoded inbound message,
//! - `handle_error` fires for transport-level failures that did not
//!   yield a message,
//! - `handle_close` fires at most once, when the peer goes away or the
//!   transport is shut down.
//!
//! Transports are constructed pre-configured: the handler is supplied to
//! the builder, so there is no window where a started transport has
//! nowhere to deliver events.

// Layer 1: Standard library imports
use std::collections::HashMap;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

// Layer 3: Internal module imports
use super::message::JsonRpcMessage;

/// Transport-level error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection establishment or lifecycle failure
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Underlying I/O failure
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Message decode/encode failure; carries the offending payload when known
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        /// Raw payload that failed to decode, for diagnostics
        payload: Option<String>,
    },

    /// Protocol violation observed at the transport layer
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// A deadline elapsed (endpoint handshake, request wait)
    #[error("Timeout: {message}")]
    Timeout { message: String },

    /// Authentication rejected by the peer
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Operation not legal in the transport's current state
    #[error("Invalid transport state: {message}")]
    InvalidState { message: String },
}

impl TransportError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a serialization error without payload context
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
            payload: None,
        }
    }

    /// Create a serialization error carrying the offending payload
    pub fn serialization_with_payload(
        message: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self::Serialization {
            message: message.into(),
            payload: Some(payload.into()),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create an invalid-state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization {
            message: error.to_string(),
            payload: None,
        }
    }
}

/// Session and metadata context delivered with each inbound message
///
/// Multi-session transports (SSE) stamp the originating session id so the
/// dispatcher can answer on the right event stream; single-session
/// transports use a fixed id.
#[derive(Debug, Clone)]
pub struct MessageContext {
    session_id: Option<String>,
    received_at: DateTime<Utc>,
    remote_addr: Option<String>,
    metadata: HashMap<String, String>,
}

impl MessageContext {
    /// Create a context bound to a session
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            received_at: Utc::now(),
            remote_addr: None,
            metadata: HashMap::new(),
        }
    }

    /// Create a context without a session (pre-handshake traffic)
    pub fn without_session() -> Self {
        Self {
            session_id: None,
            received_at: Utc::now(),
            remote_addr: None,
            metadata: HashMap::new(),
        }
    }

    /// Session id, if any
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Receive timestamp
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Peer address, if known
    pub fn remote_addr(&self) -> Option<&str> {
        self.remote_addr.as_deref()
    }

    /// Attach the peer address
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Attach arbitrary metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Look up a metadata value
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Event-driven handler for inbound transport traffic
///
/// Implemented by the server dispatcher and the client correlation
/// router. All three callbacks are single-shot per event; `handle_close`
/// fires at most once per transport lifetime.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one decoded inbound message (request, notification, or response)
    async fn handle_message(&self, message: JsonRpcMessage, context: MessageContext);

    /// Handle a transport-level error that did not produce a message
    async fn handle_error(&self, error: TransportError);

    /// Handle transport closure (peer disconnect, EOF, or local close)
    async fn handle_close(&self);
}

/// Contract shared by the concrete transports
///
/// `start` may be called at most once; a second call fails with
/// [`TransportError::InvalidState`]. `close` is idempotent and causes
/// `handle_close` to fire at most once.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport-specific error type
    type Error: std::error::Error + Send + Sync + 'static;

    /// Start the transport and begin delivering handler events
    async fn start(&mut self) -> Result<(), Self::Error>;

    /// Close the transport and release resources
    async fn close(&mut self) -> Result<(), Self::Error>;

    /// Send a message to the peer
    async fn send(&mut self, message: &JsonRpcMessage) -> Result<(), Self::Error>;

    /// Current session id, if the transport is session-bound
    fn session_id(&self) -> Option<String>;

    /// Whether the transport is started and able to carry traffic
    fn is_connected(&self) -> bool;

    /// Static transport kind identifier for logs (`"stdio"`, `"sse"`)
    fn transport_type(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_carries_session_and_metadata() {
        let context = MessageContext::new("session-1")
            .with_remote_addr("127.0.0.1:9000")
            .with_metadata("user-agent", "test/1.0");

        assert_eq!(context.session_id(), Some("session-1"));
        assert_eq!(context.remote_addr(), Some("127.0.0.1:9000"));
        assert_eq!(context.metadata("user-agent"), Some("test/1.0"));
        assert_eq!(context.metadata("missing"), None);
    }

    #[test]
    fn context_without_session() {
        let context = MessageContext::without_session();
        assert_eq!(context.session_id(), None);
    }

    #[test]
    fn serialization_error_keeps_payload() {
        let err = TransportError::serialization_with_payload("bad json", "{oops");
        match err {
            TransportError::Serialization { payload, .. } => {
                assert_eq!(payload.as_deref(), Some("{oops"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: TransportError = io.into();
        assert!(matches!(err, TransportError::Io { .. }));
    }
}
