//! Server Message Handler
//!
//! Glue between a transport's inbound events and the dispatcher. Each
//! request is dispatched on its own task, so slow handlers never block
//! the read loop and responses go out in completion order; the per-
//! transport single writer downstream of the [`ResponseSink`] keeps
//! frames intact.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use crate::protocol::{
    ErrorObject, JsonRpcMessage, JsonRpcResponse, MessageContext, MessageHandler, RequestId,
    TransportError,
};
use crate::server::dispatcher::McpDispatcher;
use crate::transport::sse::SseSessionManager;

/// Where responses and server-initiated notifications go
///
/// One implementation per transport family; the session id routes on
/// multi-session transports and is ignored on single-session ones.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    /// Queue a message for delivery to the session's peer
    async fn deliver(
        &self,
        session_id: &str,
        message: JsonRpcMessage,
    ) -> Result<(), TransportError>;
}

/// Sink for single-session transports backed by an outbound queue
pub struct QueueSink {
    tx: mpsc::Sender<JsonRpcMessage>,
}

impl QueueSink {
    /// Wrap an outbound queue sender
    pub fn new(tx: mpsc::Sender<JsonRpcMessage>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ResponseSink for QueueSink {
    async fn deliver(
        &self,
        _session_id: &str,
        message: JsonRpcMessage,
    ) -> Result<(), TransportError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| TransportError::connection("outbound queue closed"))
    }
}

/// Sink routing into the SSE session registry
pub struct SessionSink {
    sessions: Arc<SseSessionManager>,
}

impl SessionSink {
    /// Wrap the session registry
    pub fn new(sessions: Arc<SseSessionManager>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl ResponseSink for SessionSink {
    async fn deliver(
        &self,
        session_id: &str,
        message: JsonRpcMessage,
    ) -> Result<(), TransportError> {
        self.sessions.deliver(session_id, message).await
    }
}

/// Transport-facing handler wrapping the dispatcher
pub struct ServerSessionHandler {
    dispatcher: Arc<McpDispatcher>,
    sink: Arc<dyn ResponseSink>,
    /// Session attributed to events that carry no context (errors, close)
    default_session: String,
}

impl ServerSessionHandler {
    /// Wire a dispatcher to a response sink
    pub fn new(
        dispatcher: Arc<McpDispatcher>,
        sink: Arc<dyn ResponseSink>,
        default_session: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher,
            sink,
            default_session: default_session.into(),
        }
    }
}

#[async_trait]
impl MessageHandler for ServerSessionHandler {
    async fn handle_message(&self, message: JsonRpcMessage, context: MessageContext) {
        let session_id = context
            .session_id()
            .unwrap_or(&self.default_session)
            .to_string();
        let dispatcher = Arc::clone(&self.dispatcher);
        let sink = Arc::clone(&self.sink);

        // One task per message: handlers run concurrently and responses
        // leave in completion order.
        tokio::spawn(async move {
            if let Some(response) = dispatcher.dispatch(message, &session_id).await {
                if let Err(e) = sink.deliver(&session_id, response).await {
                    // Transport already gone; the response is dropped.
                    debug!(session_id = %session_id, error = %e, "response dropped");
                }
            }
        });
    }

    async fn handle_error(&self, error: TransportError) {
        // Undecodable inbound payloads get a JSON-RPC reply: a shape
        // violation with a recoverable id answers as -32600 on that id,
        // unparseable JSON answers as -32700 on a null id.
        if let TransportError::Serialization {
            message,
            payload: Some(payload),
        } = &error
        {
            let response = match serde_json::from_str::<Value>(payload) {
                Ok(value) => {
                    let id = value
                        .get("id")
                        .cloned()
                        .and_then(|id| serde_json::from_value::<RequestId>(id).ok());
                    JsonRpcResponse::error(
                        ErrorObject::invalid_request().with_data(json!(message)),
                        id,
                    )
                }
                Err(_) => JsonRpcResponse::error(
                    ErrorObject::parse_error().with_data(json!(message)),
                    None,
                ),
            };
            if let Err(e) = self
                .sink
                .deliver(&self.default_session, JsonRpcMessage::Response(response))
                .await
            {
                debug!(error = %e, "parse-error reply dropped");
            }
            return;
        }

        warn!(error = %error, "transport error");
    }

    async fn handle_close(&self) {
        debug!(session = %self.default_session, "transport closed");
        self.dispatcher.drop_session(&self.default_session);
    }
}
