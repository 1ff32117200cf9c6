//! SSE Client Transport
//!
//! Connects to the server's event stream and bridges it into the
//! [`MessageHandler`] contract. The bootstrap is a small state machine:
//!
//! - `Connecting`: GET dispatched, waiting for response headers
//! - `AwaitingEndpoint`: stream open, waiting for the single
//!   `event: endpoint` frame carrying the POST URL
//! - `Ready`: endpoint known, `send` works
//! - `Closed`: terminal; any outstanding `send` rejects
//!
//! The `endpoint` event must arrive within the configured handshake
//! timeout, otherwise `start` fails with a timeout error and whatever
//! `initialize` was waiting on it aborts. Subsequent `message` frames are
//! decoded as JSON-RPC and routed to the handler; the stream ending in
//! any way fires `handle_close` exactly once.

// Layer 1: Standard library imports
use std::sync::{Arc, RwLock};

// Layer 2: Third-party crate imports
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use url::Url;

// Layer 3: Internal module imports
use crate::protocol::{
    JsonRpcMessage, MessageContext, MessageHandler, Transport, TransportError,
};
use crate::transport::sse::config::SseClientConfig;
use crate::transport::sse::parser::SseParser;
use async_trait::async_trait;

/// Connection phase of the SSE client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseConnectionPhase {
    /// HTTP request dispatched, waiting for headers
    Connecting,
    /// Event stream open, waiting for the endpoint event
    AwaitingEndpoint,
    /// Endpoint URL known, sends are functional
    Ready,
    /// Terminal state
    Closed,
}

/// Client half of the SSE transport pair
pub struct SseClientTransport {
    config: SseClientConfig,
    handler: Arc<dyn MessageHandler>,
    http: reqwest::Client,

    phase: Arc<RwLock<SseConnectionPhase>>,
    endpoint: Arc<RwLock<Option<Url>>>,
    session_id: Arc<RwLock<Option<String>>>,

    shutdown_tx: Option<broadcast::Sender<()>>,
    stream_task: Option<JoinHandle<()>>,
    started: bool,
}

impl SseClientTransport {
    /// Builder entry point
    pub fn builder() -> SseClientTransportBuilder {
        SseClientTransportBuilder::new()
    }

    /// Current connection phase
    pub fn phase(&self) -> SseConnectionPhase {
        self.read_phase()
    }

    fn read_phase(&self) -> SseConnectionPhase {
        match self.phase.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_phase(phase: &Arc<RwLock<SseConnectionPhase>>, next: SseConnectionPhase) {
        match phase.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    fn stream_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        if let Some(key) = &self.config.api_key {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {key}")) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    fn endpoint_url(&self) -> Option<Url> {
        match self.endpoint.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Transport for SseClientTransport {
    type Error = TransportError;

    async fn start(&mut self) -> Result<(), Self::Error> {
        if self.started {
            return Err(TransportError::invalid_state(
                "transport already started; start may be called at most once",
            ));
        }
        self.started = true;
        Self::set_phase(&self.phase, SseConnectionPhase::Connecting);

        let response = self
            .http
            .get(self.config.sse_url.clone())
            .headers(self.stream_headers())
            .send()
            .await
            .map_err(|e| {
                Self::set_phase(&self.phase, SseConnectionPhase::Closed);
                TransportError::connection(format!("event stream request failed: {e}"))
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            Self::set_phase(&self.phase, SseConnectionPhase::Closed);
            return Err(TransportError::Auth {
                message: "server rejected the API key".to_string(),
            });
        }
        if !status.is_success() {
            Self::set_phase(&self.phase, SseConnectionPhase::Closed);
            return Err(TransportError::connection(format!(
                "event stream request returned {status}"
            )));
        }

        // Headers are in: the stream is open, now the endpoint event must
        // arrive within the handshake window.
        Self::set_phase(&self.phase, SseConnectionPhase::AwaitingEndpoint);

        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(consume_stream(
            response,
            Arc::clone(&self.handler),
            Arc::clone(&self.phase),
            endpoint_tx,
            shutdown_rx,
        ));

        let endpoint_data =
            match tokio::time::timeout(self.config.handshake_timeout, endpoint_rx).await {
                Ok(Ok(data)) => data,
                Ok(Err(_)) => {
                    task.abort();
                    Self::set_phase(&self.phase, SseConnectionPhase::Closed);
                    return Err(TransportError::connection(
                        "event stream ended before the endpoint event",
                    ));
                }
                Err(_) => {
                    task.abort();
                    Self::set_phase(&self.phase, SseConnectionPhase::Closed);
                    return Err(TransportError::timeout(format!(
                        "no endpoint event within {:?}",
                        self.config.handshake_timeout
                    )));
                }
            };

        let endpoint = self.config.sse_url.join(&endpoint_data).map_err(|e| {
            Self::set_phase(&self.phase, SseConnectionPhase::Closed);
            TransportError::Protocol {
                message: format!("invalid endpoint URL {endpoint_data:?}: {e}"),
            }
        })?;

        let session_id = endpoint
            .query_pairs()
            .find(|(name, _)| name == "sessionId")
            .map(|(_, value)| value.into_owned());

        debug!(endpoint = %endpoint, "sse endpoint handshake complete");
        match self.endpoint.write() {
            Ok(mut guard) => *guard = Some(endpoint),
            Err(poisoned) => *poisoned.into_inner() = Some(endpoint),
        }
        match self.session_id.write() {
            Ok(mut guard) => *guard = session_id,
            Err(poisoned) => *poisoned.into_inner() = session_id,
        }

        self.shutdown_tx = Some(shutdown_tx);
        self.stream_task = Some(task);
        Self::set_phase(&self.phase, SseConnectionPhase::Ready);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.stream_task.take() {
            let _ = task.await;
        }
        Self::set_phase(&self.phase, SseConnectionPhase::Closed);
        Ok(())
    }

    async fn send(&mut self, message: &JsonRpcMessage) -> Result<(), Self::Error> {
        if self.read_phase() != SseConnectionPhase::Ready {
            return Err(TransportError::invalid_state(
                "transport is not ready; sends require a completed endpoint handshake",
            ));
        }
        let endpoint = self.endpoint_url().ok_or_else(|| {
            TransportError::invalid_state("endpoint URL missing in ready state")
        })?;

        let mut request = self
            .http
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(message);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::connection(format!("message POST failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::connection(format!(
                "message POST returned {status}"
            )));
        }
        trace!(status = %status, "message posted");
        Ok(())
    }

    fn session_id(&self) -> Option<String> {
        match self.session_id.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn is_connected(&self) -> bool {
        self.read_phase() == SseConnectionPhase::Ready
    }

    fn transport_type(&self) -> &'static str {
        "sse"
    }
}

/// Stream consumption task
///
/// Parses the byte stream into SSE events, resolves the endpoint oneshot
/// on the first `endpoint` event, and routes every subsequent data frame
/// through the JSON-RPC decoder to the handler. Ends on shutdown signal,
/// stream end, or stream error, firing `handle_close` exactly once.
async fn consume_stream(
    response: reqwest::Response,
    handler: Arc<dyn MessageHandler>,
    phase: Arc<RwLock<SseConnectionPhase>>,
    endpoint_tx: oneshot::Sender<String>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut stream = response.bytes_stream();
    let mut parser = SseParser::new();
    let mut endpoint_tx = Some(endpoint_tx);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                break;
            }
            chunk = stream.next() => {
                match chunk {
                    Some(Ok(bytes)) => {
                        for event in parser.feed(&bytes) {
                            match event.event_type() {
                                "endpoint" => {
                                    if let Some(tx) = endpoint_tx.take() {
                                        let _ = tx.send(event.data);
                                    } else {
                                        warn!("duplicate endpoint event ignored");
                                    }
                                }
                                "message" => match JsonRpcMessage::from_json(&event.data) {
                                    Ok(message) => {
                                        let context = MessageContext::without_session();
                                        handler.handle_message(message, context).await;
                                    }
                                    Err(e) => {
                                        handler
                                            .handle_error(
                                                TransportError::serialization_with_payload(
                                                    e.to_string(),
                                                    event.data,
                                                ),
                                            )
                                            .await;
                                    }
                                },
                                other => {
                                    trace!(event_type = %other, "ignoring unknown sse event");
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        handler
                            .handle_error(TransportError::connection(format!(
                                "event stream error: {e}"
                            )))
                            .await;
                        break;
                    }
                    None => {
                        // Server closed the stream.
                        break;
                    }
                }
            }
        }
    }

    SseClientTransport::set_phase(&phase, SseConnectionPhase::Closed);
    handler.handle_close().await;
}

/// Builder producing a pre-configured [`SseClientTransport`]
pub struct SseClientTransportBuilder {
    config: Option<SseClientConfig>,
    handler: Option<Arc<dyn MessageHandler>>,
}

impl SseClientTransportBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self {
            config: None,
            handler: None,
        }
    }

    /// Set the client configuration (required)
    pub fn with_config(mut self, config: SseClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the message handler (required)
    pub fn with_message_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Build the transport
    ///
    /// # Errors
    ///
    /// [`TransportError::InvalidState`] when config or handler is missing.
    pub fn build(self) -> Result<SseClientTransport, TransportError> {
        let config = self
            .config
            .ok_or_else(|| TransportError::invalid_state("config must be set before building"))?;
        let handler = self.handler.ok_or_else(|| {
            TransportError::invalid_state("message handler must be set before building")
        })?;

        Ok(SseClientTransport {
            config,
            handler,
            http: reqwest::Client::new(),
            phase: Arc::new(RwLock::new(SseConnectionPhase::Connecting)),
            endpoint: Arc::new(RwLock::new(None)),
            session_id: Arc::new(RwLock::new(None)),
            shutdown_tx: None,
            stream_task: None,
            started: false,
        })
    }
}

impl Default for SseClientTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullHandler;

    #[async_trait]
    impl MessageHandler for NullHandler {
        async fn handle_message(&self, _message: JsonRpcMessage, _context: MessageContext) {}
        async fn handle_error(&self, _error: TransportError) {}
        async fn handle_close(&self) {}
    }

    fn test_transport() -> SseClientTransport {
        let config =
            SseClientConfig::new(Url::parse("http://127.0.0.1:1/sse").unwrap());
        SseClientTransportBuilder::new()
            .with_config(config)
            .with_message_handler(Arc::new(NullHandler))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn builder_requires_config_and_handler() {
        assert!(SseClientTransportBuilder::new().build().is_err());
        assert!(SseClientTransportBuilder::new()
            .with_message_handler(Arc::new(NullHandler))
            .build()
            .is_err());
    }

    #[tokio::test]
    async fn send_before_handshake_is_rejected() {
        let mut transport = test_transport();
        let message = JsonRpcMessage::Notification(
            crate::protocol::JsonRpcNotification::new("tick", None),
        );
        assert!(matches!(
            transport.send(&message).await,
            Err(TransportError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn connect_failure_moves_to_closed() {
        // Port 1 refuses connections; start must fail and land in Closed.
        let mut transport = test_transport();
        let result = transport.start().await;
        assert!(result.is_err());
        assert_eq!(transport.phase(), SseConnectionPhase::Closed);
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn second_start_is_an_illegal_state() {
        let mut transport = test_transport();
        let _ = transport.start().await;
        assert!(matches!(
            transport.start().await,
            Err(TransportError::InvalidState { .. })
        ));
    }
}
