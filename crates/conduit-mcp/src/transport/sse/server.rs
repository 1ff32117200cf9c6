//! SSE Server Transport
//!
//! Two HTTP endpoints sharing one session:
//!
//! - `GET {sse_path}`: registers a session and answers with a
//!   `text/event-stream` whose very first frame is the `endpoint` event
//!   carrying the POST URL (`{messages_path}?sessionId=...`). Every
//!   JSON-RPC response or server-initiated notification follows as an
//!   `event: message` frame. The per-session queue receiver embedded in
//!   the response stream is the session's single writer.
//! - `POST {messages_path}?sessionId=...`: accepts one JSON-RPC request
//!   or notification, hands it to the dispatcher, and returns
//!   `202 Accepted` immediately; the JSON-RPC response arrives
//!   asynchronously on the event stream. Unknown sessions get `404`
//!   without creating state, malformed bodies `400`, failed auth `401`.
//!
//! When an API-key validator is configured it runs on both endpoints
//! before any session work.

// Layer 1: Standard library imports
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tower::ServiceBuilder;
use tower_http::{cors::{AllowOrigin, CorsLayer}, trace::TraceLayer};
use tracing::{debug, info, warn};

// Layer 3: Internal module imports
use crate::protocol::{JsonRpcMessage, MessageContext, MessageHandler, TransportError};
use crate::transport::sse::config::{ApiKeyValidator, SseServerConfig};
use crate::transport::sse::session::SseSessionManager;

/// Interval for SSE keep-alive comment frames
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Query parameters of the message-POST endpoint
#[derive(Debug, Deserialize)]
struct MessagesQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Shared state behind the axum handlers
#[derive(Clone)]
pub struct SseServerState {
    /// Live session registry
    pub sessions: Arc<SseSessionManager>,
    /// Dispatcher receiving every inbound message
    pub handler: Arc<dyn MessageHandler>,
    /// Messages path advertised in the endpoint event
    pub messages_path: String,
    /// Optional API-key check
    pub validator: Option<Arc<dyn ApiKeyValidator>>,
}

/// Removes the session when its event stream is dropped
///
/// Removal still goes through the manager; this guard only notices the
/// disconnect.
struct SessionGuard {
    session_id: String,
    sessions: Arc<SseSessionManager>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.sessions.close_session(&self.session_id) {
            debug!(session_id = %self.session_id, "event stream dropped, session removed");
        }
    }
}

fn authorize(validator: &Option<Arc<dyn ApiKeyValidator>>, headers: &HeaderMap) -> Result<(), StatusCode> {
    let Some(validator) = validator else {
        return Ok(());
    };

    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let api_key_header = headers.get("x-api-key").and_then(|v| v.to_str().ok());

    match bearer.or(api_key_header) {
        Some(key) if validator.validate(key) => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

/// `GET {sse_path}`: open an event stream
async fn sse_stream_handler(
    State(state): State<SseServerState>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    authorize(&state.validator, &headers)?;

    let (session_id, receiver) = state.sessions.register();
    let endpoint_data = format!("{}?sessionId={}", state.messages_path, session_id);
    debug!(session_id = %session_id, endpoint = %endpoint_data, "event stream opened");

    let guard = SessionGuard {
        session_id,
        sessions: Arc::clone(&state.sessions),
    };

    // The endpoint event precedes every JSON-RPC frame on this stream.
    let endpoint_event = Event::default().event("endpoint").data(endpoint_data);
    let message_events = ReceiverStream::new(receiver).map(move |message| {
        let _alive = &guard;
        let data = serde_json::to_string(&message).unwrap_or_default();
        Ok(Event::default().event("message").data(data))
    });

    let events = stream::once(async move { Ok(endpoint_event) }).chain(message_events);
    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL)))
}

/// `POST {messages_path}?sessionId=...`: accept one inbound message
async fn messages_handler(
    State(state): State<SseServerState>,
    Query(query): Query<MessagesQuery>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, (StatusCode, String)> {
    authorize(&state.validator, &headers)
        .map_err(|status| (status, "invalid or missing API key".to_string()))?;

    let session_id = query.session_id.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "missing sessionId query parameter".to_string(),
        )
    })?;

    if !state.sessions.touch(&session_id) {
        return Err((
            StatusCode::NOT_FOUND,
            format!("unknown session: {session_id}"),
        ));
    }

    let message = JsonRpcMessage::from_json(&body)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    // The actual response travels on the event stream; dispatch happens
    // off this request so 202 returns immediately.
    let handler = Arc::clone(&state.handler);
    let context = MessageContext::new(session_id);
    tokio::spawn(async move {
        handler.handle_message(message, context).await;
    });

    Ok(StatusCode::ACCEPTED)
}

/// Optional liveness endpoint
async fn health_handler(State(state): State<SseServerState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "transport": "sse",
        "sessions": state.sessions.session_count(),
    }))
}

fn build_router(state: SseServerState, config: &SseServerConfig) -> Router {
    let mut router = Router::new()
        .route(&config.sse_path, get(sse_stream_handler))
        .route(&config.messages_path, post(messages_handler));

    if let Some(health_path) = &config.health_path {
        router = router.route(health_path, get(health_handler));
    }

    let mut router = router
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    if let Some(origins) = &config.allowed_origins {
        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();
        router = router.layer(CorsLayer::new().allow_origin(AllowOrigin::list(origins)));
    }

    router
}

/// SSE server lifecycle: bind, serve, graceful shutdown
pub struct SseServer {
    config: SseServerConfig,
    state: SseServerState,
    local_addr: Option<SocketAddr>,
    shutdown_tx: Option<broadcast::Sender<()>>,
    serve_task: Option<JoinHandle<()>>,
    is_running: bool,
}

impl SseServer {
    /// Builder entry point
    pub fn builder() -> SseServerBuilder {
        SseServerBuilder::new()
    }

    /// The session registry, shared with the dispatcher's response sink
    pub fn sessions(&self) -> Arc<SseSessionManager> {
        Arc::clone(&self.state.sessions)
    }

    /// Bind the listener and start serving
    ///
    /// # Errors
    ///
    /// [`TransportError::Connection`] for bind failures,
    /// [`TransportError::InvalidState`] when already started.
    pub async fn start(&mut self) -> Result<(), TransportError> {
        if self.is_running {
            return Err(TransportError::invalid_state("sse server already started"));
        }

        let listener = TcpListener::bind(self.config.bind_addr())
            .await
            .map_err(|e| {
                TransportError::connection(format!(
                    "failed to bind {}: {e}",
                    self.config.bind_addr()
                ))
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::connection(format!("local_addr failed: {e}")))?;

        let router = build_router(self.state.clone(), &self.config);
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let serve_task = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.recv().await;
            };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                warn!(error = %e, "sse server terminated with error");
            }
        });

        info!(addr = %local_addr, sse_path = %self.config.sse_path, "sse server listening");
        self.local_addr = Some(local_addr);
        self.shutdown_tx = Some(shutdown_tx);
        self.serve_task = Some(serve_task);
        self.is_running = true;
        Ok(())
    }

    /// Address the server actually bound (useful with port 0)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Whether the server is accepting connections
    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// Stop serving and drop every session
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        if !self.is_running {
            return Ok(());
        }

        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.serve_task.take() {
            let _ = task.await;
        }
        self.state.sessions.shutdown().await;

        self.shutdown_tx = None;
        self.is_running = false;
        debug!("sse server stopped");
        Ok(())
    }
}

/// Builder producing a pre-configured [`SseServer`]
pub struct SseServerBuilder {
    config: SseServerConfig,
    handler: Option<Arc<dyn MessageHandler>>,
    validator: Option<Arc<dyn ApiKeyValidator>>,
}

impl SseServerBuilder {
    /// Builder with default configuration
    pub fn new() -> Self {
        Self {
            config: SseServerConfig::default(),
            handler: None,
            validator: None,
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: SseServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the dispatcher handler (required)
    pub fn with_message_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Enable API-key authentication on both endpoints
    pub fn with_api_key_validator(mut self, validator: Arc<dyn ApiKeyValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Build the server
    ///
    /// # Errors
    ///
    /// [`TransportError::InvalidState`] when no handler was configured.
    pub fn build(self) -> Result<SseServer, TransportError> {
        self.build_with_sessions(None)
    }

    /// Build the server around an existing session registry
    ///
    /// Used by wiring that needs the registry before the handler exists
    /// (the dispatcher's response sink delivers through it).
    pub fn build_with_sessions(
        self,
        sessions: Option<Arc<SseSessionManager>>,
    ) -> Result<SseServer, TransportError> {
        let handler = self.handler.ok_or_else(|| {
            TransportError::invalid_state("message handler must be set before building")
        })?;

        let sessions = sessions.unwrap_or_else(|| {
            Arc::new(SseSessionManager::new(
                self.config.session_idle_timeout,
                self.config.sweep_interval,
                self.config.session_queue_capacity,
            ))
        });

        let state = SseServerState {
            sessions,
            handler,
            messages_path: self.config.messages_path.clone(),
            validator: self.validator,
        };

        Ok(SseServer {
            config: self.config,
            state,
            local_addr: None,
            shutdown_tx: None,
            serve_task: None,
            is_running: false,
        })
    }
}

impl Default for SseServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
