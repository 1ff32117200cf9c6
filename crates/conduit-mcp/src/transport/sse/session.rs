//! SSE Session Registry
//!
//! Tracks live event-stream sessions by opaque id and owns every removal:
//! explicit close, peer disconnect, and the idle sweep all go through
//! this manager. Each session carries its own outbound queue, which the
//! event-stream response drains; that receiver is the single writer for
//! the session, so frames on one stream are never interleaved.

// Layer 1: Standard library imports
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use uuid::Uuid;

// Layer 3: Internal module imports
use crate::protocol::{JsonRpcMessage, TransportError};

/// One live SSE session
#[derive(Debug)]
pub struct SseSession {
    /// Opaque, unguessable session id
    pub session_id: String,
    /// Outbound queue feeding the session's event stream
    outbound: mpsc::Sender<JsonRpcMessage>,
    /// When the session was registered
    pub created_at: Instant,
    /// Last time the session saw traffic on either endpoint
    pub last_activity: Instant,
}

/// Callback invoked with the id of every session the manager removes
pub type SessionCloseHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Registry of live sessions with idle-timeout enforcement
///
/// Concurrency: lookups and delivery are lock-free reads on the
/// underlying map; registration and removal are the occasional writers.
pub struct SseSessionManager {
    sessions: Arc<DashMap<String, SseSession>>,
    idle_timeout: Duration,
    queue_capacity: usize,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    close_hook: Arc<RwLock<Option<SessionCloseHook>>>,
}

impl SseSessionManager {
    /// Create a manager and start its idle sweeper
    pub fn new(idle_timeout: Duration, sweep_interval: Duration, queue_capacity: usize) -> Self {
        let sessions: Arc<DashMap<String, SseSession>> = Arc::new(DashMap::new());
        let close_hook: Arc<RwLock<Option<SessionCloseHook>>> = Arc::new(RwLock::new(None));

        let sweeper = {
            let sessions = Arc::clone(&sessions);
            let close_hook = Arc::clone(&close_hook);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(sweep_interval);
                loop {
                    ticker.tick().await;
                    sweep_idle(&sessions, idle_timeout, &close_hook);
                }
            })
        };

        Self {
            sessions,
            idle_timeout,
            queue_capacity,
            sweeper: Mutex::new(Some(sweeper)),
            close_hook,
        }
    }

    /// Install a callback observing every removal (close, disconnect, sweep)
    pub fn set_close_hook(&self, hook: SessionCloseHook) {
        match self.close_hook.write() {
            Ok(mut guard) => *guard = Some(hook),
            Err(poisoned) => *poisoned.into_inner() = Some(hook),
        }
    }

    fn notify_closed(&self, session_id: &str) {
        let guard = match self.close_hook.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(hook) = guard.as_ref() {
            hook(session_id);
        }
    }

    /// Register a fresh session
    ///
    /// Returns the generated session id and the receiver the event stream
    /// drains. Dropping the receiver does not remove the session; the
    /// owning stream must call [`close_session`](Self::close_session).
    pub fn register(&self) -> (String, mpsc::Receiver<JsonRpcMessage>) {
        let session_id = Uuid::new_v4().simple().to_string();
        let (outbound, receiver) = mpsc::channel(self.queue_capacity);
        let now = Instant::now();

        self.sessions.insert(
            session_id.clone(),
            SseSession {
                session_id: session_id.clone(),
                outbound,
                created_at: now,
                last_activity: now,
            },
        );

        debug!(session_id = %session_id, "sse session registered");
        (session_id, receiver)
    }

    /// Whether a session id is currently live
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Refresh a session's activity stamp
    ///
    /// Returns `false` for unknown ids, without creating any state.
    pub fn touch(&self, session_id: &str) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                session.last_activity = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Queue a message onto a session's event stream
    ///
    /// # Errors
    ///
    /// [`TransportError::Connection`] when the session is unknown or its
    /// stream already shut down (the message is dropped, matching the
    /// contract that responses to a dead transport are discarded).
    pub async fn deliver(
        &self,
        session_id: &str,
        message: JsonRpcMessage,
    ) -> Result<(), TransportError> {
        let sender = match self.sessions.get(session_id) {
            Some(session) => session.outbound.clone(),
            None => {
                return Err(TransportError::connection(format!(
                    "unknown session: {session_id}"
                )))
            }
        };

        trace!(session_id = %session_id, "queueing outbound sse message");
        sender.send(message).await.map_err(|_| {
            TransportError::connection(format!("session {session_id} stream closed"))
        })
    }

    /// Remove a session, ending its event stream
    pub fn close_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            debug!(session_id = %session_id, "sse session closed");
            self.notify_closed(session_id);
        }
        removed
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Run one idle sweep immediately; returns how many sessions closed
    pub fn sweep_now(&self) -> usize {
        sweep_idle(&self.sessions, self.idle_timeout, &self.close_hook)
    }

    /// Stop the sweeper and drop every session
    pub async fn shutdown(&self) {
        let handle = {
            let mut guard = match self.sweeper.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.take()
        };
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
        self.sessions.clear();
        debug!("sse session manager shut down");
    }
}

fn sweep_idle(
    sessions: &DashMap<String, SseSession>,
    idle_timeout: Duration,
    close_hook: &RwLock<Option<SessionCloseHook>>,
) -> usize {
    let now = Instant::now();
    let idle: Vec<String> = sessions
        .iter()
        .filter_map(|entry| {
            (now.duration_since(entry.value().last_activity) > idle_timeout)
                .then(|| entry.key().clone())
        })
        .collect();

    let count = idle.len();
    for session_id in idle {
        if sessions.remove(&session_id).is_some() {
            debug!(session_id = %session_id, "sse session idle-timed out");
            let guard = match close_hook.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(hook) = guard.as_ref() {
                hook(&session_id);
            }
        }
    }
    count
}
