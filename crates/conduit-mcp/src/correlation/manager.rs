//! Correlation Manager
//!
//! The client-side pending-request table: assigns ids, parks callers on
//! oneshot slots, routes arriving responses to the right caller, and
//! enforces per-request deadlines through a background sweeper.
//!
//! Guarantee: for every registered request, the caller's receiver
//! resolves exactly once, with the response, a timeout, a cancellation,
//! or a connection-closed rejection. Responses arriving after the slot is
//! gone are dropped.
//!
//! # Examples
//!
//! ```rust
//! use conduit_mcp::correlation::{CorrelationConfig, CorrelationManager};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = CorrelationManager::new(CorrelationConfig::default());
//!
//! let (id, receiver) = manager.register_request(None)?;
//! manager.correlate_response(&id, Ok(json!({"ok": true})))?;
//!
//! let outcome = receiver.await??;
//! assert_eq!(outcome["ok"], true);
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

// Layer 1: Standard library imports
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

// Layer 2: Third-party crate imports
use chrono::TimeDelta;
use dashmap::DashMap;
use serde_json::Value;
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{interval, Duration},
};
use tracing::{debug, trace};

// Layer 3: Internal module imports
use crate::correlation::error::{CorrelationError, CorrelationResult};
use crate::correlation::types::{PendingRequest, RequestIdGenerator};
use crate::protocol::RequestId;

/// Configuration for the correlation manager
#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    /// Deadline applied when a request does not override it
    pub default_deadline: TimeDelta,

    /// How often the sweeper looks for expired requests
    pub sweep_interval: Duration,

    /// Maximum number of simultaneously pending requests (0 = unlimited)
    pub max_pending_requests: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            default_deadline: TimeDelta::seconds(60),
            sweep_interval: Duration::from_millis(500),
            max_pending_requests: 1024,
        }
    }
}

/// Pending-request table with deadline enforcement
///
/// Thread-safe: concurrent `register_request` calls from many tasks are
/// fine, and the sweeper never blocks readers.
#[derive(Debug)]
pub struct CorrelationManager {
    /// Pending requests keyed by id
    requests: Arc<DashMap<RequestId, PendingRequest>>,

    /// Monotonic id source
    id_generator: RequestIdGenerator,

    /// Configuration
    config: CorrelationConfig,

    /// Sweeper task handle
    sweeper: Mutex<Option<JoinHandle<()>>>,

    /// Shutdown flag observed by the sweeper
    shutdown: Arc<AtomicBool>,
}

impl CorrelationManager {
    /// Create a manager and start its deadline sweeper
    pub fn new(config: CorrelationConfig) -> Self {
        let requests: Arc<DashMap<RequestId, PendingRequest>> = Arc::new(DashMap::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let sweeper = Self::spawn_sweeper(
            Arc::clone(&requests),
            config.sweep_interval,
            Arc::clone(&shutdown),
        );

        debug!(?config, "correlation manager started");

        Self {
            requests,
            id_generator: RequestIdGenerator::new(),
            config,
            sweeper: Mutex::new(Some(sweeper)),
            shutdown,
        }
    }

    /// Register a new request
    ///
    /// Assigns a fresh id and returns it with the receiver the caller
    /// awaits. The deadline defaults to the configured value.
    ///
    /// # Errors
    ///
    /// [`CorrelationError::Internal`] when the pending table is full.
    pub fn register_request(
        &self,
        deadline: Option<TimeDelta>,
    ) -> CorrelationResult<(RequestId, oneshot::Receiver<CorrelationResult<Value>>)> {
        if self.config.max_pending_requests > 0
            && self.requests.len() >= self.config.max_pending_requests
        {
            return Err(CorrelationError::internal("pending request table is full"));
        }

        let (sender, receiver) = oneshot::channel();
        let id = self.id_generator.next_id();
        let deadline = deadline.unwrap_or(self.config.default_deadline);

        trace!(%id, ?deadline, "registering request");
        self.requests
            .insert(id.clone(), PendingRequest::new(sender, deadline));

        Ok((id, receiver))
    }

    /// Deliver a response (or wire error) to the caller waiting on `id`
    ///
    /// Removes the slot. A response for an id that is no longer pending
    /// returns [`CorrelationError::RequestNotFound`]; callers treat that
    /// as "late response, drop it".
    pub fn correlate_response(
        &self,
        id: &RequestId,
        response: CorrelationResult<Value>,
    ) -> CorrelationResult<()> {
        let (_, pending) = self
            .requests
            .remove(id)
            .ok_or_else(|| CorrelationError::RequestNotFound { id: id.clone() })?;

        trace!(%id, "correlating response");
        pending
            .sender
            .send(response)
            .map_err(|_| CorrelationError::ChannelClosed { id: id.clone() })?;
        Ok(())
    }

    /// Cancel a pending request, rejecting its caller
    pub fn cancel_request(&self, id: &RequestId) -> CorrelationResult<()> {
        let (_, pending) = self
            .requests
            .remove(id)
            .ok_or_else(|| CorrelationError::RequestNotFound { id: id.clone() })?;

        debug!(%id, "cancelling request");
        let _ = pending
            .sender
            .send(Err(CorrelationError::Cancelled { id: id.clone() }));
        Ok(())
    }

    /// Reject every pending request with a connection-closed error
    ///
    /// Called when the transport goes away; returns how many callers were
    /// rejected.
    pub fn fail_all_pending(&self) -> usize {
        let ids: Vec<RequestId> = self.requests.iter().map(|e| e.key().clone()).collect();
        let mut failed = 0;

        for id in ids {
            if let Some((_, pending)) = self.requests.remove(&id) {
                let _ = pending
                    .sender
                    .send(Err(CorrelationError::ConnectionClosed { id: id.clone() }));
                failed += 1;
            }
        }

        if failed > 0 {
            debug!(failed, "rejected pending requests on connection close");
        }
        failed
    }

    /// Number of requests currently awaiting correlation
    pub fn pending_count(&self) -> usize {
        self.requests.len()
    }

    /// Whether a request is still pending
    pub fn is_pending(&self, id: &RequestId) -> bool {
        self.requests.contains_key(id)
    }

    /// Sweep expired requests immediately, returning how many timed out
    ///
    /// The background sweeper calls this on its interval; exposed for
    /// deterministic tests.
    pub fn sweep_expired(&self) -> usize {
        Self::sweep_table(&self.requests)
    }

    fn sweep_table(requests: &DashMap<RequestId, PendingRequest>) -> usize {
        let now = chrono::Utc::now();
        let expired: Vec<RequestId> = requests
            .iter()
            .filter_map(|entry| entry.value().is_expired_at(&now).then(|| entry.key().clone()))
            .collect();

        let count = expired.len();
        for id in expired {
            if let Some((_, pending)) = requests.remove(&id) {
                trace!(%id, "request timed out");
                let _ = pending.sender.send(Err(CorrelationError::Timeout {
                    id: id.clone(),
                    deadline: pending.deadline,
                }));
            }
        }
        count
    }

    fn spawn_sweeper(
        requests: Arc<DashMap<RequestId, PendingRequest>>,
        sweep_interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            while !shutdown.load(Ordering::Relaxed) {
                ticker.tick().await;
                let timed_out = Self::sweep_table(&requests);
                if timed_out > 0 {
                    debug!(timed_out, "sweeper expired requests");
                }
            }
        })
    }

    /// Stop the sweeper and cancel everything still pending
    pub async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);

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

        let ids: Vec<RequestId> = self.requests.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, pending)) = self.requests.remove(&id) {
                let _ = pending
                    .sender
                    .send(Err(CorrelationError::Cancelled { id: id.clone() }));
            }
        }

        debug!("correlation manager shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::time::sleep;

    fn test_config() -> CorrelationConfig {
        CorrelationConfig {
            sweep_interval: Duration::from_millis(20),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn register_and_correlate() {
        let manager = CorrelationManager::new(test_config());

        let (id, receiver) = manager.register_request(None).unwrap();
        assert_eq!(manager.pending_count(), 1);
        assert!(manager.is_pending(&id));

        manager
            .correlate_response(&id, Ok(json!({"answer": 42})))
            .unwrap();

        let outcome = receiver.await.unwrap().unwrap();
        assert_eq!(outcome["answer"], 42);
        assert_eq!(manager.pending_count(), 0);

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn expired_request_rejects_with_timeout() {
        let manager = CorrelationManager::new(test_config());

        let (id, receiver) = manager
            .register_request(Some(TimeDelta::milliseconds(10)))
            .unwrap();

        sleep(Duration::from_millis(100)).await;
        assert_eq!(manager.pending_count(), 0);

        match receiver.await.unwrap() {
            Err(CorrelationError::Timeout { id: timed_out, .. }) => assert_eq!(timed_out, id),
            other => panic!("expected timeout, got {other:?}"),
        }

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn late_response_is_dropped() {
        let manager = CorrelationManager::new(test_config());

        let (id, receiver) = manager
            .register_request(Some(TimeDelta::milliseconds(10)))
            .unwrap();
        sleep(Duration::from_millis(100)).await;

        // Caller already got the timeout; the arriving response must not find a slot.
        let result = manager.correlate_response(&id, Ok(json!("late")));
        assert!(matches!(
            result,
            Err(CorrelationError::RequestNotFound { .. })
        ));

        assert!(matches!(
            receiver.await.unwrap(),
            Err(CorrelationError::Timeout { .. })
        ));

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn cancellation_removes_the_slot() {
        let manager = CorrelationManager::new(test_config());

        let (id, receiver) = manager.register_request(None).unwrap();
        manager.cancel_request(&id).unwrap();
        assert_eq!(manager.pending_count(), 0);

        assert!(matches!(
            receiver.await.unwrap(),
            Err(CorrelationError::Cancelled { .. })
        ));

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn connection_close_rejects_everything() {
        let manager = CorrelationManager::new(test_config());

        let (_, receiver_a) = manager.register_request(None).unwrap();
        let (_, receiver_b) = manager.register_request(None).unwrap();
        assert_eq!(manager.pending_count(), 2);

        assert_eq!(manager.fail_all_pending(), 2);
        assert_eq!(manager.pending_count(), 0);

        assert!(matches!(
            receiver_a.await.unwrap(),
            Err(CorrelationError::ConnectionClosed { .. })
        ));
        assert!(matches!(
            receiver_b.await.unwrap(),
            Err(CorrelationError::ConnectionClosed { .. })
        ));

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn capacity_limit_is_enforced() {
        let manager = CorrelationManager::new(CorrelationConfig {
            max_pending_requests: 2,
            ..test_config()
        });

        let (_, _r1) = manager.register_request(None).unwrap();
        let (_, _r2) = manager.register_request(None).unwrap();

        assert!(matches!(
            manager.register_request(None),
            Err(CorrelationError::Internal { .. })
        ));

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn concurrent_callers_each_get_their_own_response() {
        let manager = Arc::new(CorrelationManager::new(test_config()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                let (id, receiver) = manager.register_request(None).unwrap();
                sleep(Duration::from_millis(5)).await;
                manager
                    .correlate_response(&id, Ok(json!({"caller": i})))
                    .unwrap();
                let outcome = receiver.await.unwrap().unwrap();
                assert_eq!(outcome["caller"], i);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(manager.pending_count(), 0);

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_cancels_pending_requests() {
        let manager = CorrelationManager::new(test_config());
        let (_, receiver) = manager.register_request(None).unwrap();

        manager.shutdown().await;

        assert!(matches!(
            receiver.await.unwrap(),
            Err(CorrelationError::Cancelled { .. })
        ));
    }
}
