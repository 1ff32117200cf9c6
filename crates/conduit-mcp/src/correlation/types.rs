//! Correlation Primitives
//!
//! The pending-request record and the monotonic id generator backing the
//! client side of the protocol.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};

// Layer 2: Third-party crate imports
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use tokio::sync::oneshot;

// Layer 3: Internal module imports
use crate::correlation::error::CorrelationResult;
use crate::protocol::RequestId;

/// A request awaiting its response
///
/// Holds the oneshot completion slot, the creation stamp, and the
/// deadline. At most one of these exists per request id per connection;
/// the slot resolves exactly once with a response, a timeout, a
/// cancellation, or a connection-closed rejection.
#[derive(Debug)]
pub struct PendingRequest {
    /// Completion slot for the correlated outcome
    pub sender: oneshot::Sender<CorrelationResult<Value>>,

    /// When the request was registered
    pub created_at: DateTime<Utc>,

    /// Maximum time to wait for a response
    pub deadline: TimeDelta,
}

impl PendingRequest {
    /// Create a pending request with the given deadline
    pub fn new(sender: oneshot::Sender<CorrelationResult<Value>>, deadline: TimeDelta) -> Self {
        Self {
            sender,
            created_at: Utc::now(),
            deadline,
        }
    }

    /// Whether the deadline has elapsed at the given instant
    ///
    /// Takes the instant as a parameter so a sweep over many requests
    /// reads the clock once.
    pub fn is_expired_at(&self, now: &DateTime<Utc>) -> bool {
        now.signed_duration_since(self.created_at) > self.deadline
    }
}

/// Monotonic request id generator
///
/// Produces string ids from an atomic counter. Uniqueness within the
/// connection is the only requirement the protocol places on ids; the
/// sequential form is just convenient in logs.
#[derive(Debug)]
pub struct RequestIdGenerator {
    counter: AtomicU64,
}

impl RequestIdGenerator {
    /// Create a generator starting at 1
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    /// Generate the next unique id
    pub fn next_id(&self) -> RequestId {
        let id = self.counter.fetch_add(1, Ordering::Relaxed);
        RequestId::new(id.to_string())
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fresh_request_is_not_expired() {
        let (sender, _receiver) = oneshot::channel();
        let pending = PendingRequest::new(sender, TimeDelta::seconds(60));
        assert!(!pending.is_expired_at(&Utc::now()));
    }

    #[test]
    fn expiry_respects_the_deadline() {
        let (sender, _receiver) = oneshot::channel();
        let pending = PendingRequest::new(sender, TimeDelta::milliseconds(5));
        let later = Utc::now() + TimeDelta::milliseconds(50);
        assert!(pending.is_expired_at(&later));
    }

    #[test]
    fn generator_produces_sequential_string_ids() {
        let generator = RequestIdGenerator::new();
        assert_eq!(generator.next_id().as_str(), "1");
        assert_eq!(generator.next_id().as_str(), "2");
        assert_eq!(generator.next_id().as_str(), "3");
    }

    #[test]
    fn generator_is_collision_free_across_threads() {
        let generator = Arc::new(RequestIdGenerator::new());
        let mut handles = vec![];

        for _ in 0..4 {
            let generator = Arc::clone(&generator);
            handles.push(thread::spawn(move || {
                (0..25).map(|_| generator.next_id()).collect::<Vec<_>>()
            }));
        }

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id.as_str().to_string()));
            }
        }
        assert_eq!(all.len(), 100);
    }
}
