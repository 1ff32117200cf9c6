//! SSE Transport Configuration
//!
//! Server listen settings (paths, timeouts, CORS, auth) and client
//! connect settings (stream URL, API key, handshake bound).

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use url::Url;

// Layer 3: Internal module imports
use crate::protocol::constants::defaults;

/// Opaque API-key check evaluated before any session work
///
/// When configured, both SSE endpoints require a key carried either as
/// `Authorization: Bearer <key>` or `X-API-Key: <key>`.
pub trait ApiKeyValidator: Send + Sync {
    /// Whether the presented key grants access
    fn validate(&self, key: &str) -> bool;
}

/// Validator backed by a fixed key set
#[derive(Debug, Clone)]
pub struct StaticApiKeyValidator {
    keys: Vec<String>,
}

impl StaticApiKeyValidator {
    /// Create a validator accepting exactly these keys
    pub fn new(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl ApiKeyValidator for StaticApiKeyValidator {
    fn validate(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

/// Server-side SSE transport configuration
#[derive(Debug, Clone)]
pub struct SseServerConfig {
    /// Listen host
    pub host: String,
    /// Listen port (0 picks an ephemeral port)
    pub port: u16,
    /// Path of the event-stream endpoint
    pub sse_path: String,
    /// Path of the message-POST endpoint
    pub messages_path: String,
    /// Optional liveness endpoint path
    pub health_path: Option<String>,
    /// Optional CORS allow-list; unset means no CORS layer
    pub allowed_origins: Option<Vec<String>>,
    /// Inactivity cutoff after which a session is closed
    pub session_idle_timeout: Duration,
    /// How often the idle sweep runs
    pub sweep_interval: Duration,
    /// Per-session outbound queue depth
    pub session_queue_capacity: usize,
}

impl Default for SseServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            sse_path: defaults::SSE_PATH.to_string(),
            messages_path: defaults::MESSAGES_PATH.to_string(),
            health_path: None,
            allowed_origins: None,
            session_idle_timeout: defaults::SESSION_IDLE_TIMEOUT,
            sweep_interval: defaults::SESSION_SWEEP_INTERVAL,
            session_queue_capacity: 64,
        }
    }
}

impl SseServerConfig {
    /// The socket address string this configuration binds
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Client-side SSE transport configuration
#[derive(Debug, Clone)]
pub struct SseClientConfig {
    /// Full URL of the server's event-stream endpoint
    pub sse_url: Url,
    /// Optional API key sent as a bearer token
    pub api_key: Option<String>,
    /// Bound on waiting for the `endpoint` event
    pub handshake_timeout: Duration,
}

impl SseClientConfig {
    /// Configuration pointing at the given event-stream URL
    pub fn new(sse_url: Url) -> Self {
        Self {
            sse_url,
            api_key: None,
            handshake_timeout: defaults::ENDPOINT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Attach an API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the handshake timeout
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults_match_the_documented_values() {
        let config = SseServerConfig::default();
        assert_eq!(config.sse_path, "/sse");
        assert_eq!(config.messages_path, "/messages");
        assert_eq!(config.session_idle_timeout, Duration::from_secs(1800));
        assert!(config.health_path.is_none());
    }

    #[test]
    fn static_validator_accepts_only_known_keys() {
        let validator = StaticApiKeyValidator::new(["secret-a", "secret-b"]);
        assert!(validator.validate("secret-a"));
        assert!(validator.validate("secret-b"));
        assert!(!validator.validate("secret-c"));
        assert!(!validator.validate(""));
    }

    #[test]
    fn client_config_builder_chain() {
        let url = Url::parse("http://127.0.0.1:3000/sse").unwrap();
        let config = SseClientConfig::new(url)
            .with_api_key("k")
            .with_handshake_timeout(Duration::from_secs(3));
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.handshake_timeout, Duration::from_secs(3));
    }
}
