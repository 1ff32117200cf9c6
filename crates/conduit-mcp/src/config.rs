//! Flat Configuration Surface
//!
//! One deserializable object covering both halves and both transports;
//! timeouts are given in seconds. The per-transport configurations are
//! derived from it, so embedders can load a single document and hand
//! slices of it to whatever they are wiring up.

// Layer 1: Standard library imports
use std::str::FromStr;
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::Deserialize;
use url::Url;

// Layer 3: Internal module imports
use crate::protocol::constants::defaults;
use crate::protocol::{ProtocolError, ProtocolResult, ProtocolVersion, ServerConfig, ServerInfo};
use crate::transport::sse::{SseClientConfig, SseServerConfig};

/// Which transport carries the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Newline-delimited JSON over stdin/stdout
    Stdio,
    /// HTTP + Server-Sent Events pair
    Sse,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "stdio" => Ok(TransportKind::Stdio),
            "sse" => Ok(TransportKind::Sse),
            other => Err(format!("unknown transport: {other} (expected stdio or sse)")),
        }
    }
}

/// The enumerated configuration options
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct McpConfig {
    /// Transport selection
    pub transport: TransportKind,
    /// SSE listen/connect host
    pub host: String,
    /// SSE listen/connect port
    pub port: u16,
    /// URL scheme for SSE clients (`http` or `https`)
    pub scheme: String,
    /// Event-stream path
    pub sse_path: String,
    /// Message-POST path
    pub messages_path: String,
    /// Optional liveness endpoint path
    pub health_path: Option<String>,
    /// Opaque API key (client side) / accepted key (server side)
    pub api_key: Option<String>,
    /// Per-request client deadline, seconds
    pub request_timeout: u64,
    /// SSE endpoint-event wait, seconds
    pub endpoint_handshake_timeout: u64,
    /// Server-side SSE inactivity cutoff, seconds
    pub session_idle_timeout: u64,
    /// Optional CORS allow-list for the SSE endpoints
    pub allowed_origins: Option<Vec<String>>,
    /// Protocol version identifier
    pub protocol_version: String,
    /// Server name returned from `initialize`
    pub server_name: String,
    /// Server version returned from `initialize`
    pub server_version: String,
    /// Optional free-form text returned from `initialize`
    pub instructions: Option<String>,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Stdio,
            host: "127.0.0.1".to_string(),
            port: 3000,
            scheme: "http".to_string(),
            sse_path: defaults::SSE_PATH.to_string(),
            messages_path: defaults::MESSAGES_PATH.to_string(),
            health_path: None,
            api_key: None,
            request_timeout: defaults::REQUEST_TIMEOUT.as_secs(),
            endpoint_handshake_timeout: defaults::ENDPOINT_HANDSHAKE_TIMEOUT.as_secs(),
            session_idle_timeout: defaults::SESSION_IDLE_TIMEOUT.as_secs(),
            allowed_origins: None,
            protocol_version: ProtocolVersion::CURRENT.to_string(),
            server_name: defaults::SERVER_NAME.to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
        }
    }
}

impl McpConfig {
    /// Derive the server-side SSE transport configuration
    pub fn sse_server_config(&self) -> SseServerConfig {
        SseServerConfig {
            host: self.host.clone(),
            port: self.port,
            sse_path: self.sse_path.clone(),
            messages_path: self.messages_path.clone(),
            health_path: self.health_path.clone(),
            allowed_origins: self.allowed_origins.clone(),
            session_idle_timeout: Duration::from_secs(self.session_idle_timeout),
            ..SseServerConfig::default()
        }
    }

    /// Derive the client-side SSE transport configuration
    ///
    /// # Errors
    ///
    /// [`ProtocolError::InvalidUri`] when host/port/scheme do not form a
    /// valid URL.
    pub fn sse_client_config(&self) -> ProtocolResult<SseClientConfig> {
        let url = format!(
            "{}://{}:{}{}",
            self.scheme, self.host, self.port, self.sse_path
        );
        let sse_url =
            Url::parse(&url).map_err(|_| ProtocolError::InvalidUri(url.clone()))?;

        let mut config = SseClientConfig::new(sse_url)
            .with_handshake_timeout(Duration::from_secs(self.endpoint_handshake_timeout));
        if let Some(key) = &self.api_key {
            config = config.with_api_key(key.clone());
        }
        Ok(config)
    }

    /// Derive the protocol-level server configuration
    ///
    /// # Errors
    ///
    /// [`ProtocolError::InvalidProtocolVersion`] when the configured
    /// version string is malformed.
    pub fn server_config(&self) -> ProtocolResult<ServerConfig> {
        Ok(ServerConfig {
            server_info: ServerInfo {
                name: self.server_name.clone(),
                version: self.server_version.clone(),
            },
            capabilities: Default::default(),
            protocol_version: ProtocolVersion::new(&self.protocol_version)?,
            instructions: self.instructions.clone(),
        })
    }

    /// Per-request client deadline as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = McpConfig::default();
        assert_eq!(config.transport, TransportKind::Stdio);
        assert_eq!(config.sse_path, "/sse");
        assert_eq!(config.messages_path, "/messages");
        assert_eq!(config.request_timeout, 60);
        assert_eq!(config.endpoint_handshake_timeout, 10);
        assert_eq!(config.session_idle_timeout, 1800);
        assert_eq!(config.protocol_version, "2024-11-05");
    }

    #[test]
    fn partial_documents_fill_with_defaults() {
        let config: McpConfig = serde_json::from_value(json!({
            "transport": "sse",
            "port": 8080,
            "apiKey": "secret",
        }))
        .unwrap();

        assert_eq!(config.transport, TransportKind::Sse);
        assert_eq!(config.port, 8080);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn transport_kind_parses() {
        assert_eq!("stdio".parse::<TransportKind>().unwrap(), TransportKind::Stdio);
        assert_eq!("SSE".parse::<TransportKind>().unwrap(), TransportKind::Sse);
        assert!("carrier-pigeon".parse::<TransportKind>().is_err());
    }

    #[test]
    fn sse_client_config_builds_the_stream_url() {
        let config = McpConfig {
            scheme: "http".to_string(),
            host: "10.0.0.5".to_string(),
            port: 9000,
            ..Default::default()
        };
        let client = config.sse_client_config().unwrap();
        assert_eq!(client.sse_url.as_str(), "http://10.0.0.5:9000/sse");
    }

    #[test]
    fn invalid_protocol_version_is_rejected() {
        let config = McpConfig {
            protocol_version: "v1".to_string(),
            ..Default::default()
        };
        assert!(config.server_config().is_err());
    }

    #[test]
    fn sse_server_config_carries_the_idle_timeout() {
        let config = McpConfig {
            session_idle_timeout: 5,
            ..Default::default()
        };
        let server = config.sse_server_config();
        assert_eq!(server.session_idle_timeout, Duration::from_secs(5));
    }
}
