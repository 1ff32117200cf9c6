//! Transport Layer
//!
//! Concrete carriers of JSON-RPC frames behind the shared
//! [`Transport`](crate::protocol::Transport) contract: newline-delimited
//! stdio and the HTTP + SSE pair.

pub mod sse;
pub mod stdio;

pub use sse::{
    ApiKeyValidator, SseClientConfig, SseClientTransport, SseClientTransportBuilder,
    SseConnectionPhase, SseServer, SseServerBuilder, SseServerConfig, SseSessionManager,
    StaticApiKeyValidator,
};
pub use stdio::{StdioTransport, StdioTransportBuilder};
