//! SSE Transport
//!
//! The HTTP + Server-Sent Events transport pair: a long-lived event
//! stream downward and per-message POSTs upward, bound together by an
//! opaque session id handed out in the stream's first event.

pub mod client;
pub mod config;
pub mod parser;
pub mod server;
pub mod session;

pub use client::{SseClientTransport, SseClientTransportBuilder, SseConnectionPhase};
pub use config::{ApiKeyValidator, SseClientConfig, SseServerConfig, StaticApiKeyValidator};
pub use parser::{SseParser, SseWireEvent};
pub use server::{SseServer, SseServerBuilder, SseServerState};
pub use session::{SessionCloseHook, SseSession, SseSessionManager};
