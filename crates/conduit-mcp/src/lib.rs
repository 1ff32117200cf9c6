//! Conduit MCP - Model Context Protocol Runtime
//!
//! A complete implementation of the Model Context Protocol (MCP): a
//! JSON-RPC 2.0 based client/server protocol for exposing *tools*,
//! *resources*, and *prompts* to a consumer. Both halves are provided,
//! each over two interchangeable transports (newline-delimited stdio and
//! an HTTP + Server-Sent Events pair) behind one message-transport
//! contract.
//!
//! # Architecture
//!
//! - **Protocol layer** ([`protocol`]): JSON-RPC message model and
//!   codec, MCP domain types, the transport contract
//! - **Correlation layer** ([`correlation`]): client-side pending-request
//!   table with deadline enforcement
//! - **Transport layer** ([`transport`]): stdio framer and the SSE
//!   session/endpoint machinery
//! - **Server layer** ([`server`]): dispatcher, tool registry, schema
//!   helpers, server assembly
//! - **Integration layer** ([`integration`]): the high-level typed client
//! - **Providers** ([`providers`]): resource and prompt seams
//!
//! # Quick start
//!
//! ```rust
//! use conduit_mcp::protocol::{JsonRpcMessage, JsonRpcRequest, JsonRpcCodec, RequestId};
//! use serde_json::json;
//!
//! let request = JsonRpcRequest::new(
//!     "tools/call",
//!     Some(json!({"name": "add", "arguments": {"a": 5, "b": 3}})),
//!     RequestId::new("req-1"),
//! );
//!
//! let wire = request.to_json().unwrap();
//! let decoded = JsonRpcMessage::from_json(&wire).unwrap();
//! assert!(decoded.is_request());
//! ```
//!
//! Building a server and serving it over stdio:
//!
//! ```rust,no_run
//! use conduit_mcp::server::{McpServerBuilder, FnToolHandler};
//! use conduit_mcp::server::schema::ObjectSchema;
//! use conduit_mcp::protocol::{CallToolResult, Content, Tool};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = McpServerBuilder::new()
//!     .server_info("adder", "1.0.0")
//!     .register_tool(
//!         Tool::new(
//!             "add",
//!             "Add two numbers",
//!             ObjectSchema::new().number("a", "a").number("b", "b").build(),
//!         ),
//!         Arc::new(FnToolHandler::new(|args: serde_json::Value| async move {
//!             let sum = args["a"].as_f64().unwrap_or(0.0) + args["b"].as_f64().unwrap_or(0.0);
//!             Ok(CallToolResult::success(vec![Content::text(sum.to_string())]))
//!         })),
//!     )?
//!     .build();
//!
//! let mut transport = server.serve_stdio().await?;
//! transport.wait_for_completion().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod correlation;
pub mod integration;
pub mod protocol;
pub mod providers;
pub mod server;
pub mod transport;

// Convenience re-exports of the types nearly every consumer touches.
pub use config::{McpConfig, TransportKind};
pub use correlation::{CorrelationConfig, CorrelationError, CorrelationManager};
pub use integration::{McpClient, McpClientBuilder, McpClientConfig, McpError, McpResult};
pub use protocol::{
    CallToolResult, Content, ErrorObject, JsonRpcCodec, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, MessageContext, MessageHandler, ProtocolError,
    ProtocolVersion, RequestId, ServerCapabilities, Tool, Transport, TransportError,
};
pub use server::{McpServer, McpServerBuilder, ToolRegistry};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
