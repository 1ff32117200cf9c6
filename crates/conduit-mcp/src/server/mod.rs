//! Server Layer
//!
//! The dispatcher (method resolution, initialization gating, error-plane
//! mapping), the tool registry, the schema helpers, and the assembly
//! that binds all of it to a transport.

pub mod dispatcher;
pub mod handler;
pub mod mcp;
pub mod registry;
pub mod schema;

pub use dispatcher::McpDispatcher;
pub use handler::{QueueSink, ResponseSink, ServerSessionHandler, SessionSink};
pub use mcp::{McpServer, McpServerBuilder};
pub use registry::{tool_prefix, FnToolHandler, ToolHandler, ToolRegistry};
pub use schema::{validate_arguments, ObjectSchema};
