//! Protocol Layer
//!
//! JSON-RPC 2.0 message model and codec, MCP domain types, the transport
//! contract, and shared constants. Everything above this module speaks in
//! these types; nothing below it knows about methods or capabilities.

pub mod constants;
pub mod errors;
pub mod message;
pub mod transport;
pub mod types;

// Flat re-exports so consumers write `protocol::JsonRpcRequest` instead
// of spelling out the submodule.
pub use errors::{JsonRpcError, ProtocolError, ProtocolResult};
pub use message::{
    ErrorObject, JsonRpcCodec, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId,
};
pub use transport::{MessageContext, MessageHandler, Transport, TransportError};
pub use types::{
    Base64Data, CallToolRequest, CallToolResult, ClientCapabilities, ClientInfo, Content,
    GetPromptRequest, GetPromptResult, InitializeRequest, InitializeResult, ListPromptsResult,
    ListResourcesResult, ListToolsResult, MimeType, Prompt, PromptArgument, PromptCapabilities,
    PromptMessage, ProtocolVersion, ReadResourceRequest, ReadResourceResult, Resource,
    ResourceCapabilities, RootsCapabilities, SamplingCapabilities, ServerCapabilities,
    ServerConfig, ServerInfo, Tool, ToolCapabilities, Uri,
};
