//! Core MCP Protocol Types
//!
//! Domain newtypes with validation (protocol version, URI, MIME type,
//! base64 payloads), the polymorphic [`Content`] union, capability bags,
//! and the request/result pairs for every built-in protocol operation.
//!
//! All wire names follow the MCP convention (camelCase); the Rust side
//! stays snake_case through serde renames.
//!
//! # Examples
//!
//! ```rust
//! use conduit_mcp::protocol::{Content, ProtocolVersion};
//!
//! let version = ProtocolVersion::current();
//! assert_eq!(version.as_str(), "2024-11-05");
//!
//! let content = Content::text("8");
//! assert_eq!(content.as_text(), Some("8"));
//! ```

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::fmt;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Layer 3: Internal module imports
use crate::protocol::errors::{ProtocolError, ProtocolResult};

/// Protocol version in `YYYY-MM-DD` form
///
/// A single version string is compiled in; the server echoes it at
/// initialization and accepts mismatching clients without negotiating
/// downward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ProtocolVersion(String);

impl ProtocolVersion {
    /// The protocol revision this crate implements
    pub const CURRENT: &'static str = "2024-11-05";

    /// Create a protocol version with format validation
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidProtocolVersion`] unless the value
    /// is `YYYY-MM-DD`.
    pub fn new(version: impl Into<String>) -> ProtocolResult<Self> {
        let version = version.into();
        if Self::is_valid(&version) {
            Ok(Self(version))
        } else {
            Err(ProtocolError::InvalidProtocolVersion(version))
        }
    }

    /// The compiled-in current version; never fails
    pub fn current() -> Self {
        Self(Self::CURRENT.to_string())
    }

    /// Get the version string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_valid(version: &str) -> bool {
        let bytes = version.as_bytes();
        bytes.len() == 10
            && bytes[4] == b'-'
            && bytes[7] == b'-'
            && bytes[0..4].iter().all(u8::is_ascii_digit)
            && bytes[5..7].iter().all(u8::is_ascii_digit)
            && bytes[8..10].iter().all(u8::is_ascii_digit)
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// URI with scheme validation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Uri(String);

impl Uri {
    /// Create a URI with validation
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidUri`] when the value is empty or
    /// lacks a scheme.
    pub fn new(uri: impl Into<String>) -> ProtocolResult<Self> {
        let uri = uri.into();
        if !uri.is_empty() && uri.contains(':') && !uri.starts_with(':') {
            Ok(Self(uri))
        } else {
            Err(ProtocolError::InvalidUri(uri))
        }
    }

    /// Create a URI without validation, for trusted constants
    pub fn new_unchecked(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Get the URI string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the scheme portion
    pub fn scheme(&self) -> Option<&str> {
        self.0.split(':').next()
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// MIME type in `type/subtype` form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MimeType(String);

impl MimeType {
    /// Create a MIME type with validation
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidMimeType`] unless the value is
    /// `type/subtype` with both halves non-empty.
    pub fn new(mime_type: impl Into<String>) -> ProtocolResult<Self> {
        let mime_type = mime_type.into();
        let mut parts = mime_type.splitn(2, '/');
        match (parts.next(), parts.next()) {
            (Some(main), Some(sub)) if !main.is_empty() && !sub.is_empty() => Ok(Self(mime_type)),
            _ => Err(ProtocolError::InvalidMimeType(mime_type)),
        }
    }

    /// Get the MIME type string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Base64-encoded binary payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Base64Data(String);

impl Base64Data {
    /// Create base64 data with alphabet/padding validation
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidBase64Data`] for empty payloads,
    /// foreign characters, or interior padding.
    pub fn new(data: impl Into<String>) -> ProtocolResult<Self> {
        let data = data.into();
        let valid = !data.is_empty()
            && data
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
            && !data.trim_end_matches('=').contains('=');
        if valid {
            Ok(Self(data))
        } else {
            Err(ProtocolError::InvalidBase64Data)
        }
    }

    /// Get the encoded string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Multi-modal content, discriminated by a `type` field on the wire
///
/// Unknown `type` tags fail deserialization with a typed error rather
/// than collapsing to a null or default variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Content {
    /// Plain text content
    #[serde(rename = "text")]
    Text {
        /// The text payload
        text: String,
    },

    /// Image content with base64-encoded data
    #[serde(rename = "image")]
    Image {
        /// Base64-encoded image bytes
        data: Base64Data,
        /// MIME type of the image
        #[serde(rename = "mimeType")]
        mime_type: MimeType,
    },

    /// Embedded resource content
    #[serde(rename = "resource")]
    Resource {
        /// URI of the resource
        uri: Uri,
        /// Optional MIME type of the resource
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<MimeType>,
        /// Textual body, when the resource is text
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        /// Binary body, when the resource is not text
        #[serde(skip_serializing_if = "Option::is_none")]
        blob: Option<Base64Data>,
    },
}

impl Content {
    /// Create text content
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create image content
    pub fn image(data: Base64Data, mime_type: MimeType) -> Self {
        Self::Image { data, mime_type }
    }

    /// Create a textual embedded resource
    pub fn resource_text(uri: Uri, mime_type: Option<MimeType>, text: impl Into<String>) -> Self {
        Self::Resource {
            uri,
            mime_type,
            text: Some(text.into()),
            blob: None,
        }
    }

    /// Extract a text payload if one exists
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text } => Some(text),
            Content::Resource { text: Some(text), .. } => Some(text),
            _ => None,
        }
    }
}

/// Client identity exchanged at initialization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientInfo {
    /// Name of the client application
    pub name: String,
    /// Version of the client application
    pub version: String,
}

/// Server identity exchanged at initialization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerInfo {
    /// Name of the server application
    pub name: String,
    /// Version of the server application
    pub version: String,
}

/// Capability bag advertised by the client
///
/// A missing group means the feature is unsupported.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapabilities>,
}

/// Capability bag advertised by the server
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptCapabilities>,
}

/// Sampling capability group (presence is the signal)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SamplingCapabilities {}

/// Roots capability group
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RootsCapabilities {
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Tool capability group
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ToolCapabilities {
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Resource capability group
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ResourceCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Prompt capability group
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PromptCapabilities {
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Tool definition: a named, schema-described unit of functionality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Unique tool name within a registry
    pub name: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema describing the tool's arguments
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl Tool {
    /// Create a tool definition
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema,
        }
    }
}

/// Result of a `tools/call` invocation
///
/// Tool failures are carried here (`is_error: true` with a human-readable
/// cause in `content`), never as JSON-RPC errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallToolResult {
    /// Ordered content produced by the tool
    pub content: Vec<Content>,
    /// Whether the tool call failed
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Create a successful tool result
    pub fn success(content: Vec<Content>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    /// Create a failed tool result carrying a textual cause
    pub fn error_text(cause: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(cause)],
            is_error: true,
        }
    }
}

/// A resource available from the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    /// URI of the resource
    pub uri: Uri,
    /// Name of the resource
    pub name: String,
    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional MIME type
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<MimeType>,
}

/// A prompt template available from the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prompt {
    /// Unique identifier for the prompt
    pub name: String,
    /// Optional description of the prompt's purpose
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Arguments this prompt accepts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PromptArgument>,
}

/// An argument of a prompt template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptArgument {
    /// Name of the argument
    pub name: String,
    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the argument is required
    #[serde(default)]
    pub required: bool,
}

/// One message of a rendered prompt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptMessage {
    /// Role of the message author (`user`, `assistant`, `system`)
    pub role: String,
    /// Message content
    pub content: Content,
}

impl PromptMessage {
    /// Create a user message
    pub fn user(content: Content) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }

    /// Create an assistant message
    pub fn assistant(content: Content) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
        }
    }
}

/// `initialize` request parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitializeRequest {
    /// Protocol version the client speaks
    #[serde(rename = "protocolVersion")]
    pub protocol_version: ProtocolVersion,
    /// Client capability bag
    #[serde(default)]
    pub capabilities: ClientCapabilities,
    /// Client identity
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

/// `initialize` response payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitializeResult {
    /// Protocol version the server speaks (compiled in, never negotiated)
    #[serde(rename = "protocolVersion")]
    pub protocol_version: ProtocolVersion,
    /// Server capability bag
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Server identity
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
    /// Optional free-form guidance for the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// `tools/call` request parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallToolRequest {
    /// Name of the tool to call
    pub name: String,
    /// Decoded JSON arguments (absent means no arguments)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// `tools/list` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListToolsResult {
    /// Enabled tools
    pub tools: Vec<Tool>,
    /// Pagination cursor, omitted on the final page
    #[serde(rename = "nextCursor", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// `resources/list` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListResourcesResult {
    /// Available resources
    pub resources: Vec<Resource>,
    /// Pagination cursor, omitted on the final page
    #[serde(rename = "nextCursor", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// `resources/read` request parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadResourceRequest {
    /// URI of the resource to read
    pub uri: Uri,
}

/// `resources/read` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadResourceResult {
    /// Contents of the resource
    pub contents: Vec<Content>,
}

/// `prompts/list` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListPromptsResult {
    /// Available prompts
    pub prompts: Vec<Prompt>,
    /// Pagination cursor, omitted on the final page
    #[serde(rename = "nextCursor", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// `prompts/get` request parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetPromptRequest {
    /// Name of the prompt to render
    pub name: String,
    /// Argument values keyed by argument name
    #[serde(default)]
    pub arguments: HashMap<String, String>,
}

/// `prompts/get` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetPromptResult {
    /// Optional description of the rendered prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Rendered messages
    pub messages: Vec<PromptMessage>,
}

/// Core server configuration shared by every transport
///
/// Identity, capabilities, the compiled-in protocol version, and the
/// optional initialize-time instructions.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Server identity sent during initialization
    pub server_info: ServerInfo,
    /// Capabilities to advertise
    pub capabilities: ServerCapabilities,
    /// Protocol version to echo
    pub protocol_version: ProtocolVersion,
    /// Optional instructions returned from `initialize`
    pub instructions: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_info: ServerInfo {
                name: crate::protocol::constants::defaults::SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: ServerCapabilities::default(),
            protocol_version: ProtocolVersion::current(),
            instructions: None,
        }
    }
}
