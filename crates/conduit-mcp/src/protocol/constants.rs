//! MCP Protocol Constants
//!
//! Method names, JSON-RPC error codes, and default values shared across
//! the crate. Centralizing them keeps wire strings consistent and out of
//! handler bodies.

/// MCP protocol method names
pub mod methods {
    /// Initialization handshake request
    pub const INITIALIZE: &str = "initialize";
    /// Notification the client sends after the initialize response
    pub const INITIALIZED: &str = "notifications/initialized";

    /// Tool-related methods
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";

    /// Resource-related methods
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_READ: &str = "resources/read";

    /// Prompt-related methods
    pub const PROMPTS_LIST: &str = "prompts/list";
    pub const PROMPTS_GET: &str = "prompts/get";

    /// Connectivity testing method
    pub const PING: &str = "ping";
}

/// JSON-RPC 2.0 error codes
pub mod error_codes {
    /// Parse error - invalid JSON was received
    pub const PARSE_ERROR: i32 = -32700;

    /// Invalid Request - the JSON sent is not a valid request object
    pub const INVALID_REQUEST: i32 = -32600;

    /// Method not found - the method does not exist / is not available
    pub const METHOD_NOT_FOUND: i32 = -32601;

    /// Invalid params - invalid method parameter(s)
    pub const INVALID_PARAMS: i32 = -32602;

    /// Internal error - internal JSON-RPC error
    pub const INTERNAL_ERROR: i32 = -32603;

    /// Server error - start of the implementation-defined range
    pub const SERVER_ERROR: i32 = -32000;

    /// Server error - end of the implementation-defined range
    pub const SERVER_ERROR_END: i32 = -32099;
}

/// Default values for the protocol runtime
pub mod defaults {
    use std::time::Duration;

    /// Default client name reported during initialization
    pub const CLIENT_NAME: &str = "conduit-mcp-client";

    /// Default server name reported during initialization
    pub const SERVER_NAME: &str = "conduit-mcp-server";

    /// Per-request client deadline
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    /// Bound on waiting for the SSE `endpoint` event
    pub const ENDPOINT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Server-side SSE inactivity cutoff
    pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

    /// Interval of the session idle sweep
    pub const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

    /// Default SSE event-stream path
    pub const SSE_PATH: &str = "/sse";

    /// Default SSE message-channel path
    pub const MESSAGES_PATH: &str = "/messages";
}

/// Process exit codes for the CLI wrappers
pub mod exit_codes {
    /// Normal exit
    pub const SUCCESS: i32 = 0;
    /// Fatal startup error (bind failure, missing API key, ...)
    pub const STARTUP_FAILURE: i32 = 1;
    /// Invalid command-line arguments
    pub const INVALID_ARGUMENTS: i32 = 2;
}
