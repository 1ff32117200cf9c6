//! High-Level MCP Client
//!
//! Typed operations over any [`Transport`]: the initialization
//! handshake, tool listing and invocation, resource reads, and prompt
//! retrieval. Request/response matching runs on the correlation engine;
//! per-request deadlines, connection-closed rejections, and wire errors
//! reach callers as distinct [`McpError`] variants.
//!
//! Construction is two-phase because transports are built pre-configured
//! with their handler: take the handler from the builder, wire it into a
//! transport, then build the client around that transport.
//!
//! ```rust,no_run
//! use conduit_mcp::integration::McpClientBuilder;
//! use conduit_mcp::transport::stdio::StdioTransportBuilder;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = McpClientBuilder::new().client_info("demo", "1.0.0");
//!
//! let transport = StdioTransportBuilder::new()
//!     .with_message_handler(builder.message_handler())
//!     .build()?;
//!
//! let client = builder.build(transport).await?;
//! let init = client.initialize().await?;
//! println!("connected to {}", init.server_info.name);
//!
//! for tool in client.list_tools().await? {
//!     println!("tool: {}", tool.name);
//! }
//! # Ok(())
//! # }
//! ```

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use chrono::TimeDelta;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

// Layer 3: Internal module imports
use crate::correlation::{CorrelationConfig, CorrelationError, CorrelationManager};
use crate::integration::error::{McpError, McpResult};
use crate::protocol::constants::{defaults, methods};
use crate::protocol::{
    CallToolRequest, CallToolResult, ClientCapabilities, ClientInfo, Content, GetPromptRequest,
    GetPromptResult, InitializeRequest, InitializeResult, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, ListPromptsResult, ListResourcesResult, ListToolsResult, MessageContext,
    MessageHandler, Prompt, ProtocolVersion, ReadResourceRequest, ReadResourceResult, Resource,
    ServerCapabilities, Tool, Transport, TransportError,
};

/// MCP protocol session state, distinct from transport connectivity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpSessionState {
    /// Handshake not attempted yet
    NotInitialized,
    /// `initialize` sent, waiting for the response
    Initializing,
    /// Handshake complete, operations available
    Ready,
    /// Handshake failed
    Failed,
}

/// Client behavior configuration
#[derive(Debug, Clone)]
pub struct McpClientConfig {
    /// Identity sent during initialization
    pub client_info: ClientInfo,
    /// Capabilities to advertise
    pub capabilities: ClientCapabilities,
    /// Protocol version to claim
    pub protocol_version: ProtocolVersion,
    /// Per-request deadline
    pub request_timeout: Duration,
}

impl Default for McpClientConfig {
    fn default() -> Self {
        Self {
            client_info: ClientInfo {
                name: defaults::CLIENT_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: ClientCapabilities::default(),
            protocol_version: ProtocolVersion::current(),
            request_timeout: defaults::REQUEST_TIMEOUT,
        }
    }
}

/// Routes inbound transport events into the correlation engine
struct ClientMessageHandler {
    correlation: Arc<CorrelationManager>,
}

#[async_trait]
impl MessageHandler for ClientMessageHandler {
    async fn handle_message(&self, message: JsonRpcMessage, _context: MessageContext) {
        match message {
            JsonRpcMessage::Response(response) => {
                let Some(id) = response.id else {
                    warn!("response without id dropped");
                    return;
                };
                let outcome = match response.error {
                    Some(error) => Err(CorrelationError::WireError {
                        code: error.code,
                        message: error.message,
                    }),
                    None => Ok(response.result.unwrap_or(Value::Null)),
                };
                if self.correlation.correlate_response(&id, outcome).is_err() {
                    // Caller timed out or cancelled; the response is late.
                    trace!(%id, "late response dropped");
                }
            }
            JsonRpcMessage::Notification(notification) => {
                trace!(method = %notification.method, "server notification ignored");
            }
            JsonRpcMessage::Request(request) => {
                trace!(method = %request.method, "server-initiated request ignored");
            }
        }
    }

    async fn handle_error(&self, error: TransportError) {
        warn!(error = %error, "client transport error");
    }

    async fn handle_close(&self) {
        let failed = self.correlation.fail_all_pending();
        debug!(failed, "transport closed");
    }
}

/// Builder for [`McpClient`]
pub struct McpClientBuilder {
    config: McpClientConfig,
    correlation: Option<Arc<CorrelationManager>>,
}

impl McpClientBuilder {
    /// Builder with default configuration
    pub fn new() -> Self {
        Self {
            config: McpClientConfig::default(),
            correlation: None,
        }
    }

    /// Set the client identity
    pub fn client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.client_info = ClientInfo {
            name: name.into(),
            version: version.into(),
        };
        self
    }

    /// Set the advertised capabilities
    pub fn capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.config.capabilities = capabilities;
        self
    }

    /// Set the per-request deadline
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// The handler to pre-configure the transport with
    ///
    /// Creates the correlation engine on first call; the client built
    /// afterwards shares it, so responses arriving on the transport find
    /// the pending table.
    pub fn message_handler(&mut self) -> Arc<dyn MessageHandler> {
        let correlation = Arc::clone(self.correlation.get_or_insert_with(|| {
            Arc::new(CorrelationManager::new(CorrelationConfig {
                default_deadline: TimeDelta::from_std(self.config.request_timeout)
                    .unwrap_or_else(|_| TimeDelta::seconds(60)),
                ..CorrelationConfig::default()
            }))
        }));
        Arc::new(ClientMessageHandler { correlation })
    }

    /// Build the client and start the transport
    ///
    /// The transport must have been wired with
    /// [`message_handler`](Self::message_handler), otherwise responses
    /// never reach the pending table.
    pub async fn build<T>(mut self, mut transport: T) -> McpResult<McpClient<T>>
    where
        T: Transport<Error = TransportError> + 'static,
    {
        let correlation = self.correlation.take().ok_or_else(|| {
            McpError::custom(
                "message_handler() must be taken and wired into the transport before build",
            )
        })?;

        transport.start().await?;

        Ok(McpClient {
            transport: Arc::new(RwLock::new(transport)),
            config: self.config,
            correlation,
            session: Arc::new(RwLock::new(McpSessionState::NotInitialized)),
            server_capabilities: Arc::new(RwLock::new(None)),
            tool_cache: Arc::new(RwLock::new(HashMap::new())),
            resource_cache: Arc::new(RwLock::new(HashMap::new())),
            prompt_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }
}

impl Default for McpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// High-level MCP client over a transport
///
/// Cheap to share: every field is behind an `Arc`, and all operations
/// take `&self`.
pub struct McpClient<T: Transport> {
    transport: Arc<RwLock<T>>,
    config: McpClientConfig,
    correlation: Arc<CorrelationManager>,
    session: Arc<RwLock<McpSessionState>>,
    server_capabilities: Arc<RwLock<Option<ServerCapabilities>>>,
    tool_cache: Arc<RwLock<HashMap<String, Tool>>>,
    resource_cache: Arc<RwLock<HashMap<String, Resource>>>,
    prompt_cache: Arc<RwLock<HashMap<String, Prompt>>>,
}

impl<T: Transport> std::fmt::Debug for McpClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("config", &self.config)
            .finish()
    }
}

impl<T: Transport<Error = TransportError> + 'static> McpClient<T> {
    /// Perform the initialization handshake
    ///
    /// Sends `initialize`, records the server's capability bag, then
    /// confirms with `notifications/initialized`.
    pub async fn initialize(&self) -> McpResult<InitializeResult> {
        {
            let session = self.session.read().await;
            match *session {
                McpSessionState::Ready => return Err(McpError::AlreadyInitialized),
                McpSessionState::Initializing => {
                    return Err(McpError::custom("initialization already in progress"))
                }
                McpSessionState::Failed | McpSessionState::NotInitialized => {}
            }
        }
        *self.session.write().await = McpSessionState::Initializing;

        let request = InitializeRequest {
            protocol_version: self.config.protocol_version.clone(),
            capabilities: self.config.capabilities.clone(),
            client_info: self.config.client_info.clone(),
        };
        let params = serde_json::to_value(&request)
            .map_err(|e| McpError::invalid_request(e.to_string()))?;

        let result = match self.send_request(methods::INITIALIZE, Some(params)).await {
            Ok(result) => result,
            Err(e) => {
                *self.session.write().await = McpSessionState::Failed;
                return Err(e);
            }
        };

        let init: InitializeResult = serde_json::from_value(result).map_err(|e| {
            McpError::invalid_response(format!("invalid initialize result: {e}"))
        })?;

        *self.server_capabilities.write().await = Some(init.capabilities.clone());

        // Confirm the handshake; the server marks the session ready.
        self.send_notification(methods::INITIALIZED, None).await?;
        *self.session.write().await = McpSessionState::Ready;

        debug!(server = %init.server_info.name, "mcp session ready");
        Ok(init)
    }

    /// Current session state
    pub async fn session_state(&self) -> McpSessionState {
        self.session.read().await.clone()
    }

    /// Whether operations are available
    pub async fn is_ready(&self) -> bool {
        *self.session.read().await == McpSessionState::Ready
    }

    /// Server capability bag (after initialization)
    pub async fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.server_capabilities.read().await.clone()
    }

    async fn ensure_ready(&self) -> McpResult<()> {
        if self.is_ready().await {
            Ok(())
        } else {
            Err(McpError::NotConnected)
        }
    }

    async fn supports(&self, check: impl Fn(&ServerCapabilities) -> bool) -> bool {
        self.server_capabilities
            .read()
            .await
            .as_ref()
            .is_some_and(check)
    }

    /// Probe connectivity
    pub async fn ping(&self) -> McpResult<()> {
        self.ensure_ready().await?;
        self.send_request(methods::PING, None).await?;
        Ok(())
    }

    /// List the server's enabled tools
    pub async fn list_tools(&self) -> McpResult<Vec<Tool>> {
        self.ensure_ready().await?;
        if !self.supports(|caps| caps.tools.is_some()).await {
            return Err(McpError::unsupported_capability("tools"));
        }

        let result = self.send_request(methods::TOOLS_LIST, None).await?;
        let list: ListToolsResult = serde_json::from_value(result)
            .map_err(|e| McpError::invalid_response(format!("invalid tools list: {e}")))?;

        let mut cache = self.tool_cache.write().await;
        for tool in &list.tools {
            cache.insert(tool.name.clone(), tool.clone());
        }
        Ok(list.tools)
    }

    /// Invoke a tool
    ///
    /// Tool failures come back as `CallToolResult { is_error: true }`;
    /// only protocol failures are `Err`.
    pub async fn call_tool(
        &self,
        name: impl Into<String>,
        arguments: Option<Value>,
    ) -> McpResult<CallToolResult> {
        self.ensure_ready().await?;
        let request = CallToolRequest {
            name: name.into(),
            arguments,
        };
        let params = serde_json::to_value(&request)
            .map_err(|e| McpError::invalid_request(e.to_string()))?;

        let result = self.send_request(methods::TOOLS_CALL, Some(params)).await?;
        serde_json::from_value(result)
            .map_err(|e| McpError::invalid_response(format!("invalid tool result: {e}")))
    }

    /// List the server's resources
    pub async fn list_resources(&self) -> McpResult<Vec<Resource>> {
        self.ensure_ready().await?;
        if !self.supports(|caps| caps.resources.is_some()).await {
            return Err(McpError::unsupported_capability("resources"));
        }

        let result = self.send_request(methods::RESOURCES_LIST, None).await?;
        let list: ListResourcesResult = serde_json::from_value(result)
            .map_err(|e| McpError::invalid_response(format!("invalid resources list: {e}")))?;

        let mut cache = self.resource_cache.write().await;
        for resource in &list.resources {
            cache.insert(resource.uri.to_string(), resource.clone());
        }
        Ok(list.resources)
    }

    /// Read one resource by URI
    pub async fn read_resource(&self, uri: impl Into<String>) -> McpResult<Vec<Content>> {
        self.ensure_ready().await?;
        let request = ReadResourceRequest {
            uri: crate::protocol::Uri::new_unchecked(uri.into()),
        };
        let params = serde_json::to_value(&request)
            .map_err(|e| McpError::invalid_request(e.to_string()))?;

        let result = self
            .send_request(methods::RESOURCES_READ, Some(params))
            .await?;
        let read: ReadResourceResult = serde_json::from_value(result)
            .map_err(|e| McpError::invalid_response(format!("invalid resource read: {e}")))?;
        Ok(read.contents)
    }

    /// List the server's prompts
    pub async fn list_prompts(&self) -> McpResult<Vec<Prompt>> {
        self.ensure_ready().await?;
        if !self.supports(|caps| caps.prompts.is_some()).await {
            return Err(McpError::unsupported_capability("prompts"));
        }

        let result = self.send_request(methods::PROMPTS_LIST, None).await?;
        let list: ListPromptsResult = serde_json::from_value(result)
            .map_err(|e| McpError::invalid_response(format!("invalid prompts list: {e}")))?;

        let mut cache = self.prompt_cache.write().await;
        for prompt in &list.prompts {
            cache.insert(prompt.name.clone(), prompt.clone());
        }
        Ok(list.prompts)
    }

    /// Render one prompt
    pub async fn get_prompt(
        &self,
        name: impl Into<String>,
        arguments: HashMap<String, String>,
    ) -> McpResult<GetPromptResult> {
        self.ensure_ready().await?;
        let request = GetPromptRequest {
            name: name.into(),
            arguments,
        };
        let params = serde_json::to_value(&request)
            .map_err(|e| McpError::invalid_request(e.to_string()))?;

        let result = self.send_request(methods::PROMPTS_GET, Some(params)).await?;
        serde_json::from_value(result)
            .map_err(|e| McpError::invalid_response(format!("invalid prompt result: {e}")))
    }

    /// Close the connection, rejecting anything still pending
    pub async fn close(&self) -> McpResult<()> {
        *self.session.write().await = McpSessionState::NotInitialized;
        self.correlation.fail_all_pending();

        let mut transport = self.transport.write().await;
        transport.close().await?;
        Ok(())
    }

    /// Send one request and await its correlated outcome
    async fn send_request(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        let (id, receiver) = self.correlation.register_request(None)?;
        let request = JsonRpcRequest::new(method, params, id.clone());

        {
            let mut transport = self.transport.write().await;
            if let Err(e) = transport.send(&JsonRpcMessage::Request(request)).await {
                let _ = self.correlation.cancel_request(&id);
                return Err(e.into());
            }
        }

        let outcome = receiver
            .await
            .map_err(|_| McpError::custom("correlation slot dropped"))?;
        outcome.map_err(McpError::from)
    }

    async fn send_notification(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        let notification = JsonRpcNotification::new(method, params);
        let mut transport = self.transport.write().await;
        transport
            .send(&JsonRpcMessage::Notification(notification))
            .await?;
        Ok(())
    }
}
