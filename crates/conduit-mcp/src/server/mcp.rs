//! MCP Server Assembly
//!
//! Builder collecting identity, capabilities, tools, and providers, and
//! the serving entry points that bind the resulting dispatcher to a
//! transport: `serve_stdio` for the process-connection case, `serve_sse`
//! for the HTTP pair.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tracing::info;

// Layer 3: Internal module imports
use crate::integration::error::McpResult;
use crate::protocol::{ServerCapabilities, ServerConfig, ServerInfo, Tool};
use crate::providers::{PromptProvider, ResourceProvider};
use crate::server::dispatcher::McpDispatcher;
use crate::server::handler::{QueueSink, ServerSessionHandler, SessionSink};
use crate::server::registry::{ToolHandler, ToolRegistry};
use crate::transport::sse::{
    ApiKeyValidator, SseServer, SseServerBuilder, SseServerConfig, SseSessionManager,
};
use crate::transport::stdio::{StdioTransport, StdioTransportBuilder};

/// Builder for an MCP server
///
/// # Examples
///
/// ```rust,no_run
/// use conduit_mcp::server::{McpServerBuilder, FnToolHandler};
/// use conduit_mcp::server::schema::ObjectSchema;
/// use conduit_mcp::protocol::{CallToolResult, Content, Tool};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let server = McpServerBuilder::new()
///     .server_info("adder", "1.0.0")
///     .register_tool(
///         Tool::new(
///             "add",
///             "Add two numbers",
///             ObjectSchema::new()
///                 .number("a", "First addend")
///                 .number("b", "Second addend")
///                 .build(),
///         ),
///         Arc::new(FnToolHandler::new(|args: serde_json::Value| async move {
///             let sum = args["a"].as_f64().unwrap_or(0.0) + args["b"].as_f64().unwrap_or(0.0);
///             Ok(CallToolResult::success(vec![Content::text(sum.to_string())]))
///         })),
///     )?
///     .build();
///
/// let mut transport = server.serve_stdio().await?;
/// transport.wait_for_completion().await?;
/// # Ok(())
/// # }
/// ```
pub struct McpServerBuilder {
    config: ServerConfig,
    registry: Arc<ToolRegistry>,
    resources: Option<Arc<dyn ResourceProvider>>,
    prompts: Option<Arc<dyn PromptProvider>>,
}

impl McpServerBuilder {
    /// Builder with default configuration
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            registry: Arc::new(ToolRegistry::new()),
            resources: None,
            prompts: None,
        }
    }

    /// Set the server identity reported at initialization
    pub fn server_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.server_info = ServerInfo {
            name: name.into(),
            version: version.into(),
        };
        self
    }

    /// Set the free-form instructions returned from `initialize`
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.config.instructions = Some(instructions.into());
        self
    }

    /// Override the base capability bag
    ///
    /// Feature groups backed by registered tools or providers are added
    /// on top at build time.
    pub fn capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.config.capabilities = capabilities;
        self
    }

    /// Replace the whole server configuration
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a tool
    ///
    /// # Errors
    ///
    /// `McpError::InvalidRequest` on duplicate tool names.
    pub fn register_tool(
        self,
        tool: Tool,
        handler: Arc<dyn ToolHandler>,
    ) -> McpResult<Self> {
        self.registry.register(tool, handler)?;
        Ok(self)
    }

    /// Attach a resource provider
    pub fn with_resource_provider<P: ResourceProvider + 'static>(mut self, provider: P) -> Self {
        self.resources = Some(Arc::new(provider));
        self
    }

    /// Attach a prompt provider
    pub fn with_prompt_provider<P: PromptProvider + 'static>(mut self, provider: P) -> Self {
        self.prompts = Some(Arc::new(provider));
        self
    }

    /// Assemble the server
    pub fn build(self) -> McpServer {
        let dispatcher = Arc::new(McpDispatcher::new(
            self.config,
            Arc::clone(&self.registry),
            self.resources,
            self.prompts,
        ));
        McpServer { dispatcher }
    }
}

impl Default for McpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An assembled MCP server, ready to bind transports
pub struct McpServer {
    dispatcher: Arc<McpDispatcher>,
}

impl McpServer {
    /// Builder entry point
    pub fn builder() -> McpServerBuilder {
        McpServerBuilder::new()
    }

    /// The dispatcher, for custom transport wiring
    pub fn dispatcher(&self) -> Arc<McpDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Serve over stdin/stdout
    ///
    /// Returns the started transport; callers typically
    /// `wait_for_completion` until the peer closes its end.
    pub async fn serve_stdio(&self) -> McpResult<StdioTransport> {
        let builder = StdioTransportBuilder::new();
        self.start_stdio(builder).await
    }

    /// Serve over injected I/O halves (tests, pipes)
    pub async fn serve_stdio_with_io<R, W>(
        &self,
        reader: R,
        writer: W,
    ) -> McpResult<StdioTransport<R, W>>
    where
        R: AsyncBufReadExt + Unpin + Send + Sync + 'static,
        W: AsyncWriteExt + Unpin + Send + Sync + 'static,
    {
        let builder = StdioTransportBuilder::with_custom_io(reader, writer);
        self.start_stdio(builder).await
    }

    async fn start_stdio<R, W>(
        &self,
        builder: StdioTransportBuilder<R, W>,
    ) -> McpResult<StdioTransport<R, W>>
    where
        R: AsyncBufReadExt + Unpin + Send + Sync + 'static,
        W: AsyncWriteExt + Unpin + Send + Sync + 'static,
    {
        use crate::protocol::Transport as _;

        let sink = Arc::new(QueueSink::new(builder.sender()));
        let handler = Arc::new(ServerSessionHandler::new(
            self.dispatcher(),
            sink,
            "stdio",
        ));

        let mut transport = builder.with_message_handler(handler).build()?;
        transport.start().await?;
        info!("mcp server serving on stdio");
        Ok(transport)
    }

    /// Serve over HTTP + SSE
    pub async fn serve_sse(&self, config: SseServerConfig) -> McpResult<SseServer> {
        self.serve_sse_with_validator(config, None).await
    }

    /// Serve over HTTP + SSE with API-key authentication
    pub async fn serve_sse_with_validator(
        &self,
        config: SseServerConfig,
        validator: Option<Arc<dyn ApiKeyValidator>>,
    ) -> McpResult<SseServer> {
        let sessions = Arc::new(SseSessionManager::new(
            config.session_idle_timeout,
            config.sweep_interval,
            config.session_queue_capacity,
        ));

        // Dead sessions also shed their initialization state.
        let dispatcher = self.dispatcher();
        sessions.set_close_hook(Arc::new(move |session_id: &str| {
            dispatcher.drop_session(session_id);
        }));

        let sink = Arc::new(SessionSink::new(Arc::clone(&sessions)));
        let handler = Arc::new(ServerSessionHandler::new(self.dispatcher(), sink, "sse"));

        let mut builder = SseServerBuilder::new()
            .with_config(config)
            .with_message_handler(handler);
        if let Some(validator) = validator {
            builder = builder.with_api_key_validator(validator);
        }

        let mut server = builder.build_with_sessions(Some(sessions))?;
        server.start().await?;
        Ok(server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CallToolResult, Content};
    use crate::server::registry::FnToolHandler;
    use crate::server::schema::ObjectSchema;
    use serde_json::Value;

    fn echo_tool() -> (Tool, Arc<dyn ToolHandler>) {
        (
            Tool::new("echo", "Echo arguments", ObjectSchema::new().build()),
            Arc::new(FnToolHandler::new(|arguments: Value| async move {
                Ok(CallToolResult::success(vec![Content::text(
                    arguments.to_string(),
                )]))
            })),
        )
    }

    #[tokio::test]
    async fn builder_wires_tools_into_capabilities() {
        let (tool, handler) = echo_tool();
        let server = McpServerBuilder::new()
            .server_info("test", "0.0.0")
            .register_tool(tool, handler)
            .unwrap()
            .build();

        let capabilities = server.dispatcher().capabilities().clone();
        assert!(capabilities.tools.is_some());
        assert!(capabilities.resources.is_none());
    }

    #[tokio::test]
    async fn duplicate_tool_registration_fails() {
        let (tool_a, handler_a) = echo_tool();
        let (tool_b, handler_b) = echo_tool();

        let result = McpServerBuilder::new()
            .register_tool(tool_a, handler_a)
            .unwrap()
            .register_tool(tool_b, handler_b);
        assert!(result.is_err());
    }
}
