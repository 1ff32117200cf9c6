//! Server Dispatcher
//!
//! The server core: receives decoded messages, resolves the method,
//! invokes the handler, and wraps the outcome as a JSON-RPC response.
//! Requests produce exactly one response; notifications produce none and
//! their failures are only logged.
//!
//! Two error planes meet here and stay apart: protocol failures (unknown
//! method, undecodable params, initialization-order violations) become
//! JSON-RPC errors, while tool handler failures become successful
//! responses carrying `CallToolResult { isError: true }`.
//!
//! Per-session initialization gate: until `initialize` completes for a
//! session, every other request is rejected with `-32600`. The
//! `notifications/initialized` notification afterwards marks the session
//! ready. Version mismatches at initialize are accepted; the server
//! simply echoes its compiled-in version.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use serde_json::{json, Value};
use tracing::{debug, trace, warn};

// Layer 3: Internal module imports
use crate::integration::error::McpError;
use crate::protocol::constants::methods;
use crate::protocol::{
    CallToolRequest, CallToolResult, ErrorObject, GetPromptRequest, InitializeRequest,
    InitializeResult, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, ListPromptsResult,
    ListResourcesResult, ListToolsResult, PromptCapabilities, ReadResourceRequest,
    ResourceCapabilities, ServerCapabilities, ServerConfig, ToolCapabilities,
};
use crate::providers::{PromptProvider, ResourceProvider};
use crate::server::registry::ToolRegistry;
use crate::server::schema::validate_arguments;

/// Initialization progress of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionPhase {
    /// `initialize` has completed; requests are admitted
    Initialized,
    /// `notifications/initialized` has arrived
    Ready,
}

/// Server core shared by every transport
pub struct McpDispatcher {
    config: ServerConfig,
    capabilities: ServerCapabilities,
    registry: Arc<ToolRegistry>,
    resources: Option<Arc<dyn ResourceProvider>>,
    prompts: Option<Arc<dyn PromptProvider>>,
    sessions: DashMap<String, SessionPhase>,
}

impl McpDispatcher {
    /// Assemble a dispatcher
    ///
    /// The effective capability bag is derived here: a feature group is
    /// advertised exactly when something can serve it.
    pub fn new(
        config: ServerConfig,
        registry: Arc<ToolRegistry>,
        resources: Option<Arc<dyn ResourceProvider>>,
        prompts: Option<Arc<dyn PromptProvider>>,
    ) -> Self {
        let mut capabilities = config.capabilities.clone();
        if !registry.is_empty() && capabilities.tools.is_none() {
            capabilities.tools = Some(ToolCapabilities::default());
        }
        if resources.is_some() && capabilities.resources.is_none() {
            capabilities.resources = Some(ResourceCapabilities::default());
        }
        if prompts.is_some() && capabilities.prompts.is_none() {
            capabilities.prompts = Some(PromptCapabilities::default());
        }

        Self {
            config,
            capabilities,
            registry,
            resources,
            prompts,
            sessions: DashMap::new(),
        }
    }

    /// The capability bag reported from `initialize`
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// The tool registry backing `tools/*`
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Handle one inbound message for a session
    ///
    /// Returns the response to emit on the originating transport, or
    /// `None` for notifications and stray responses.
    pub async fn dispatch(
        &self,
        message: JsonRpcMessage,
        session_id: &str,
    ) -> Option<JsonRpcMessage> {
        match message {
            JsonRpcMessage::Request(request) => {
                let response = self.handle_request(request, session_id).await;
                Some(JsonRpcMessage::Response(response))
            }
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(&notification.method, session_id)
                    .await;
                None
            }
            JsonRpcMessage::Response(_) => {
                trace!(session_id, "ignoring response received by server");
                None
            }
        }
    }

    /// Forget a session's initialization state (transport closed)
    pub fn drop_session(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    async fn handle_request(&self, request: JsonRpcRequest, session_id: &str) -> JsonRpcResponse {
        let id = request.id.clone();
        let method = request.method.as_str();
        let params = request.params.unwrap_or(Value::Null);
        trace!(session_id, method, "dispatching request");

        if method == methods::INITIALIZE {
            return match self.handle_initialize(params, session_id) {
                Ok(result) => JsonRpcResponse::success(result, id),
                Err(error) => JsonRpcResponse::error(error, Some(id)),
            };
        }

        // Everything else waits for a completed initialize.
        if self.sessions.get(session_id).is_none() {
            debug!(session_id, method, "request before initialize rejected");
            return JsonRpcResponse::error(
                ErrorObject::invalid_request()
                    .with_data(json!("initialize must complete before other requests")),
                Some(id),
            );
        }

        let outcome = match method {
            methods::PING => Ok(json!({})),
            methods::TOOLS_LIST => self.handle_tools_list(),
            methods::TOOLS_CALL => self.handle_tools_call(params).await,
            methods::RESOURCES_LIST => self.handle_resources_list().await,
            methods::RESOURCES_READ => self.handle_resources_read(params).await,
            methods::PROMPTS_LIST => self.handle_prompts_list().await,
            methods::PROMPTS_GET => self.handle_prompts_get(params).await,
            unknown => {
                debug!(session_id, method = unknown, "method not found");
                Err(ErrorObject::method_not_found().with_data(json!(unknown)))
            }
        };

        match outcome {
            Ok(result) => JsonRpcResponse::success(result, id),
            Err(error) => JsonRpcResponse::error(error, Some(id)),
        }
    }

    async fn handle_notification(&self, method: &str, session_id: &str) {
        match method {
            methods::INITIALIZED => {
                if let Some(mut phase) = self.sessions.get_mut(session_id) {
                    *phase = SessionPhase::Ready;
                    debug!(session_id, "session ready");
                } else {
                    warn!(session_id, "initialized notification before initialize");
                }
            }
            other => {
                trace!(session_id, method = other, "notification ignored");
            }
        }
    }

    fn handle_initialize(
        &self,
        params: Value,
        session_id: &str,
    ) -> Result<Value, ErrorObject> {
        let request: InitializeRequest = serde_json::from_value(params)
            .map_err(|e| ErrorObject::invalid_params().with_data(json!(e.to_string())))?;

        if request.protocol_version != self.config.protocol_version {
            // Accepted anyway; the response carries our version and the
            // client decides what to do with the mismatch.
            debug!(
                session_id,
                client_version = %request.protocol_version,
                server_version = %self.config.protocol_version,
                "protocol version mismatch accepted"
            );
        }
        debug!(
            session_id,
            client = %request.client_info.name,
            "session initialized"
        );

        self.sessions
            .insert(session_id.to_string(), SessionPhase::Initialized);

        let result = InitializeResult {
            protocol_version: self.config.protocol_version.clone(),
            capabilities: self.capabilities.clone(),
            server_info: self.config.server_info.clone(),
            instructions: self.config.instructions.clone(),
        };
        serde_json::to_value(result)
            .map_err(|e| ErrorObject::internal_error().with_data(json!(e.to_string())))
    }

    fn handle_tools_list(&self) -> Result<Value, ErrorObject> {
        let result = ListToolsResult {
            tools: self.registry.enabled(),
            next_cursor: None,
        };
        to_result_value(result)
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, ErrorObject> {
        let request: CallToolRequest = serde_json::from_value(params)
            .map_err(|e| ErrorObject::invalid_params().with_data(json!(e.to_string())))?;

        let (tool, handler) = self.registry.get_by_name(&request.name).ok_or_else(|| {
            ErrorObject::invalid_params()
                .with_data(json!(format!("unknown tool: {}", request.name)))
        })?;

        let arguments = request.arguments.unwrap_or(Value::Null);
        let arguments = validate_arguments(&tool.input_schema, &arguments)
            .map_err(|violation| ErrorObject::invalid_params().with_data(json!(violation)))?;

        // Tool failures are result-plane: the call itself succeeded.
        let result = match handler.call(arguments).await {
            Ok(result) => result,
            Err(e) => {
                debug!(tool = %request.name, error = %e, "tool handler failed");
                CallToolResult::error_text(e.to_string())
            }
        };
        to_result_value(result)
    }

    async fn handle_resources_list(&self) -> Result<Value, ErrorObject> {
        let resources = match &self.resources {
            Some(provider) => provider.list_resources().await.map_err(internal_error)?,
            None => Vec::new(),
        };
        to_result_value(ListResourcesResult {
            resources,
            next_cursor: None,
        })
    }

    async fn handle_resources_read(&self, params: Value) -> Result<Value, ErrorObject> {
        let request: ReadResourceRequest = serde_json::from_value(params)
            .map_err(|e| ErrorObject::invalid_params().with_data(json!(e.to_string())))?;

        let provider = self.resources.as_ref().ok_or_else(|| {
            ErrorObject::invalid_params().with_data(json!("no resources available"))
        })?;

        let contents = provider
            .read_resource(request.uri.as_str())
            .await
            .map_err(provider_error)?;
        to_result_value(crate::protocol::ReadResourceResult { contents })
    }

    async fn handle_prompts_list(&self) -> Result<Value, ErrorObject> {
        let prompts = match &self.prompts {
            Some(provider) => provider.list_prompts().await.map_err(internal_error)?,
            None => Vec::new(),
        };
        to_result_value(ListPromptsResult {
            prompts,
            next_cursor: None,
        })
    }

    async fn handle_prompts_get(&self, params: Value) -> Result<Value, ErrorObject> {
        let request: GetPromptRequest = serde_json::from_value(params)
            .map_err(|e| ErrorObject::invalid_params().with_data(json!(e.to_string())))?;

        let provider = self.prompts.as_ref().ok_or_else(|| {
            ErrorObject::invalid_params().with_data(json!("no prompts available"))
        })?;

        let arguments: HashMap<String, String> = request.arguments;
        let result = provider
            .get_prompt(&request.name, arguments)
            .await
            .map_err(provider_error)?;
        to_result_value(result)
    }
}

fn to_result_value<T: serde::Serialize>(result: T) -> Result<Value, ErrorObject> {
    serde_json::to_value(result)
        .map_err(|e| ErrorObject::internal_error().with_data(json!(e.to_string())))
}

/// Map a provider failure to the wire
///
/// Lookup misses are the caller's fault (`-32602`); anything else is an
/// internal failure (`-32603`).
fn provider_error(error: McpError) -> ErrorObject {
    match &error {
        McpError::ResourceNotFound { .. }
        | McpError::PromptNotFound { .. }
        | McpError::InvalidRequest { .. } => {
            ErrorObject::invalid_params().with_data(json!(error.to_string()))
        }
        _ => internal_error(error),
    }
}

fn internal_error(error: McpError) -> ErrorObject {
    ErrorObject::internal_error().with_data(json!(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        ClientCapabilities, ClientInfo, Content, JsonRpcNotification, ProtocolVersion, RequestId,
    };
    use crate::server::registry::{FnToolHandler, ToolHandler};
    use crate::server::schema::ObjectSchema;

    const SESSION: &str = "test-session";

    fn add_handler() -> Arc<dyn ToolHandler> {
        Arc::new(FnToolHandler::new(|arguments: Value| async move {
            let a = arguments["a"].as_f64().unwrap_or_default();
            let b = arguments["b"].as_f64().unwrap_or_default();
            Ok(CallToolResult::success(vec![Content::text(format!(
                "{}",
                a + b
            ))]))
        }))
    }

    fn divide_handler() -> Arc<dyn ToolHandler> {
        Arc::new(FnToolHandler::new(|arguments: Value| async move {
            let a = arguments["a"].as_f64().unwrap_or_default();
            let b = arguments["b"].as_f64().unwrap_or_default();
            if b == 0.0 {
                return Err(McpError::tool_execution_failed("divide", "divide by zero"));
            }
            Ok(CallToolResult::success(vec![Content::text(format!(
                "{}",
                a / b
            ))]))
        }))
    }

    fn test_dispatcher() -> McpDispatcher {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(
                crate::protocol::Tool::new(
                    "add",
                    "Add two numbers",
                    ObjectSchema::new()
                        .number("a", "First addend")
                        .number("b", "Second addend")
                        .build(),
                ),
                add_handler(),
            )
            .unwrap();
        registry
            .register(
                crate::protocol::Tool::new(
                    "divide",
                    "Divide a by b",
                    ObjectSchema::new()
                        .number("a", "Dividend")
                        .number("b", "Divisor")
                        .build(),
                ),
                divide_handler(),
            )
            .unwrap();

        McpDispatcher::new(ServerConfig::default(), registry, None, None)
    }

    fn initialize_params() -> Value {
        serde_json::to_value(InitializeRequest {
            protocol_version: ProtocolVersion::current(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo {
                name: "test-client".to_string(),
                version: "0.0.1".to_string(),
            },
        })
        .unwrap()
    }

    async fn request(
        dispatcher: &McpDispatcher,
        method: &str,
        params: Option<Value>,
    ) -> JsonRpcResponse {
        let message = JsonRpcMessage::Request(JsonRpcRequest::new(
            method,
            params,
            RequestId::new("1"),
        ));
        match dispatcher.dispatch(message, SESSION).await {
            Some(JsonRpcMessage::Response(response)) => response,
            other => panic!("expected a response, got {other:?}"),
        }
    }

    async fn initialize(dispatcher: &McpDispatcher) {
        let response = request(dispatcher, methods::INITIALIZE, Some(initialize_params())).await;
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn initialize_reports_config_and_capabilities() {
        let dispatcher = test_dispatcher();
        let response = request(&dispatcher, methods::INITIALIZE, Some(initialize_params())).await;

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "conduit-mcp-server");
        // Tools registered, so the tools group is advertised.
        assert!(result["capabilities"]["tools"].is_object());
        assert!(result["capabilities"].get("resources").is_none());
    }

    #[tokio::test]
    async fn requests_before_initialize_are_invalid() {
        let dispatcher = test_dispatcher();
        let response = request(&dispatcher, methods::TOOLS_LIST, None).await;

        let error = response.error.unwrap();
        assert_eq!(error.code, -32600);
    }

    #[tokio::test]
    async fn version_mismatch_is_accepted() {
        let dispatcher = test_dispatcher();
        let mut params = initialize_params();
        params["protocolVersion"] = json!("2019-01-01");

        let response = request(&dispatcher, methods::INITIALIZE, Some(params)).await;
        let result = response.result.unwrap();
        // No negotiation: the server echoes its own version.
        assert_eq!(result["protocolVersion"], "2024-11-05");
    }

    #[tokio::test]
    async fn unknown_method_is_32601() {
        let dispatcher = test_dispatcher();
        initialize(&dispatcher).await;

        let response = request(&dispatcher, "nope", None).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "Method not found");
    }

    #[tokio::test]
    async fn tools_list_returns_enabled_tools_only() {
        let dispatcher = test_dispatcher();
        initialize(&dispatcher).await;

        let response = request(&dispatcher, methods::TOOLS_LIST, None).await;
        let result = response.result.unwrap();
        assert_eq!(result["tools"].as_array().unwrap().len(), 2);

        dispatcher.registry().set_enabled(["add"]);
        let response = request(&dispatcher, methods::TOOLS_LIST, None).await;
        let tools = response.result.unwrap()["tools"].clone();
        assert_eq!(tools.as_array().unwrap().len(), 1);
        assert_eq!(tools[0]["name"], "add");
    }

    #[tokio::test]
    async fn tools_call_add() {
        let dispatcher = test_dispatcher();
        initialize(&dispatcher).await;

        let response = request(
            &dispatcher,
            methods::TOOLS_CALL,
            Some(json!({"name": "add", "arguments": {"a": 5, "b": 3}})),
        )
        .await;

        let result = response.result.unwrap();
        assert_eq!(result["isError"], json!(false));
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains('8'));
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_params() {
        let dispatcher = test_dispatcher();
        initialize(&dispatcher).await;

        let response = request(
            &dispatcher,
            methods::TOOLS_CALL,
            Some(json!({"name": "ghost", "arguments": {}})),
        )
        .await;

        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn schema_violation_is_invalid_params() {
        let dispatcher = test_dispatcher();
        initialize(&dispatcher).await;

        let response = request(
            &dispatcher,
            methods::TOOLS_CALL,
            Some(json!({"name": "add", "arguments": {"a": 5}})),
        )
        .await;

        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn tool_failure_is_result_plane_not_error_plane() {
        let dispatcher = test_dispatcher();
        initialize(&dispatcher).await;

        let response = request(
            &dispatcher,
            methods::TOOLS_CALL,
            Some(json!({"name": "divide", "arguments": {"a": 10, "b": 0}})),
        )
        .await;

        // Protocol-success: no error field.
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], json!(true));
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("divide by zero"));
    }

    #[tokio::test]
    async fn resources_and_prompts_list_empty_without_providers() {
        let dispatcher = test_dispatcher();
        initialize(&dispatcher).await;

        let response = request(&dispatcher, methods::RESOURCES_LIST, None).await;
        assert_eq!(response.result.unwrap()["resources"], json!([]));

        let response = request(&dispatcher, methods::PROMPTS_LIST, None).await;
        assert_eq!(response.result.unwrap()["prompts"], json!([]));
    }

    #[tokio::test]
    async fn resources_read_without_provider_is_invalid_params() {
        let dispatcher = test_dispatcher();
        initialize(&dispatcher).await;

        let response = request(
            &dispatcher,
            methods::RESOURCES_READ,
            Some(json!({"uri": "file:///x"})),
        )
        .await;
        assert_eq!(response.error.unwrap().code, -32602);
    }

    struct FixtureProvider;

    #[async_trait::async_trait]
    impl crate::providers::ResourceProvider for FixtureProvider {
        async fn list_resources(&self) -> crate::integration::error::McpResult<Vec<crate::protocol::Resource>> {
            Ok(vec![crate::protocol::Resource {
                uri: crate::protocol::Uri::new_unchecked("mem://greeting"),
                name: "greeting".to_string(),
                description: None,
                mime_type: None,
            }])
        }

        async fn read_resource(
            &self,
            uri: &str,
        ) -> crate::integration::error::McpResult<Vec<crate::protocol::Content>> {
            if uri == "mem://greeting" {
                Ok(vec![Content::text("hello")])
            } else {
                Err(McpError::resource_not_found(uri))
            }
        }
    }

    #[async_trait::async_trait]
    impl crate::providers::PromptProvider for FixtureProvider {
        async fn list_prompts(&self) -> crate::integration::error::McpResult<Vec<crate::protocol::Prompt>> {
            Ok(vec![crate::protocol::Prompt {
                name: "greet".to_string(),
                description: None,
                arguments: vec![],
            }])
        }

        async fn get_prompt(
            &self,
            name: &str,
            _arguments: HashMap<String, String>,
        ) -> crate::integration::error::McpResult<crate::protocol::GetPromptResult> {
            if name == "greet" {
                Ok(crate::protocol::GetPromptResult {
                    description: None,
                    messages: vec![crate::protocol::PromptMessage::user(Content::text("hi"))],
                })
            } else {
                Err(McpError::prompt_not_found(name))
            }
        }
    }

    fn provider_dispatcher() -> McpDispatcher {
        McpDispatcher::new(
            ServerConfig::default(),
            Arc::new(ToolRegistry::new()),
            Some(Arc::new(FixtureProvider)),
            Some(Arc::new(FixtureProvider)),
        )
    }

    #[tokio::test]
    async fn providers_show_up_in_capabilities_and_lists() {
        let dispatcher = provider_dispatcher();
        assert!(dispatcher.capabilities().resources.is_some());
        assert!(dispatcher.capabilities().prompts.is_some());
        initialize(&dispatcher).await;

        let response = request(&dispatcher, methods::RESOURCES_LIST, None).await;
        let resources = response.result.unwrap()["resources"].clone();
        assert_eq!(resources[0]["uri"], "mem://greeting");

        let response = request(&dispatcher, methods::PROMPTS_LIST, None).await;
        let prompts = response.result.unwrap()["prompts"].clone();
        assert_eq!(prompts[0]["name"], "greet");
    }

    #[tokio::test]
    async fn resource_read_and_prompt_get_round_trip() {
        let dispatcher = provider_dispatcher();
        initialize(&dispatcher).await;

        let response = request(
            &dispatcher,
            methods::RESOURCES_READ,
            Some(json!({"uri": "mem://greeting"})),
        )
        .await;
        let contents = response.result.unwrap()["contents"].clone();
        assert_eq!(contents[0]["text"], "hello");

        let response = request(
            &dispatcher,
            methods::PROMPTS_GET,
            Some(json!({"name": "greet"})),
        )
        .await;
        let messages = response.result.unwrap()["messages"].clone();
        assert_eq!(messages[0]["role"], "user");
    }

    #[tokio::test]
    async fn provider_lookup_misses_map_to_invalid_params() {
        let dispatcher = provider_dispatcher();
        initialize(&dispatcher).await;

        let response = request(
            &dispatcher,
            methods::RESOURCES_READ,
            Some(json!({"uri": "mem://missing"})),
        )
        .await;
        assert_eq!(response.error.unwrap().code, -32602);

        let response = request(
            &dispatcher,
            methods::PROMPTS_GET,
            Some(json!({"name": "missing"})),
        )
        .await;
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn notifications_produce_no_response() {
        let dispatcher = test_dispatcher();
        initialize(&dispatcher).await;

        let message = JsonRpcMessage::Notification(JsonRpcNotification::new(
            methods::INITIALIZED,
            None,
        ));
        assert!(dispatcher.dispatch(message, SESSION).await.is_none());
    }

    #[tokio::test]
    async fn sessions_are_gated_independently() {
        let dispatcher = test_dispatcher();
        initialize(&dispatcher).await;

        // SESSION is initialized, a different session is not.
        let message = JsonRpcMessage::Request(JsonRpcRequest::new(
            methods::TOOLS_LIST,
            None,
            RequestId::new("9"),
        ));
        let response = match dispatcher.dispatch(message, "other-session").await {
            Some(JsonRpcMessage::Response(response)) => response,
            other => panic!("expected response, got {other:?}"),
        };
        assert_eq!(response.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn ping_answers_after_initialize() {
        let dispatcher = test_dispatcher();
        initialize(&dispatcher).await;

        let response = request(&dispatcher, methods::PING, None).await;
        assert_eq!(response.result.unwrap(), json!({}));
    }
}
