//! Tool Registry
//!
//! Maps tool name to definition and handler. Registration happens while
//! the server is being assembled and the set of registered tools is
//! frozen once serving starts; the *enabled* subset stays mutable behind
//! a guarded setter so operators can narrow what `tools/list` exposes
//! without rebuilding the server.
//!
//! Names group by prefix: the prefix of `calc_add` is `calc_` (everything
//! up to and including the first underscore), and registration logs the
//! running count per prefix.

// Layer 1: Standard library imports
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

// Layer 3: Internal module imports
use crate::integration::error::{McpError, McpResult};
use crate::protocol::{CallToolResult, Tool};

/// Executable side of a registered tool
///
/// `arguments` is the decoded JSON the client sent, already coerced
/// against the tool's input schema. Returning `Err` does not become a
/// JSON-RPC error: the dispatcher folds it into a result-plane
/// `CallToolResult { is_error: true }`.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute the tool
    async fn call(&self, arguments: Value) -> McpResult<CallToolResult>;
}

/// Adapter turning an async closure into a [`ToolHandler`]
pub struct FnToolHandler<F> {
    function: F,
}

impl<F> FnToolHandler<F> {
    /// Wrap a closure
    pub fn new(function: F) -> Self {
        Self { function }
    }
}

#[async_trait]
impl<F, Fut> ToolHandler for FnToolHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = McpResult<CallToolResult>> + Send,
{
    async fn call(&self, arguments: Value) -> McpResult<CallToolResult> {
        (self.function)(arguments).await
    }
}

struct RegisteredTool {
    tool: Tool,
    handler: Arc<dyn ToolHandler>,
}

/// Registry of tools keyed by unique name
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, RegisteredTool>>,
    enabled: RwLock<HashSet<String>>,
}

/// Prefix of a tool name: everything up to and including the first `_`,
/// or the whole name when it has none.
pub fn tool_prefix(name: &str) -> &str {
    match name.find('_') {
        Some(index) => &name[..=index],
        None => name,
    }
}

impl ToolRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(BTreeMap::new()),
            enabled: RwLock::new(HashSet::new()),
        }
    }

    fn tools_read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, RegisteredTool>> {
        match self.tools.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn enabled_read(&self) -> std::sync::RwLockReadGuard<'_, HashSet<String>> {
        match self.enabled.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register a tool with its handler
    ///
    /// New tools start enabled. Logs the per-prefix registration count.
    ///
    /// # Errors
    ///
    /// `McpError::InvalidRequest` when the name is already taken.
    pub fn register(&self, tool: Tool, handler: Arc<dyn ToolHandler>) -> McpResult<()> {
        let name = tool.name.clone();

        let mut tools = match self.tools.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if tools.contains_key(&name) {
            return Err(McpError::invalid_request(format!(
                "tool '{name}' is already registered"
            )));
        }

        tools.insert(name.clone(), RegisteredTool { tool, handler });

        let prefix = tool_prefix(&name).to_string();
        let prefix_count = tools
            .keys()
            .filter(|registered| tool_prefix(registered) == prefix)
            .count();
        drop(tools);

        match self.enabled.write() {
            Ok(mut guard) => {
                guard.insert(name.clone());
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(name.clone());
            }
        }

        info!(tool = %name, prefix = %prefix, prefix_count, "tool registered");
        Ok(())
    }

    /// All registered tool definitions, enabled or not
    pub fn all(&self) -> Vec<Tool> {
        self.tools_read()
            .values()
            .map(|registered| registered.tool.clone())
            .collect()
    }

    /// Tool definitions currently enabled
    pub fn enabled(&self) -> Vec<Tool> {
        let enabled = self.enabled_read();
        self.tools_read()
            .values()
            .filter(|registered| enabled.contains(&registered.tool.name))
            .map(|registered| registered.tool.clone())
            .collect()
    }

    /// Replace the enabled subset
    ///
    /// Unknown names are ignored so `enabled ⊆ all` always holds; passing
    /// the same set twice yields the same result.
    pub fn set_enabled(&self, names: impl IntoIterator<Item = impl Into<String>>) {
        let tools = self.tools_read();
        let next: HashSet<String> = names
            .into_iter()
            .map(Into::into)
            .filter(|name| tools.contains_key(name))
            .collect();
        drop(tools);

        debug!(enabled = next.len(), "tool enabled-set replaced");
        match self.enabled.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Look up an enabled tool by name
    ///
    /// Disabled and unknown tools both come back as `None`; callers
    /// cannot invoke what `tools/list` does not show.
    pub fn get_by_name(&self, name: &str) -> Option<(Tool, Arc<dyn ToolHandler>)> {
        if !self.enabled_read().contains(name) {
            return None;
        }
        self.tools_read()
            .get(name)
            .map(|registered| (registered.tool.clone(), Arc::clone(&registered.handler)))
    }

    /// All registered tools sharing a prefix group
    pub fn get_by_prefix(&self, prefix: &str) -> Vec<Tool> {
        self.tools_read()
            .values()
            .filter(|registered| tool_prefix(&registered.tool.name) == prefix)
            .map(|registered| registered.tool.clone())
            .collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools_read().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools_read().is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
