//! Resource Provider Trait

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use crate::integration::error::McpResult;
use crate::protocol::{Content, Resource};

/// Source of MCP resources
///
/// A server with no resource provider still answers `resources/list`
/// with an empty collection; `resources/read` against it fails with
/// invalid params.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// List all available resources
    async fn list_resources(&self) -> McpResult<Vec<Resource>>;

    /// Read the contents of one resource by URI
    ///
    /// # Errors
    ///
    /// `McpError::ResourceNotFound` when the URI does not name a known
    /// resource.
    async fn read_resource(&self, uri: &str) -> McpResult<Vec<Content>>;
}
