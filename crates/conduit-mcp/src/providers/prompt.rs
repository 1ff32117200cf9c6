//! Prompt Provider Trait

// Layer 1: Standard library imports
use std::collections::HashMap;

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use crate::integration::error::McpResult;
use crate::protocol::{GetPromptResult, Prompt};

/// Source of MCP prompt templates
#[async_trait]
pub trait PromptProvider: Send + Sync {
    /// List all available prompts
    async fn list_prompts(&self) -> McpResult<Vec<Prompt>>;

    /// Render one prompt with the given argument values
    ///
    /// # Errors
    ///
    /// `McpError::PromptNotFound` when the name does not match a known
    /// prompt.
    async fn get_prompt(
        &self,
        name: &str,
        arguments: HashMap<String, String>,
    ) -> McpResult<GetPromptResult>;
}
