//! Provider Seams
//!
//! Traits a server implements to offer resources and prompts. Tools have
//! their own registry in `server::registry`; these two stay trait-shaped
//! because their backing stores vary more (filesystems, databases,
//! templates).

pub mod prompt;
pub mod resource;

pub use prompt::PromptProvider;
pub use resource::ResourceProvider;
