//! Provider trait for text generation backends.
//!
//! The retrying [`GenerationClient`](super::GenerationClient) and the
//! pipeline only ever see `dyn GenerateProvider`, so tests substitute mock
//! providers for the HTTP endpoint.

use async_trait::async_trait;

use crate::Result;

/// One fully rendered prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub model: String,
    /// System prompt (persona and output rules).
    pub system: Option<String>,
    /// User prompt (context, instructions, format).
    pub user: String,
}

/// Provider for single-shot text generation.
///
/// One call is one network request. Implementations do not retry; errors
/// are classified through [`ForgeError::is_transient`](crate::ForgeError::is_transient)
/// and retried by the caller.
#[async_trait]
pub trait GenerateProvider: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &Prompt) -> Result<String>;
}
