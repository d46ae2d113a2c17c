//! LLM provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Generates answer text from a prompt.
///
/// Calls are fallible and rate-limited; a failed generation surfaces as
/// an error, never as a partial answer.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate text for a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// The model being used
    fn model(&self) -> &str;
}
