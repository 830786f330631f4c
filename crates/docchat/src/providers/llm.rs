//! LLM provider trait for answer generation

use async_trait::async_trait;

use crate::error::Result;

/// Trait for prompt-in, text-out generation
///
/// Failures (timeout, quota, network) surface as `GenerationUnavailable`.
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server
/// - `OpenAiCompatibleLlm`: any `/chat/completions` endpoint (OpenAI, Groq, ...)
/// - `FailoverLlm`: primary provider with a fallback
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate text for a fully built prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
