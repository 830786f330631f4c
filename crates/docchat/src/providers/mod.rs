//! Capability providers for embeddings and answer generation
//!
//! Trait-based abstractions so the pipeline and the query engine never depend
//! on a concrete backend. Builders turn configuration into trait objects.

pub mod embedding;
pub mod failover;
pub mod llm;
pub mod ollama;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmbeddingConfig, LlmConfig, ProviderConfig, ProviderKind};
use crate::error::Result;

pub use embedding::EmbeddingProvider;
pub use failover::FailoverLlm;
pub use llm::LlmProvider;
pub use ollama::{OllamaEmbedder, OllamaLlm};
pub use openai::OpenAiCompatibleLlm;

/// Build the embedding provider shared by ingestion and queries
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    tracing::info!(
        "Embedding provider: ollama ({}, {}D)",
        config.model,
        config.dimensions
    );
    Ok(Arc::new(OllamaEmbedder::new(config)?))
}

/// Build one generation provider
pub fn build_llm_provider(
    config: &ProviderConfig,
    timeout: Duration,
) -> Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match config.kind {
        ProviderKind::Ollama => Arc::new(OllamaLlm::new(config, timeout)?),
        ProviderKind::OpenaiCompatible => Arc::new(OpenAiCompatibleLlm::new(config, timeout)?),
    };
    Ok(provider)
}

/// Build the generation provider, wrapped in failover when a fallback is configured
pub fn build_llm(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    let primary = build_llm_provider(&config.primary, config.timeout())?;

    match &config.fallback {
        Some(fallback) => {
            tracing::info!(
                "LLM provider: {} ({}), fallback {} ({})",
                config.primary.name,
                config.primary.model,
                fallback.name,
                fallback.model
            );
            let fallback = build_llm_provider(fallback, config.timeout())?;
            Ok(Arc::new(FailoverLlm::new(
                primary,
                fallback,
                config.provider_deadline(&config.primary),
            )))
        }
        None => {
            tracing::info!(
                "LLM provider: {} ({})",
                config.primary.name,
                config.primary.model
            );
            Ok(primary)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_llm_with_fallback() {
        let mut config = LlmConfig::default();
        config.fallback = Some(ProviderConfig {
            name: "groq".to_string(),
            kind: ProviderKind::OpenaiCompatible,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            ..ProviderConfig::default()
        });

        let llm = build_llm(&config).unwrap();
        assert_eq!(llm.name(), "ollama");
        assert_eq!(llm.model(), "llama3.2:3b");
    }

    #[test]
    fn test_build_embedder_dimensions() {
        let embedder = build_embedder(&EmbeddingConfig::default()).unwrap();
        assert_eq!(embedder.dimensions(), 768);
        assert_eq!(embedder.name(), "ollama");
    }
}
