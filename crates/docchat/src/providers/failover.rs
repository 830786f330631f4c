//! Primary/fallback LLM failover

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

use super::llm::LlmProvider;

/// LLM provider that falls back to a second provider when the first fails.
///
/// Failover is a provider concern; the query state machine sees a single
/// `generate` call that either succeeds or fails with `GenerationUnavailable`.
/// The primary is cut off after `primary_deadline` so a hanging primary
/// still leaves time for the fallback.
pub struct FailoverLlm {
    primary: Arc<dyn LlmProvider>,
    fallback: Arc<dyn LlmProvider>,
    primary_deadline: Duration,
}

impl FailoverLlm {
    pub fn new(
        primary: Arc<dyn LlmProvider>,
        fallback: Arc<dyn LlmProvider>,
        primary_deadline: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            primary_deadline,
        }
    }
}

#[async_trait]
impl LlmProvider for FailoverLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let primary_err =
            match tokio::time::timeout(self.primary_deadline, self.primary.generate(prompt)).await {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(e)) => e,
                Err(_) => Error::generation(format!("timed out after {:?}", self.primary_deadline)),
            };

        tracing::warn!(
            "LLM provider '{}' failed ({}), failing over to '{}'",
            self.primary.name(),
            primary_err,
            self.fallback.name()
        );

        self.fallback.generate(prompt).await.map_err(|fallback_err| {
            Error::generation(format!(
                "all providers failed: {}: {}; {}: {}",
                self.primary.name(),
                primary_err,
                self.fallback.name(),
                fallback_err
            ))
        })
    }

    async fn health_check(&self) -> Result<bool> {
        if self.primary.health_check().await.unwrap_or(false) {
            return Ok(true);
        }
        self.fallback.health_check().await
    }

    fn name(&self) -> &str {
        self.primary.name()
    }

    fn model(&self) -> &str {
        self.primary.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedLlm;

    const DEADLINE: Duration = Duration::from_secs(5);

    #[test]
    fn test_primary_success_skips_fallback() {
        let primary = Arc::new(ScriptedLlm::answering("primary answer"));
        let fallback = Arc::new(ScriptedLlm::answering("fallback answer"));
        let llm = FailoverLlm::new(primary.clone(), fallback.clone(), DEADLINE);

        let text = tokio_test::block_on(llm.generate("prompt")).unwrap();
        assert_eq!(text, "primary answer");
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 0);
    }

    #[test]
    fn test_fallback_used_when_primary_fails() {
        let primary = Arc::new(ScriptedLlm::failing("quota exceeded"));
        let fallback = Arc::new(ScriptedLlm::answering("fallback answer"));
        let llm = FailoverLlm::new(primary.clone(), fallback.clone(), DEADLINE);

        let text = tokio_test::block_on(llm.generate("prompt")).unwrap();
        assert_eq!(text, "fallback answer");
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[test]
    fn test_both_failing_is_generation_unavailable() {
        let llm = FailoverLlm::new(
            Arc::new(ScriptedLlm::failing("quota exceeded")),
            Arc::new(ScriptedLlm::failing("connection refused")),
            DEADLINE,
        );

        let err = tokio_test::block_on(llm.generate("prompt")).unwrap_err();
        assert!(matches!(err, Error::GenerationUnavailable(_)));
        let message = err.to_string();
        assert!(message.contains("quota exceeded"));
        assert!(message.contains("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_primary_fails_over_at_its_deadline() {
        let primary = Arc::new(ScriptedLlm::answering("too late").with_delay(Duration::from_secs(600)));
        let fallback = Arc::new(ScriptedLlm::answering("fallback answer"));
        let llm = FailoverLlm::new(primary.clone(), fallback.clone(), DEADLINE);

        let started = tokio::time::Instant::now();
        let text = llm.generate("prompt").await.unwrap();
        assert_eq!(text, "fallback answer");
        assert!(started.elapsed() >= DEADLINE);
        assert!(started.elapsed() < Duration::from_secs(600));
        assert_eq!(fallback.calls(), 1);
    }
}
