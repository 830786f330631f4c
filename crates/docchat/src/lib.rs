//! docchat: session-scoped document Q&A
//!
//! Users upload documents into a session, the documents are extracted, chunked,
//! embedded and stored in an in-memory vector index owned by that session.
//! Questions against the session are answered by an LLM using only the
//! retrieved chunks, and fall back to "I don't know" when nothing relevant
//! is close enough.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use types::{
    document::{Chunk, Document, FileData, FileType},
    query::{QueryRequest, QueryResponse},
    response::{Answer, ChunkRef, IngestionReport},
};

#[cfg(test)]
pub(crate) mod test_support {
    //! Deterministic providers for unit tests

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::error::{Error, Result};
    use crate::ingestion::{FileParser, TextExtractor};
    use crate::providers::{EmbeddingProvider, LlmProvider};

    /// Embeds text as a normalized byte histogram, so equal texts get equal vectors
    #[derive(Clone)]
    pub struct StubEmbedder {
        dims: usize,
        fixed: HashMap<String, Vec<f32>>,
        failing_on: Option<String>,
        delay: Option<Duration>,
        calls: Arc<AtomicUsize>,
    }

    impl StubEmbedder {
        pub fn new(dims: usize) -> Self {
            Self {
                dims,
                fixed: HashMap::new(),
                failing_on: None,
                delay: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
            self.fixed.insert(text.to_string(), vector);
            self
        }

        /// Fail any batch containing a text with `needle` in it
        pub fn failing_on(mut self, needle: &str) -> Self {
            self.failing_on = Some(needle.to_string());
            self
        }

        /// Sleep before answering each batch
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Number of `embed_batch` calls so far
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn vector_for(&self, text: &str) -> Vec<f32> {
            if let Some(vector) = self.fixed.get(text) {
                return vector.clone();
            }
            let mut vector = vec![0.0f32; self.dims];
            for b in text.bytes() {
                vector[b as usize % self.dims] += 1.0;
            }
            let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                vector.iter_mut().for_each(|x| *x /= norm);
            }
            vector
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(needle) = &self.failing_on {
                if texts.iter().any(|t| t.contains(needle.as_str())) {
                    return Err(Error::EmbeddingUnavailable(format!("refused '{}'", needle)));
                }
            }
            Ok(texts.iter().map(|t| self.vector_for(t)).collect())
        }

        fn dimensions(&self) -> usize {
            self.dims
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    /// LLM returning a fixed reply or a fixed error
    pub struct ScriptedLlm {
        reply: std::result::Result<String, String>,
        delay: Option<Duration>,
        calls: AtomicUsize,
        last_prompt: Mutex<Option<String>>,
    }

    impl ScriptedLlm {
        pub fn answering(text: &str) -> Self {
            Self::scripted(Ok(text.to_string()))
        }

        pub fn failing(message: &str) -> Self {
            Self::scripted(Err(message.to_string()))
        }

        fn scripted(reply: std::result::Result<String, String>) -> Self {
            Self {
                reply,
                delay: None,
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_prompt(&self) -> Option<String> {
            self.last_prompt.lock().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock() = Some(prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply.clone().map_err(Error::GenerationUnavailable)
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(self.reply.is_ok())
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "stub"
        }
    }

    /// File parser with two trapdoors: `corrupt*` fails to parse, `panic*` panics
    pub struct StubExtractor;

    impl TextExtractor for StubExtractor {
        fn extract(&self, filename: &str, data: &[u8]) -> Result<String> {
            if filename.starts_with("corrupt") {
                return Err(Error::parse(filename, "corrupt test file"));
            }
            if filename.starts_with("panic") {
                panic!("extractor panicked on {}", filename);
            }
            FileParser::new().extract(filename, data)
        }
    }
}
