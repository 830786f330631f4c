//! Query answering: embed, search, gate, prompt, generate

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::providers::{EmbeddingProvider, LlmProvider};
use crate::types::{Answer, ChunkRef, QueryRequest, QueryResponse};

use super::registry::{validate_session_id, IndexRegistry};

/// Steps of one query, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    EmbedQuery,
    Search,
    Gate,
    BuildPrompt,
    Generate,
    Respond,
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EmbedQuery => "embed_query",
            Self::Search => "search",
            Self::Gate => "gate",
            Self::BuildPrompt => "build_prompt",
            Self::Generate => "generate",
            Self::Respond => "respond",
        };
        f.write_str(name)
    }
}

/// Retrieval and gating parameters
#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub top_k: usize,
    pub max_top_k: usize,
    /// Largest distance the closest hit may have for generation to run
    pub similarity_threshold: f32,
    pub embed_timeout: Duration,
    pub generate_timeout: Duration,
}

impl QuerySettings {
    pub fn from_config(config: &RagConfig) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            max_top_k: config.retrieval.max_top_k,
            similarity_threshold: config.retrieval.similarity_threshold,
            embed_timeout: config.embeddings.deadline(),
            generate_timeout: config.llm.generate_deadline(),
        }
    }
}

/// Answers questions from a session's indexed documents.
///
/// Never calls the LLM unless the closest retrieved chunk is within
/// `similarity_threshold`; otherwise the answer is "I don't know".
/// Dropping the returned future cancels any in-flight provider call.
pub struct QueryEngine {
    registry: Arc<IndexRegistry>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    settings: QuerySettings,
}

impl QueryEngine {
    pub fn new(
        registry: Arc<IndexRegistry>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        settings: QuerySettings,
    ) -> Self {
        Self {
            registry,
            embedder,
            llm,
            settings,
        }
    }

    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    /// Validate a request, answer it and measure latency
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        let started = Instant::now();
        let top_k = request.resolve_top_k(self.settings.top_k, self.settings.max_top_k)?;

        let answer = self.answer(&request.session_id, &request.question, top_k).await?;

        let latency_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "Answered query for session {} in {}ms (grounded: {})",
            request.session_id,
            latency_ms,
            answer.grounded
        );
        Ok(QueryResponse::new(request, top_k, answer, latency_ms))
    }

    /// Run the query state machine with an explicit `top_k`
    pub async fn answer(&self, session_id: &str, question: &str, top_k: usize) -> Result<Answer> {
        validate_session_id(session_id)?;
        if top_k == 0 {
            return Err(Error::InvalidQuery("top_k must be > 0".to_string()));
        }

        // An unknown session is an empty index
        let index = match self.registry.get(session_id) {
            Some(index) if !index.is_empty() => index,
            _ => {
                tracing::debug!(
                    "[{}] session {} has no indexed chunks",
                    QueryStage::Gate,
                    session_id
                );
                return Ok(Answer::unknown());
            }
        };

        let query_vector = bounded(
            QueryStage::EmbedQuery,
            self.settings.embed_timeout,
            self.embedder.embed(question),
            Error::EmbeddingUnavailable,
        )
        .await?;

        let hits = index.search(&query_vector, top_k)?;
        for hit in &hits {
            tracing::debug!(
                "[{}] {}#{} distance {:.4}",
                QueryStage::Search,
                hit.chunk.filename,
                hit.chunk.chunk_index,
                hit.distance
            );
        }

        match hits.first() {
            Some(best) if best.distance <= self.settings.similarity_threshold => {}
            best => {
                tracing::info!(
                    "[{}] no chunk within threshold {} (best: {:?}), answering unknown",
                    QueryStage::Gate,
                    self.settings.similarity_threshold,
                    best.map(|hit| hit.distance)
                );
                return Ok(Answer::unknown());
            }
        }

        let context = PromptBuilder::build_context(&hits);
        let prompt = PromptBuilder::build_context_qa_prompt(question, &context);
        tracing::debug!(
            "[{}] {} chunks, {} context chars",
            QueryStage::BuildPrompt,
            hits.len(),
            context.chars().count()
        );

        let text = bounded(
            QueryStage::Generate,
            self.settings.generate_timeout,
            self.llm.generate(&prompt),
            Error::GenerationUnavailable,
        )
        .await?;

        let text = text.trim();
        if text.is_empty() {
            tracing::warn!(
                "[{}] {} returned an empty answer",
                QueryStage::Respond,
                self.llm.name()
            );
            return Ok(Answer::unknown());
        }

        let supporting = hits
            .iter()
            .map(|hit| ChunkRef::from_chunk(&hit.chunk, hit.distance))
            .collect();
        Ok(Answer::grounded(text.to_string(), supporting))
    }
}

/// Await a provider call with a deadline, normalizing every failure into the
/// stage's `*Unavailable` error
async fn bounded<T, F>(
    stage: QueryStage,
    limit: Duration,
    call: F,
    unavailable: fn(String) -> Error,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err @ (Error::EmbeddingUnavailable(_) | Error::GenerationUnavailable(_)))) => {
            tracing::warn!("[{}] {}", stage, err);
            Err(err)
        }
        Ok(Err(err)) => {
            tracing::warn!("[{}] {}", stage, err);
            Err(unavailable(err.to_string()))
        }
        Err(_) => {
            tracing::warn!("[{}] timed out after {:?}", stage, limit);
            Err(unavailable(format!("{} timed out after {:?}", stage, limit)))
        }
    }
}
