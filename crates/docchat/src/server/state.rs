//! Application state for the docchat server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::ingestion::{FileParser, IngestionPipeline, TextExtractor};
use crate::processing::{IngestionWorker, JobQueue};
use crate::providers::{self, EmbeddingProvider, LlmProvider};
use crate::retrieval::{IndexRegistry, QueryEngine, QuerySettings};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    registry: Arc<IndexRegistry>,
    job_queue: Arc<JobQueue>,
    query_engine: QueryEngine,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
}

impl AppState {
    /// Build providers from configuration and start background tasks
    pub fn new(config: RagConfig) -> Result<Self> {
        let embedder = providers::build_embedder(&config.embeddings)?;
        let llm = providers::build_llm(&config.llm)?;
        Self::with_providers(config, embedder, llm, Arc::new(FileParser::new()))
    }

    /// Assemble state around existing providers.
    ///
    /// Spawns the ingestion worker and the session sweeper, so it must be
    /// called inside a Tokio runtime.
    pub fn with_providers(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(IndexRegistry::from_config(&config.sessions)?);
        let pipeline = Arc::new(IngestionPipeline::from_config(
            &config,
            Arc::clone(&registry),
            Arc::clone(&embedder),
            extractor,
        )?);

        let (job_queue, receiver) = JobQueue::new(config.processing.queue_capacity);
        let job_queue = Arc::new(job_queue);
        let worker = IngestionWorker::new(
            pipeline,
            Arc::clone(&job_queue),
            config.processing.worker_count,
        );
        tokio::spawn(worker.run(receiver));

        registry.spawn_sweeper(config.sessions.sweep_interval());
        Self::spawn_job_pruner(&job_queue, &config);

        let query_engine = QueryEngine::new(
            Arc::clone(&registry),
            Arc::clone(&embedder),
            Arc::clone(&llm),
            QuerySettings::from_config(&config),
        );

        tracing::info!(
            "Application state ready (chunk_size {}, overlap {}, top_k {}, threshold {})",
            config.chunking.chunk_size,
            config.chunking.chunk_overlap,
            config.retrieval.top_k,
            config.retrieval.similarity_threshold
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                registry,
                job_queue,
                query_engine,
                embedder,
                llm,
            }),
        })
    }

    /// Finished job records are kept as long as an idle session
    fn spawn_job_pruner(job_queue: &Arc<JobQueue>, config: &RagConfig) {
        let job_queue = Arc::downgrade(job_queue);
        let interval = config.sessions.sweep_interval();
        let max_age = config.sessions.ttl();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(queue) = job_queue.upgrade() else {
                    break;
                };
                let pruned = queue.prune_finished(max_age);
                if pruned > 0 {
                    tracing::debug!("Pruned {} finished job(s)", pruned);
                }
            }
        });
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<IndexRegistry> {
        &self.inner.registry
    }

    pub fn job_queue(&self) -> &Arc<JobQueue> {
        &self.inner.job_queue
    }

    pub fn query_engine(&self) -> &QueryEngine {
        &self.inner.query_engine
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedder
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.llm
    }
}
