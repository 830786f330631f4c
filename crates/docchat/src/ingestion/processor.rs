//! Ingestion pipeline: extract, chunk, embed, insert

use chrono::Utc;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::processing::ProcessingStage;
use crate::providers::EmbeddingProvider;
use crate::retrieval::registry::validate_session_id;
use crate::retrieval::IndexRegistry;
use crate::types::{Chunk, Document, DocumentReport, FailureStage, FileData, IngestionReport};

use super::chunker::TextChunker;
use super::parser::TextExtractor;

/// Receives progress from a running ingestion
pub trait IngestProgress: Send + Sync {
    fn stage(&self, stage: ProcessingStage);
    fn document_done(&self, report: &DocumentReport);
}

impl IngestProgress for () {
    fn stage(&self, _stage: ProcessingStage) {}
    fn document_done(&self, _report: &DocumentReport) {}
}

/// Where a document stands while the call is in flight
enum Slot {
    Failed(DocumentReport),
    Chunked(Vec<Chunk>),
}

/// Turns uploaded files into entries of a session's vector index.
///
/// A document that fails extraction, chunking or embedding is recorded in the
/// report and skipped; its siblings are still indexed. Index contract
/// violations (`DimensionMismatch`, `LengthMismatch`) fail the whole call.
pub struct IngestionPipeline {
    registry: Arc<IndexRegistry>,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn TextExtractor>,
    chunker: TextChunker,
    batch_size: usize,
    embed_timeout: Duration,
}

impl IngestionPipeline {
    pub fn new(
        registry: Arc<IndexRegistry>,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn TextExtractor>,
        chunker: TextChunker,
        batch_size: usize,
        embed_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            embedder,
            extractor,
            chunker,
            batch_size: batch_size.max(1),
            embed_timeout,
        }
    }

    pub fn from_config(
        config: &RagConfig,
        registry: Arc<IndexRegistry>,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Result<Self> {
        let chunker = TextChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
        Ok(Self::new(
            registry,
            embedder,
            extractor,
            chunker,
            config.embeddings.batch_size,
            config.embeddings.deadline(),
        ))
    }

    /// Ingest files into the session's index
    pub async fn ingest(&self, session_id: &str, files: Vec<FileData>) -> Result<IngestionReport> {
        self.ingest_tracked(session_id, files, &()).await
    }

    /// Ingest files, reporting stages and per-document outcomes as they happen
    pub async fn ingest_tracked(
        &self,
        session_id: &str,
        files: Vec<FileData>,
        progress: &dyn IngestProgress,
    ) -> Result<IngestionReport> {
        validate_session_id(session_id)?;
        let started_at = Utc::now();

        tracing::info!("Ingesting {} file(s) into session {}", files.len(), session_id);

        progress.stage(ProcessingStage::Parsing);
        let documents = self.extract_all(session_id, files).await;

        progress.stage(ProcessingStage::Chunking);
        let mut slots: Vec<(String, Slot)> = documents
            .into_iter()
            .map(|(filename, extracted)| {
                let slot = match extracted {
                    Err(e) => {
                        tracing::warn!("[{}] extraction failed: {}", filename, e);
                        Slot::Failed(DocumentReport::failed(&filename, FailureStage::Extraction, e))
                    }
                    Ok(doc) => {
                        let chunks = self.chunker.chunk_document(&doc);
                        if chunks.is_empty() {
                            Slot::Failed(DocumentReport::failed(
                                &filename,
                                FailureStage::Chunking,
                                "document produced no chunks",
                            ))
                        } else {
                            tracing::debug!("[{}] {} chunks", filename, chunks.len());
                            Slot::Chunked(chunks)
                        }
                    }
                };
                if let Slot::Failed(report) = &slot {
                    progress.document_done(report);
                }
                (filename, slot)
            })
            .collect();

        progress.stage(ProcessingStage::Embedding);
        let vectors = self.embed_all(&mut slots, progress).await;

        progress.stage(ProcessingStage::Storing);
        let mut all_chunks = Vec::new();
        let mut all_vectors = Vec::new();
        let mut reports = Vec::with_capacity(slots.len());
        for ((filename, slot), doc_vectors) in slots.into_iter().zip(vectors) {
            match slot {
                Slot::Failed(report) => reports.push(report),
                Slot::Chunked(chunks) => {
                    reports.push(DocumentReport::indexed(filename, chunks.len()));
                    all_chunks.extend(chunks);
                    all_vectors.extend(doc_vectors);
                }
            }
        }

        // Looked up only now: the session may have been evicted while
        // documents were being embedded
        let index = self.registry.get_or_create(session_id)?;
        let total_chunks = index.insert_batch(all_chunks, all_vectors)?;
        for report in reports.iter().filter(|r| r.is_success()) {
            progress.document_done(report);
        }

        let report = IngestionReport {
            session_id: session_id.to_string(),
            documents: reports,
            total_chunks,
            started_at,
            completed_at: Utc::now(),
        };
        tracing::info!(
            "Session {}: indexed {} chunks from {}/{} document(s)",
            session_id,
            total_chunks,
            report.succeeded(),
            report.documents.len()
        );
        Ok(report)
    }

    /// Extract every file on the blocking pool, preserving input order
    async fn extract_all(
        &self,
        session_id: &str,
        files: Vec<FileData>,
    ) -> Vec<(String, Result<Document>)> {
        let tasks = files.into_iter().map(|file| {
            let extractor = Arc::clone(&self.extractor);
            let filename = file.filename.clone();
            let handle = tokio::task::spawn_blocking(move || {
                extractor.extract(&file.filename, &file.data)
            });
            async move {
                let extracted = match handle.await {
                    Ok(result) => result,
                    Err(join_err) => Err(Error::parse(
                        &filename,
                        format!("extractor aborted: {}", join_err),
                    )),
                };
                (filename, extracted)
            }
        });

        join_all(tasks)
            .await
            .into_iter()
            .map(|(filename, extracted)| {
                let doc = extracted.map(|text| Document::new(session_id, filename.clone(), text));
                (filename, doc)
            })
            .collect()
    }

    /// Embed all chunks of the call in shared batches.
    ///
    /// When a batch fails, each affected document is retried on its own so the
    /// failure lands on the document that caused it. Returns one vector list
    /// per slot; failed slots get an empty list.
    async fn embed_all(
        &self,
        slots: &mut [(String, Slot)],
        progress: &dyn IngestProgress,
    ) -> Vec<Vec<Vec<f32>>> {
        // (slot position, text) for every chunk, in document order
        let work: Vec<(usize, String)> = slots
            .iter()
            .enumerate()
            .filter_map(|(position, (_, slot))| match slot {
                Slot::Chunked(chunks) => Some((position, chunks)),
                Slot::Failed(_) => None,
            })
            .flat_map(|(position, chunks)| {
                chunks.iter().map(move |chunk| (position, chunk.content.clone()))
            })
            .collect();

        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; work.len()];
        let mut retry: BTreeSet<usize> = BTreeSet::new();

        for (batch_no, batch) in work.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
            let offset = batch_no * self.batch_size;
            match self.embed_texts(&texts).await {
                Ok(embedded) => {
                    for (i, vector) in embedded.into_iter().enumerate() {
                        vectors[offset + i] = Some(vector);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Embedding batch {} failed ({}), retrying its documents individually",
                        batch_no,
                        e
                    );
                    retry.extend(batch.iter().map(|(position, _)| *position));
                }
            }
        }

        for position in retry {
            let missing: Vec<usize> = (0..work.len())
                .filter(|&i| work[i].0 == position && vectors[i].is_none())
                .collect();

            let mut failure = None;
            for ids in missing.chunks(self.batch_size) {
                let texts: Vec<String> = ids.iter().map(|&i| work[i].1.clone()).collect();
                match self.embed_texts(&texts).await {
                    Ok(embedded) => {
                        for (&i, vector) in ids.iter().zip(embedded) {
                            vectors[i] = Some(vector);
                        }
                    }
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }

            if let Some(e) = failure {
                let (filename, slot) = &mut slots[position];
                tracing::warn!("[{}] embedding failed: {}", filename, e);
                let report = DocumentReport::failed(filename.as_str(), FailureStage::Embedding, e);
                progress.document_done(&report);
                *slot = Slot::Failed(report);
            }
        }

        let mut per_slot: Vec<Vec<Vec<f32>>> = vec![Vec::new(); slots.len()];
        for ((position, _), vector) in work.into_iter().zip(vectors) {
            if let (Slot::Chunked(_), Some(vector)) = (&slots[position].1, vector) {
                per_slot[position].push(vector);
            }
        }
        per_slot
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let embedded = tokio::time::timeout(self.embed_timeout, self.embedder.embed_batch(texts))
            .await
            .map_err(|_| {
                Error::embedding(format!("embedding timed out after {:?}", self.embed_timeout))
            })??;

        if embedded.len() != texts.len() {
            return Err(Error::embedding(format!(
                "{} returned {} vectors for {} texts",
                self.embedder.name(),
                embedded.len(),
                texts.len()
            )));
        }
        Ok(embedded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StubEmbedder, StubExtractor};
    use crate::types::DocumentOutcome;
    use parking_lot::Mutex;

    fn registry() -> Arc<IndexRegistry> {
        Arc::new(IndexRegistry::new(8, Duration::from_secs(600)).unwrap())
    }

    fn pipeline(registry: &Arc<IndexRegistry>, embedder: StubEmbedder, batch_size: usize) -> IngestionPipeline {
        IngestionPipeline::new(
            Arc::clone(registry),
            Arc::new(embedder),
            Arc::new(StubExtractor),
            TextChunker::new(10, 2).unwrap(),
            batch_size,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_parse_failure_does_not_abort_siblings() {
        let registry = registry();
        let pipeline = pipeline(&registry, StubEmbedder::new(4), 8);

        let report = pipeline
            .ingest(
                "s1",
                vec![
                    FileData::new("corrupt.pdf", b"%PDF-garbage".to_vec()),
                    FileData::new("good.txt", b"The lease ends in June.".to_vec()),
                ],
            )
            .await
            .unwrap();

        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.succeeded(), 1);
        assert!(matches!(
            report.documents[0].outcome,
            DocumentOutcome::Failed { stage: FailureStage::Extraction, .. }
        ));
        assert_eq!(report.documents[1].filename, "good.txt");

        let index = registry.get("s1").unwrap();
        assert_eq!(index.size(), report.total_chunks);
        assert_eq!(index.document_count(), 1);
        let hits = index.search(&[0.0; 4], 100).unwrap();
        assert!(hits.iter().all(|hit| hit.chunk.filename == "good.txt"));
    }

    #[tokio::test]
    async fn test_unsupported_and_panicking_extractors_are_per_document() {
        let registry = registry();
        let pipeline = pipeline(&registry, StubEmbedder::new(4), 8);

        let report = pipeline
            .ingest(
                "s1",
                vec![
                    FileData::new("image.png", vec![0u8; 8]),
                    FileData::new("panic.txt", b"boom".to_vec()),
                    FileData::new("ok.md", b"# Title".to_vec()),
                ],
            )
            .await
            .unwrap();

        let failed: Vec<&str> = report.failures().map(|d| d.filename.as_str()).collect();
        assert_eq!(failed, vec!["image.png", "panic.txt"]);
        assert_eq!(report.succeeded(), 1);
    }

    #[tokio::test]
    async fn test_embedding_is_batched_across_documents() {
        let registry = registry();
        let embedder = StubEmbedder::new(4);
        let pipeline = pipeline(&registry, embedder.clone(), 4);

        // 24 chars at size 10 / overlap 2 -> 3 chunks each
        let report = pipeline
            .ingest(
                "s1",
                vec![
                    FileData::new("a.txt", "a".repeat(24).into_bytes()),
                    FileData::new("b.txt", "b".repeat(24).into_bytes()),
                ],
            )
            .await
            .unwrap();

        assert_eq!(report.total_chunks, 6);
        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_attributed_to_its_document() {
        let registry = registry();
        let embedder = StubEmbedder::new(4).failing_on("poison");
        let pipeline = pipeline(&registry, embedder, 16);

        let report = pipeline
            .ingest(
                "s1",
                vec![
                    FileData::new("clean.txt", b"nothing odd in here".to_vec()),
                    FileData::new("bad.txt", b"poison pill".to_vec()),
                ],
            )
            .await
            .unwrap();

        assert!(report.documents[0].is_success());
        assert!(matches!(
            report.documents[1].outcome,
            DocumentOutcome::Failed { stage: FailureStage::Embedding, .. }
        ));
        let index = registry.get("s1").unwrap();
        assert_eq!(index.size(), report.total_chunks);
        assert_eq!(index.document_count(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_fails_the_call() {
        let registry = registry();
        let index = registry.get_or_create("s1").unwrap();
        let chunk = Chunk::new(uuid::Uuid::new_v4(), "old.txt", "old", 0, 0, 3);
        index.insert_batch(vec![chunk], vec![vec![0.0; 3]]).unwrap();

        let pipeline = pipeline(&registry, StubEmbedder::new(4), 8);
        let err = pipeline
            .ingest("s1", vec![FileData::new("new.txt", b"fresh text".to_vec())])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 4 }));
        assert_eq!(index.size(), 1);
    }

    #[tokio::test]
    async fn test_session_evicted_mid_ingest_keeps_its_chunks() {
        let registry = Arc::new(IndexRegistry::new(1, Duration::from_secs(600)).unwrap());
        let embedder = StubEmbedder::new(4).with_delay(Duration::from_millis(200));
        let pipeline = pipeline(&registry, embedder, 8);
        registry.get_or_create("a").unwrap();

        let ingest = pipeline.ingest(
            "a",
            vec![FileData::new("notes.txt", "n".repeat(24).into_bytes())],
        );
        let crowd_out = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            registry.get_or_create("other").unwrap();
        };
        let (report, ()) = futures::join!(ingest, crowd_out);
        let report = report.unwrap();

        assert_eq!(report.total_chunks, 3);
        let index = registry.get("a").unwrap();
        assert_eq!(index.size(), report.total_chunks);
        assert!(!registry.contains("other"));
    }

    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<ProcessingStage>>,
        done: Mutex<Vec<String>>,
    }

    impl IngestProgress for Recorder {
        fn stage(&self, stage: ProcessingStage) {
            self.stages.lock().push(stage);
        }

        fn document_done(&self, report: &DocumentReport) {
            self.done.lock().push(report.filename.clone());
        }
    }

    #[tokio::test]
    async fn test_progress_reporting() {
        let registry = registry();
        let pipeline = pipeline(&registry, StubEmbedder::new(4), 8);
        let recorder = Recorder::default();

        pipeline
            .ingest_tracked(
                "s1",
                vec![
                    FileData::new("ok.txt", b"some words".to_vec()),
                    FileData::new("corrupt.txt", b"x".to_vec()),
                ],
                &recorder,
            )
            .await
            .unwrap();

        assert_eq!(
            *recorder.stages.lock(),
            vec![
                ProcessingStage::Parsing,
                ProcessingStage::Chunking,
                ProcessingStage::Embedding,
                ProcessingStage::Storing,
            ]
        );
        assert_eq!(*recorder.done.lock(), vec!["corrupt.txt", "ok.txt"]);
    }
}
