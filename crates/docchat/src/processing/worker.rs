//! Background worker running ingestion jobs

use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

use crate::ingestion::IngestionPipeline;

use super::job_queue::{Job, JobQueue, JobTracker};

/// Pulls jobs off the queue and runs up to `concurrency` of them at once.
///
/// Jobs run detached from the request that submitted them, so an aborted
/// upload request does not stop its ingestion.
pub struct IngestionWorker {
    pipeline: Arc<IngestionPipeline>,
    job_queue: Arc<JobQueue>,
    concurrency: usize,
}

impl IngestionWorker {
    pub fn new(pipeline: Arc<IngestionPipeline>, job_queue: Arc<JobQueue>, concurrency: usize) -> Self {
        Self {
            pipeline,
            job_queue,
            concurrency: concurrency.max(1),
        }
    }

    /// Process jobs until the channel closes.
    ///
    /// The channel's only sender lives in a `JobQueue`. Fed by the queue this
    /// worker holds, the loop runs for the life of the runtime.
    pub async fn run(self, mut receiver: mpsc::Receiver<Job>) {
        tracing::info!("Ingestion worker started: {} concurrent jobs", self.concurrency);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        while let Some(job) = receiver.recv().await {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let pipeline = Arc::clone(&self.pipeline);
            let job_queue = Arc::clone(&self.job_queue);

            tokio::spawn(async move {
                let _permit = permit;
                Self::process(&pipeline, &job_queue, job).await;
            });
        }

        tracing::info!("Ingestion worker stopped");
    }

    async fn process(pipeline: &IngestionPipeline, job_queue: &JobQueue, job: Job) {
        let Job {
            id,
            session_id,
            files,
            done,
        } = job;
        tracing::info!("Processing job {} ({} files, session {})", id, files.len(), session_id);
        job_queue.mark_started(id);

        let tracker = JobTracker {
            queue: job_queue,
            job_id: id,
        };
        let result = pipeline.ingest_tracked(&session_id, files, &tracker).await;

        match &result {
            Ok(report) => {
                job_queue.complete(id, report);
                tracing::info!(
                    "Job {} completed: {} chunks, {} failed document(s)",
                    id,
                    report.total_chunks,
                    report.failed()
                );
            }
            Err(e) => {
                job_queue.fail(id, e);
                tracing::error!("Job {} failed: {}", id, e);
            }
        }

        // The submitter may have stopped waiting
        let _ = done.send(result);
    }
}
