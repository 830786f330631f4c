//! Job queue for background ingestion with progress tracking

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::IngestProgress;
use crate::types::{DocumentReport, FileData, IngestionReport};

/// Processing stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Queued,
    Parsing,
    Chunking,
    Embedding,
    Storing,
    Complete,
    Failed,
}

/// Job status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Progress information for a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: Uuid,
    pub session_id: String,
    pub status: JobStatus,
    pub stage: ProcessingStage,
    pub total_files: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    /// Outcomes of finished documents, in completion order
    pub documents: Vec<DocumentReport>,
    /// Chunks appended by the job, once complete
    pub total_chunks: usize,
    /// Set when the whole job failed
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobProgress {
    pub fn new(job_id: Uuid, session_id: impl Into<String>, total_files: usize) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            session_id: session_id.into(),
            status: JobStatus::Pending,
            stage: ProcessingStage::Queued,
            total_files,
            files_processed: 0,
            files_failed: 0,
            documents: Vec::new(),
            total_chunks: 0,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn percent_complete(&self) -> f32 {
        if self.status == JobStatus::Complete {
            return 100.0;
        }
        if self.total_files == 0 {
            return 0.0;
        }
        self.files_processed as f32 / self.total_files as f32 * 100.0
    }
}

/// A queued ingestion job
#[derive(Debug)]
pub struct Job {
    pub id: Uuid,
    pub session_id: String,
    pub files: Vec<FileData>,
    pub(crate) done: oneshot::Sender<Result<IngestionReport>>,
}

/// Handle to a submitted job. Dropping it does not cancel the job.
#[derive(Debug)]
pub struct JobTicket {
    pub job_id: Uuid,
    pub session_id: String,
    receiver: oneshot::Receiver<Result<IngestionReport>>,
}

impl JobTicket {
    /// Wait for the job to finish
    pub async fn wait(self) -> Result<IngestionReport> {
        self.receiver
            .await
            .map_err(|_| Error::internal(format!("job {} was dropped before completing", self.job_id)))?
    }
}

/// Job queue for managing background ingestion
pub struct JobQueue {
    /// Jobs with progress
    jobs: Arc<DashMap<Uuid, JobProgress>>,
    /// Most recent job per session
    latest: DashMap<String, Uuid>,
    /// Channel for sending jobs to the worker
    sender: mpsc::Sender<Job>,
}

impl JobQueue {
    /// Create a queue holding up to `capacity` waiting jobs
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Job>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));

        let queue = Self {
            jobs: Arc::new(DashMap::new()),
            latest: DashMap::new(),
            sender,
        };

        (queue, receiver)
    }

    /// Submit files for ingestion into a session; waits while the queue is full
    pub async fn submit(&self, session_id: &str, files: Vec<FileData>) -> Result<JobTicket> {
        let job_id = Uuid::new_v4();
        let (done, receiver) = oneshot::channel();

        self.jobs
            .insert(job_id, JobProgress::new(job_id, session_id, files.len()));
        self.latest.insert(session_id.to_string(), job_id);

        let job = Job {
            id: job_id,
            session_id: session_id.to_string(),
            files,
            done,
        };
        if let Err(e) = self.sender.send(job).await {
            tracing::error!("Failed to submit job {}: {}", job_id, e);
            self.fail(job_id, "ingestion worker is not running");
            return Err(Error::internal("ingestion worker is not running"));
        }

        tracing::info!("Queued job {} for session {}", job_id, session_id);
        Ok(JobTicket {
            job_id,
            session_id: session_id.to_string(),
            receiver,
        })
    }

    pub fn get_progress(&self, job_id: Uuid) -> Option<JobProgress> {
        self.jobs.get(&job_id).map(|p| p.clone())
    }

    /// Progress of the most recent job submitted for a session
    pub fn session_status(&self, session_id: &str) -> Option<JobProgress> {
        let job_id = *self.latest.get(session_id)?;
        self.get_progress(job_id)
    }

    pub fn list_jobs(&self) -> Vec<JobProgress> {
        self.jobs.iter().map(|p| p.clone()).collect()
    }

    fn update(&self, job_id: Uuid, apply: impl FnOnce(&mut JobProgress)) {
        if let Some(mut progress) = self.jobs.get_mut(&job_id) {
            apply(&mut progress);
            progress.updated_at = Utc::now();
        }
    }

    pub fn mark_started(&self, job_id: Uuid) {
        self.update(job_id, |p| p.status = JobStatus::Processing);
    }

    pub fn update_stage(&self, job_id: Uuid, stage: ProcessingStage) {
        self.update(job_id, |p| p.stage = stage);
    }

    pub fn record_document(&self, job_id: Uuid, report: &DocumentReport) {
        self.update(job_id, |p| {
            p.files_processed += 1;
            if !report.is_success() {
                p.files_failed += 1;
            }
            p.documents.push(report.clone());
        });
    }

    pub fn complete(&self, job_id: Uuid, report: &IngestionReport) {
        self.update(job_id, |p| {
            p.status = JobStatus::Complete;
            p.stage = ProcessingStage::Complete;
            p.total_chunks = report.total_chunks;
        });
    }

    pub fn fail(&self, job_id: Uuid, error: impl ToString) {
        self.update(job_id, |p| {
            p.status = JobStatus::Failed;
            p.stage = ProcessingStage::Failed;
            p.error = Some(error.to_string());
        });
    }

    /// Forget finished jobs last updated more than `max_age` ago
    pub fn prune_finished(&self, max_age: Duration) -> usize {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };
        let cutoff = Utc::now() - max_age;
        let before = self.jobs.len();
        self.jobs
            .retain(|_, p| !(p.status.is_finished() && p.updated_at <= cutoff));
        self.latest.retain(|_, job_id| self.jobs.contains_key(job_id));
        before - self.jobs.len()
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total_jobs: self.jobs.len(),
            ..QueueStats::default()
        };
        for job in self.jobs.iter() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Complete => stats.complete += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub total_jobs: usize,
    pub pending: usize,
    pub processing: usize,
    pub complete: usize,
    pub failed: usize,
}

/// Forwards pipeline progress into the queue's record for one job
pub(crate) struct JobTracker<'a> {
    pub queue: &'a JobQueue,
    pub job_id: Uuid,
}

impl IngestProgress for JobTracker<'_> {
    fn stage(&self, stage: ProcessingStage) {
        self.queue.update_stage(self.job_id, stage);
    }

    fn document_done(&self, report: &DocumentReport) {
        self.queue.record_document(self.job_id, report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FailureStage;

    #[tokio::test]
    async fn test_submit_tracks_progress() {
        let (queue, mut receiver) = JobQueue::new(4);
        let ticket = queue
            .submit("s1", vec![FileData::new("a.txt", b"hello".to_vec())])
            .await
            .unwrap();

        let job = receiver.recv().await.unwrap();
        assert_eq!(job.id, ticket.job_id);
        assert_eq!(job.files.len(), 1);

        let progress = queue.session_status("s1").unwrap();
        assert_eq!(progress.status, JobStatus::Pending);
        assert_eq!(progress.stage, ProcessingStage::Queued);

        queue.mark_started(job.id);
        queue.update_stage(job.id, ProcessingStage::Embedding);
        queue.record_document(job.id, &DocumentReport::indexed("a.txt", 2));
        queue.record_document(
            job.id,
            &DocumentReport::failed("b.pdf", FailureStage::Extraction, "corrupt"),
        );

        let progress = queue.get_progress(job.id).unwrap();
        assert_eq!(progress.status, JobStatus::Processing);
        assert_eq!(progress.files_processed, 2);
        assert_eq!(progress.files_failed, 1);
        assert_eq!(queue.stats().processing, 1);
    }

    #[tokio::test]
    async fn test_ticket_receives_result() {
        let (queue, mut receiver) = JobQueue::new(4);
        let ticket = queue.submit("s1", Vec::new()).await.unwrap();
        let job = receiver.recv().await.unwrap();

        job.done
            .send(Err(Error::embedding("down")))
            .unwrap();
        assert!(matches!(ticket.wait().await, Err(Error::EmbeddingUnavailable(_))));
    }

    #[tokio::test]
    async fn test_dropped_job_and_closed_worker() {
        let (queue, mut receiver) = JobQueue::new(4);
        let ticket = queue.submit("s1", Vec::new()).await.unwrap();
        drop(receiver.recv().await.unwrap());
        assert!(matches!(ticket.wait().await, Err(Error::Internal(_))));

        drop(receiver);
        assert!(queue.submit("s2", Vec::new()).await.is_err());
        assert_eq!(queue.session_status("s2").unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_prune_finished() {
        let (queue, _receiver) = JobQueue::new(4);
        let done = queue.submit("s1", Vec::new()).await.unwrap();
        let running = queue.submit("s2", Vec::new()).await.unwrap();
        queue.fail(done.job_id, "boom");
        queue.mark_started(running.job_id);

        assert_eq!(queue.prune_finished(Duration::ZERO), 1);
        assert!(queue.session_status("s1").is_none());
        assert!(queue.session_status("s2").is_some());
    }
}
