//! Background ingestion with job queue and progress tracking

mod job_queue;
mod worker;

pub use job_queue::{Job, JobProgress, JobQueue, JobStatus, JobTicket, ProcessingStage, QueueStats};
pub use worker::IngestionWorker;
