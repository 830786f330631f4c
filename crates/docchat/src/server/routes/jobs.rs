//! Ingestion job endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::processing::{JobProgress, QueueStats};
use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobProgress>,
    pub stats: QueueStats,
}

/// GET /chat/jobs - List known jobs and queue stats
pub async fn list_jobs(State(state): State<AppState>) -> Json<JobListResponse> {
    let mut jobs = state.job_queue().list_jobs();
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(JobListResponse {
        jobs,
        stats: state.job_queue().stats(),
    })
}

/// GET /chat/jobs/:id - Get job progress
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobProgress>> {
    state
        .job_queue()
        .get_progress(job_id)
        .map(Json)
        .ok_or(Error::JobNotFound(job_id))
}
