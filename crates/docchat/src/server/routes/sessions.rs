//! Session status and teardown endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::processing::JobProgress;
use crate::retrieval::IndexStats;
use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    /// Absent when the session has no index (never used, or evicted)
    pub index: Option<IndexStats>,
    /// Most recent ingestion job for the session
    pub ingestion: Option<JobProgress>,
}

#[derive(Debug, Serialize)]
pub struct EvictResponse {
    pub session_id: String,
    pub evicted: bool,
}

/// GET /chat/sessions/:id - Index stats and latest ingestion status
pub async fn session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<SessionStatusResponse> {
    let index = state.registry().get(&session_id).map(|index| index.stats());
    let ingestion = state.job_queue().session_status(&session_id);
    Json(SessionStatusResponse {
        session_id,
        index,
        ingestion,
    })
}

/// DELETE /chat/sessions/:id - Drop the session's index
pub async fn evict_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<EvictResponse> {
    let evicted = state.registry().evict(&session_id);
    Json(EvictResponse {
        session_id,
        evicted,
    })
}
