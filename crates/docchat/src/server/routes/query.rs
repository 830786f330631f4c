//! Question answering endpoint

use axum::{extract::State, Json};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{QueryRequest, QueryResponse};

/// POST /chat/query - Answer a question from a session's documents
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    tracing::info!("Query for session {}: \"{}\"", request.session_id, request.question);
    let response = state.query_engine().query(request).await?;
    Ok(Json(response))
}
