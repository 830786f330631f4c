//! Document upload endpoint

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};

use crate::error::{Error, Result};
use crate::retrieval::generate_session_id;
use crate::server::state::AppState;
use crate::types::{FileData, IndexResponse};

/// POST /chat/index - Upload files for background indexing.
///
/// Multipart form: one or more file fields plus an optional `session_id`
/// text field. Returns as soon as the job is queued.
pub async fn index_documents(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<IndexResponse>)> {
    let mut files = Vec::new();
    let mut session_id = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        Error::InvalidRequest(format!("Failed to read multipart field: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();

        if name == "session_id" {
            let value = field.text().await.map_err(|e| {
                Error::InvalidRequest(format!("Failed to read session_id: {}", e))
            })?;
            let value = value.trim();
            if !value.is_empty() {
                session_id = Some(value.to_string());
            }
            continue;
        }

        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            tracing::debug!("Ignoring non-file field '{}'", name);
            continue;
        };

        let data = field.bytes().await.map_err(|e| {
            Error::InvalidRequest(format!("Failed to read file {}: {}", filename, e))
        })?;

        tracing::info!("Received file: {} ({} bytes)", filename, data.len());
        files.push(FileData::new(filename, data.to_vec()));
    }

    if files.is_empty() {
        return Err(Error::InvalidRequest("No files provided".to_string()));
    }

    let session_id = session_id.unwrap_or_else(generate_session_id);
    let files_count = files.len();
    let ticket = state.job_queue().submit(&session_id, files).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(IndexResponse {
            session_id,
            job_id: ticket.job_id,
            total_chunks: 0,
            message: format!(
                "{} file(s) queued for indexing. Use /chat/jobs/{} to check progress.",
                files_count, ticket.job_id
            ),
        }),
    ))
}
