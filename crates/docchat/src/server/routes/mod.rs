//! API routes for the docchat server

pub mod ingest;
pub mod jobs;
pub mod query;
pub mod sessions;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build the `/chat` routes
pub fn chat_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Ingestion - with larger body limit for file uploads
        .route(
            "/index",
            post(ingest::index_documents).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/query", post(query::query))
        // Job management
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/:id", get(jobs::get_job))
        // Session lifecycle
        .route(
            "/sessions/:id",
            get(sessions::session_status).delete(sessions::evict_session),
        )
}
