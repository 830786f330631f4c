//! Error types for the document chat system

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for docchat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Docchat errors
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// File extension has no text extractor
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Text extraction failed for a document
    #[error("Failed to parse file '{filename}': {message}")]
    Parse { filename: String, message: String },

    /// Vector dimensionality differs from the index's established dimensionality
    #[error("Dimension mismatch: index expects {expected}D vectors, got {actual}D")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Chunk and vector counts differ in a batch insert
    #[error("Length mismatch: {chunks} chunks but {vectors} vectors")]
    LengthMismatch { chunks: usize, vectors: usize },

    /// Vector contains NaN or infinite components
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// Malformed query (empty question, k out of range)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Malformed HTTP request (missing files, unreadable multipart body)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Session identifier rejected
    #[error("Invalid session id: {0}")]
    InvalidSession(String),

    /// Embedding capability failed or timed out
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Answer generation capability failed or timed out
    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// Unknown ingestion job
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a parse error
    pub fn parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::GenerationUnavailable(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the caller may retry the same request later.
    ///
    /// Only external capability failures qualify; nothing inside the core retries
    /// on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingUnavailable(_) | Self::GenerationUnavailable(_)
        )
    }

    /// Whether this error only affects the document being processed
    pub fn is_per_document(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::UnsupportedFormat(_))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::Config(_) => (StatusCode::BAD_REQUEST, "config_error"),
            Error::UnsupportedFormat(_) => (StatusCode::BAD_REQUEST, "unsupported_format"),
            Error::Parse { .. } => (StatusCode::BAD_REQUEST, "parse_error"),
            Error::DimensionMismatch { .. } | Error::LengthMismatch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "index_contract_error")
            }
            Error::InvalidVector(_) => (StatusCode::INTERNAL_SERVER_ERROR, "invalid_vector"),
            Error::InvalidQuery(_) => (StatusCode::BAD_REQUEST, "invalid_query"),
            Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Error::InvalidSession(_) => (StatusCode::BAD_REQUEST, "invalid_session"),
            Error::EmbeddingUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "embedding_unavailable")
            }
            Error::GenerationUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "generation_unavailable")
            }
            Error::JobNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
                "retryable": self.is_retryable(),
            }
        }));

        (status, body).into_response()
    }
}
