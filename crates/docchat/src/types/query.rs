//! Query request and response types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

use super::response::{Answer, ChunkRef};

/// Shortest question accepted, in characters
pub const MIN_QUESTION_CHARS: usize = 3;

/// Query request for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer
    pub question: String,

    /// Session whose documents answer the question
    pub session_id: String,

    /// Override of the configured number of chunks to retrieve
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl QueryRequest {
    pub fn new(session_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            session_id: session_id.into(),
            top_k: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Validate and resolve the effective `top_k`
    pub fn resolve_top_k(&self, default_top_k: usize, max_top_k: usize) -> Result<usize> {
        if self.question.trim().chars().count() < MIN_QUESTION_CHARS {
            return Err(Error::InvalidQuery(format!(
                "question must be at least {} characters",
                MIN_QUESTION_CHARS
            )));
        }
        match self.top_k {
            None => Ok(default_top_k),
            Some(k) if (1..=max_top_k).contains(&k) => Ok(k),
            Some(k) => Err(Error::InvalidQuery(format!(
                "top_k must be between 1 and {}, got {}",
                max_top_k, k
            ))),
        }
    }
}

/// Query response returned over HTTP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub question: String,
    pub answer: String,
    pub grounded: bool,
    pub session_id: String,
    pub top_k: usize,
    pub sources: Vec<ChunkRef>,
    pub latency_ms: u64,
}

impl QueryResponse {
    pub fn new(request: QueryRequest, top_k: usize, answer: Answer, latency_ms: u64) -> Self {
        Self {
            question: request.question,
            answer: answer.text,
            grounded: answer.grounded,
            session_id: request.session_id,
            top_k,
            sources: answer.supporting_chunks,
            latency_ms,
        }
    }
}

/// Acknowledgment for an accepted ingestion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResponse {
    pub session_id: String,
    pub job_id: Uuid,
    /// Always zero: chunks are counted once the background job finishes
    pub total_chunks: usize,
    pub message: String,
}
