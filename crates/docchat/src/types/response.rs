//! Answer and ingestion report types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::Chunk;

/// Text returned whenever retrieved context cannot support an answer
pub const UNKNOWN_ANSWER: &str = "I don't know";

/// Reference to a chunk that supported an answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRef {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub filename: String,
    pub chunk_index: u32,
    /// L2 distance to the query (smaller is closer)
    pub distance: f32,
    /// Start of the chunk text
    pub snippet: String,
}

impl ChunkRef {
    pub fn from_chunk(chunk: &Chunk, distance: f32) -> Self {
        Self {
            chunk_id: chunk.id,
            document_id: chunk.document_id,
            filename: chunk.filename.clone(),
            chunk_index: chunk.chunk_index,
            distance,
            snippet: chunk.preview(200),
        }
    }
}

/// Generated answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// Chunks the prompt was built from, closest first
    pub supporting_chunks: Vec<ChunkRef>,
    /// True only when the text came from generation over retrieved context
    pub grounded: bool,
}

impl Answer {
    /// The canned response for queries the documents cannot answer
    pub fn unknown() -> Self {
        Self {
            text: UNKNOWN_ANSWER.to_string(),
            supporting_chunks: Vec::new(),
            grounded: false,
        }
    }

    pub fn grounded(text: String, supporting_chunks: Vec<ChunkRef>) -> Self {
        Self {
            text,
            supporting_chunks,
            grounded: true,
        }
    }
}

/// Pipeline stage a document failed in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Extraction,
    Chunking,
    Embedding,
}

/// What happened to one document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    /// Chunks appended to the session index
    Indexed { chunks: usize },
    /// Nothing appended
    Failed { stage: FailureStage, error: String },
}

/// Per-document entry in an ingestion report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub filename: String,
    #[serde(flatten)]
    pub outcome: DocumentOutcome,
}

impl DocumentReport {
    pub fn indexed(filename: impl Into<String>, chunks: usize) -> Self {
        Self {
            filename: filename.into(),
            outcome: DocumentOutcome::Indexed { chunks },
        }
    }

    pub fn failed(filename: impl Into<String>, stage: FailureStage, error: impl ToString) -> Self {
        Self {
            filename: filename.into(),
            outcome: DocumentOutcome::Failed {
                stage,
                error: error.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DocumentOutcome::Indexed { .. })
    }
}

/// Result of one ingestion call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub session_id: String,
    /// One entry per input document, in input order
    pub documents: Vec<DocumentReport>,
    /// Chunks appended to the index by this call
    pub total_chunks: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl IngestionReport {
    pub fn succeeded(&self) -> usize {
        self.documents.iter().filter(|d| d.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.documents.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DocumentReport> {
        self.documents.iter().filter(|d| !d.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_answer_is_ungrounded() {
        let answer = Answer::unknown();
        assert_eq!(answer.text, UNKNOWN_ANSWER);
        assert!(!answer.grounded);
        assert!(answer.supporting_chunks.is_empty());
    }

    #[test]
    fn test_document_report_serialization() {
        let report = DocumentReport::failed("bad.pdf", FailureStage::Extraction, "corrupt xref");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["filename"], "bad.pdf");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["stage"], "extraction");

        let json = serde_json::to_value(DocumentReport::indexed("ok.txt", 3)).unwrap();
        assert_eq!(json["status"], "indexed");
        assert_eq!(json["chunks"], 3);
    }
}
