//! Core types for the document chat system

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, Document, FileData, FileType};
pub use query::{IndexResponse, QueryRequest, QueryResponse};
pub use response::{
    Answer, ChunkRef, DocumentOutcome, DocumentReport, FailureStage, IngestionReport,
    UNKNOWN_ANSWER,
};
