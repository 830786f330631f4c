//! Document ingestion: text extraction, chunking, and the indexing pipeline

pub mod chunker;
pub mod parser;
pub mod processor;

pub use chunker::TextChunker;
pub use parser::{normalize_text, FileParser, TextExtractor};
pub use processor::{IngestProgress, IngestionPipeline};
