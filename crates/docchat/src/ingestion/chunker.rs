//! Character-window text chunking

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// Sliding-window chunker.
///
/// Windows are `chunk_size` characters long and start every
/// `chunk_size - overlap` characters, so consecutive chunks of one document
/// share exactly `overlap` characters. Only the final chunk may be shorter.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker. Rejects `chunk_size == 0` and `overlap >= chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be > 0".to_string()));
        }
        if overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Split text into `(char_start, char_end, text)` windows
    pub fn split(&self, text: &str) -> Vec<(usize, usize, String)> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut windows = Vec::new();

        let mut start = 0;
        while start < total {
            let end = (start + self.chunk_size).min(total);
            windows.push((start, end, chars[start..end].iter().collect()));
            if end == total {
                break;
            }
            start += self.step();
        }

        windows
    }

    /// Chunk one document. Chunks never span documents.
    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        self.split(&doc.content)
            .into_iter()
            .enumerate()
            .map(|(index, (start, end, content))| {
                Chunk::new(doc.id, doc.filename.clone(), content, index as u32, start, end)
            })
            .collect()
    }
}
