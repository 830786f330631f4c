//! Document and chunk types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported file types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Plain text file
    Txt,
    /// Markdown file
    Markdown,
    /// Unknown file type
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "txt" | "text" => Self::Txt,
            "md" | "markdown" => Self::Markdown,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a filename
    pub fn from_filename(filename: &str) -> Self {
        match filename.rsplit_once('.') {
            Some((_, ext)) => Self::from_extension(ext),
            None => Self::Unknown,
        }
    }

    /// Check if text can be extracted from this type
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Get display name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Pdf => "PDF",
            Self::Docx => "Word Document (.docx)",
            Self::Txt => "Text File",
            Self::Markdown => "Markdown",
            Self::Unknown => "Unknown",
        }
    }
}

/// Raw uploaded file awaiting extraction
#[derive(Debug, Clone)]
pub struct FileData {
    pub filename: String,
    pub data: Vec<u8>,
}

impl FileData {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// A document whose text has been extracted and normalized.
///
/// Lives only for the duration of one ingestion call; the session index keeps
/// the derived chunks, never the document itself.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub session_id: String,
    /// Original filename, used as the source identifier
    pub filename: String,
    pub file_type: FileType,
    /// Normalized text
    pub content: String,
}

impl Document {
    pub fn new(
        session_id: impl Into<String>,
        filename: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let filename = filename.into();
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            file_type: FileType::from_filename(&filename),
            filename,
            content: content.into(),
        }
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// A contiguous window of a document's normalized text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    /// Source document
    pub document_id: Uuid,
    /// Source filename
    pub filename: String,
    /// Chunk text
    pub content: String,
    /// Ordinal position within the document
    pub chunk_index: u32,
    /// Character offset of the first character (inclusive)
    pub char_start: usize,
    /// Character offset after the last character (exclusive)
    pub char_end: usize,
}

impl Chunk {
    pub fn new(
        document_id: Uuid,
        filename: impl Into<String>,
        content: impl Into<String>,
        chunk_index: u32,
        char_start: usize,
        char_end: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            filename: filename.into(),
            content: content.into(),
            chunk_index,
            char_start,
            char_end,
        }
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }

    /// Short preview for logs and API responses
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self.content.chars().take(max_chars).collect();
        if self.content.chars().nth(max_chars).is_some() {
            preview.push_str("...");
        }
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_from_filename() {
        assert_eq!(FileType::from_filename("report.PDF"), FileType::Pdf);
        assert_eq!(FileType::from_filename("notes.md"), FileType::Markdown);
        assert_eq!(FileType::from_filename("letter.docx"), FileType::Docx);
        assert_eq!(FileType::from_filename("README"), FileType::Unknown);
        assert!(!FileType::from_filename("archive.zip").is_supported());
    }

    #[test]
    fn test_chunk_preview() {
        let chunk = Chunk::new(Uuid::new_v4(), "a.txt", "héllo wörld", 0, 0, 11);
        assert_eq!(chunk.preview(5), "héllo...");
        assert_eq!(chunk.preview(50), "héllo wörld");
        assert_eq!(chunk.char_len(), 11);
    }
}
