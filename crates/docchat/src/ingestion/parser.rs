//! Text extraction for uploaded files

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::types::FileType;

/// Turns raw file bytes into normalized text.
///
/// Implementations are synchronous; the ingestion pipeline runs them on the
/// blocking thread pool.
pub trait TextExtractor: Send + Sync {
    /// Extract normalized text, failing with `UnsupportedFormat` or `Parse`
    fn extract(&self, filename: &str, data: &[u8]) -> Result<String>;
}

/// Extractor for PDF, DOCX, plain text and Markdown
#[derive(Debug, Clone, Copy, Default)]
pub struct FileParser;

impl FileParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_pdf(filename: &str, data: &[u8]) -> Result<String> {
        pdf_extract::extract_text_from_mem(data)
            .map_err(|e| Error::parse(filename, e.to_string()))
    }

    fn parse_docx(filename: &str, data: &[u8]) -> Result<String> {
        let doc = docx_rs::read_docx(data).map_err(|e| Error::parse(filename, e.to_string()))?;

        let mut content = String::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                content.push_str(&t.text);
                            }
                        }
                    }
                }
                content.push('\n');
            }
        }

        Ok(content)
    }

    fn parse_text(data: &[u8]) -> String {
        String::from_utf8_lossy(data).into_owned()
    }
}

impl TextExtractor for FileParser {
    fn extract(&self, filename: &str, data: &[u8]) -> Result<String> {
        let file_type = FileType::from_filename(filename);

        let raw = match file_type {
            FileType::Pdf => Self::parse_pdf(filename, data)?,
            FileType::Docx => Self::parse_docx(filename, data)?,
            FileType::Txt | FileType::Markdown => Self::parse_text(data),
            FileType::Unknown => {
                let extension = filename.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
                return Err(Error::UnsupportedFormat(format!(
                    "'{}' ({})",
                    filename,
                    if extension.is_empty() { "no extension" } else { extension }
                )));
            }
        };

        let content = normalize_text(&raw);
        if content.trim().is_empty() {
            return Err(Error::parse(filename, "no text content could be extracted"));
        }

        tracing::debug!(
            "Extracted {} chars from {} ({})",
            content.chars().count(),
            filename,
            file_type.display_name()
        );
        Ok(content)
    }
}

fn blank_run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n{3,}").expect("valid blank-line pattern"))
}

/// Normalize extracted text: drop NUL bytes, unify line endings, strip
/// trailing whitespace per line and collapse runs of blank lines.
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace('\0', "").replace("\r\n", "\n").replace('\r', "\n");
    let trimmed = unified
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    blank_run_pattern()
        .replace_all(trimmed.trim(), "\n\n")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        let raw = "Title\r\n\r\n\r\n\r\nBody line   \n\0more\n\n\n";
        assert_eq!(normalize_text(raw), "Title\n\nBody line\nmore");
    }

    #[test]
    fn test_extract_plain_text() {
        let parser = FileParser::new();
        let text = parser.extract("notes.txt", b"hello\r\nworld  \n").unwrap();
        assert_eq!(text, "hello\nworld");

        let md = parser.extract("README.md", b"# Heading\n\nBody").unwrap();
        assert_eq!(md, "# Heading\n\nBody");
    }

    #[test]
    fn test_unsupported_extension() {
        let parser = FileParser::new();
        assert!(matches!(
            parser.extract("photo.png", b"\x89PNG"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(matches!(
            parser.extract("Makefile", b"all:"),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_empty_text_is_parse_error() {
        let parser = FileParser::new();
        assert!(matches!(
            parser.extract("blank.txt", b"  \n\n \r\n"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_corrupt_docx_is_parse_error() {
        let parser = FileParser::new();
        let err = parser.extract("broken.docx", b"not a zip archive").unwrap_err();
        assert!(err.is_per_document());
        assert!(matches!(err, Error::Parse { ref filename, .. } if filename == "broken.docx"));
    }
}
