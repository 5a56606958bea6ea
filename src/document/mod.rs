// Document adapters
//
// A document is flattened into an ordered list of records and, once translated, the
// same-length list of strings is mapped back onto its structure:
// - PlainText: one record per non-empty line
// - Docx: body paragraphs, then table cells row by row
// - Pdf: lines grouped from the character stream, then table cells

pub mod plain;
pub mod docx;
pub mod pdf;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VersoError};

pub use plain::PlainTextDocument;
pub use docx::DocxDocument;
pub use pdf::{CommandPdfExtractor, PdfDocument, PdfExtractor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Paragraph,
    TableCell,
}

/// One flattened unit of translatable content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub content: String,
    pub kind: RecordKind,
    /// Stable ordinal within the flattened document
    pub position: usize,
    /// Layout metadata, PDF only
    pub font: Option<String>,
    pub size: Option<f32>,
}

impl Record {
    pub fn paragraph(position: usize, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: RecordKind::Paragraph,
            position,
            font: None,
            size: None,
        }
    }

    pub fn table_cell(position: usize, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: RecordKind::TableCell,
            position,
            font: None,
            size: None,
        }
    }
}

/// Flatten and re-project a structured document
pub trait DocumentAdapter: Send {
    fn content(&self) -> Vec<Record>;

    /// Overwrite each record with its translation; empty translations keep the original.
    /// Either every slot is applied or, on error, none is.
    fn map_translations(&mut self, translated: &[String]) -> Result<()>;

    fn save(&self, path: &Path) -> Result<()>;
}

/// Length check shared by every adapter before mutation starts
pub fn ensure_same_length(records: usize, translated: &[String]) -> Result<()> {
    if records != translated.len() {
        return Err(VersoError::Document(format!(
            "expected {} translations, got {}",
            records,
            translated.len()
        )));
    }
    Ok(())
}

/// Supported document formats, keyed by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Text,
    Docx,
    Pdf,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "txt" => Ok(Self::Text),
            "docx" => Ok(Self::Docx),
            "pdf" => Ok(Self::Pdf),
            _ => Err(VersoError::UnsupportedFormat(format!(
                "{} (only .txt, .docx and .pdf are supported)",
                path.display()
            ))),
        }
    }

    pub fn is_supported(path: &Path) -> bool {
        Self::from_path(path).is_ok()
    }
}

/// Factory for opening document adapters
pub struct DocumentFactory;

impl DocumentFactory {
    /// Open the structured adapter matching the file extension
    pub fn open(path: &Path, extractor: &dyn PdfExtractor) -> Result<Box<dyn DocumentAdapter>> {
        if !path.exists() {
            return Err(VersoError::FileNotFound(path.display().to_string()));
        }

        match DocumentFormat::from_path(path)? {
            DocumentFormat::Text => Ok(Box::new(PlainTextDocument::open(path)?)),
            DocumentFormat::Docx => Ok(Box::new(DocxDocument::open(path)?)),
            DocumentFormat::Pdf => Ok(Box::new(PdfDocument::open(path, extractor)?)),
        }
    }

    /// Whole text of a document, one line per paragraph
    pub fn read_text(path: &Path, extractor: &dyn PdfExtractor) -> Result<String> {
        if !path.exists() {
            return Err(VersoError::FileNotFound(path.display().to_string()));
        }

        match DocumentFormat::from_path(path)? {
            DocumentFormat::Text => Ok(std::fs::read_to_string(path)?),
            DocumentFormat::Docx => Ok(DocxDocument::open(path)?.paragraph_text()),
            DocumentFormat::Pdf => Ok(PdfDocument::open(path, extractor)?.paragraph_text()),
        }
    }

    /// Write translated lines into a fresh document of the output's format
    pub fn write_lines(lines: &[String], path: &Path) -> Result<()> {
        match DocumentFormat::from_path(path)? {
            DocumentFormat::Text => plain::write_text(lines, path),
            DocumentFormat::Docx => docx::write_paragraphs(lines, path),
            DocumentFormat::Pdf => pdf::write_paragraphs(lines, path),
        }
    }
}

/// Non-empty lines of a text, in order
pub fn non_empty_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a/b.DOCX")).unwrap(), DocumentFormat::Docx);
        assert_eq!(DocumentFormat::from_path(Path::new("b.txt")).unwrap(), DocumentFormat::Text);
        assert_eq!(DocumentFormat::from_path(Path::new("b.pdf")).unwrap(), DocumentFormat::Pdf);
        assert!(matches!(
            DocumentFormat::from_path(Path::new("b.odt")),
            Err(VersoError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_non_empty_lines() {
        assert_eq!(non_empty_lines("a\n\n  \nb\n"), vec!["a", "b"]);
    }

    #[test]
    fn test_ensure_same_length() {
        assert!(ensure_same_length(2, &["a".to_string(), "b".to_string()]).is_ok());
        assert!(matches!(ensure_same_length(3, &[]), Err(VersoError::Document(_))));
    }

    #[test]
    fn test_open_missing_file() {
        let extractor = CommandPdfExtractor::new("pdfchars");
        let result = DocumentFactory::open(Path::new("/nonexistent/file.txt"), &extractor);
        assert!(matches!(result, Err(VersoError::FileNotFound(_))));
    }
}
