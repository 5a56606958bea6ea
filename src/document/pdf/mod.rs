// PDF adapter
//
// Lines are rebuilt from the extractor's character stream: a vertical jump of more
// than LINE_BREAK_THRESHOLD starts a new line. Output is a fresh page-flowing
// document; original positioning is not kept.

pub mod extractor;
pub mod render;

use std::path::Path;

use tracing::debug;

use crate::error::Result;
use super::{ensure_same_length, DocumentAdapter, Record, RecordKind};

pub use extractor::{CommandPdfExtractor, ExtractedPdf, PdfChar, PdfExtractor, PdfPage};
pub use render::{render_records, sanitize_text};

pub const LINE_BREAK_THRESHOLD: f32 = 5.0;

pub struct PdfDocument {
    records: Vec<Record>,
}

impl PdfDocument {
    pub fn open(path: &Path, extractor: &dyn PdfExtractor) -> Result<Self> {
        let extracted = extractor.extract(path)?;
        Ok(Self::from_pages(&extracted.pages))
    }

    pub fn from_pages(pages: &[PdfPage]) -> Self {
        let mut records = Vec::new();
        for page in pages {
            for (content, font, size) in group_lines(&page.chars) {
                let mut record = Record::paragraph(records.len(), content);
                record.font = Some(font);
                record.size = Some(size);
                records.push(record);
            }
            for table in &page.tables {
                for row in table {
                    for cell in row {
                        let content = cell.clone().unwrap_or_default();
                        records.push(Record::table_cell(records.len(), content));
                    }
                }
            }
        }
        debug!("PDF document: {} records from {} pages", records.len(), pages.len());
        Self { records }
    }

    /// Paragraph lines only, joined by newlines
    pub fn paragraph_text(&self) -> String {
        self.records
            .iter()
            .filter(|r| r.kind == RecordKind::Paragraph)
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Group characters into trimmed-non-empty lines with the first character's font and size
pub fn group_lines(chars: &[PdfChar]) -> Vec<(String, String, f32)> {
    let mut lines = Vec::new();
    let mut current: Vec<&PdfChar> = Vec::new();
    let mut previous_top: Option<f32> = None;

    for ch in chars {
        if let Some(prev) = previous_top {
            if (ch.top - prev).abs() > LINE_BREAK_THRESHOLD {
                flush_line(&current, &mut lines);
                current.clear();
            }
        }
        current.push(ch);
        previous_top = Some(ch.top);
    }
    flush_line(&current, &mut lines);
    lines
}

fn flush_line(chars: &[&PdfChar], lines: &mut Vec<(String, String, f32)>) {
    let Some(first) = chars.first() else { return };
    let content: String = chars.iter().map(|c| c.text.as_str()).collect();
    if content.trim().is_empty() {
        return;
    }
    let font = first
        .fontname
        .clone()
        .unwrap_or_else(|| render::DEFAULT_FONT.to_string());
    let size = first.size.unwrap_or(render::DEFAULT_SIZE);
    lines.push((content, font, size));
}

impl DocumentAdapter for PdfDocument {
    fn content(&self) -> Vec<Record> {
        self.records.clone()
    }

    fn map_translations(&mut self, translated: &[String]) -> Result<()> {
        ensure_same_length(self.records.len(), translated)?;
        let updated: Vec<Record> = self
            .records
            .iter()
            .zip(translated)
            .map(|(record, translation)| {
                let mut record = record.clone();
                let trimmed = translation.trim();
                if !trimmed.is_empty() {
                    record.content = trimmed.to_string();
                }
                record
            })
            .collect();
        self.records = updated;
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        render_records(&self.records, path)
    }
}

/// Render plain lines as default-font paragraphs
pub fn write_paragraphs(lines: &[String], path: &Path) -> Result<()> {
    let records: Vec<Record> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| Record::paragraph(i, line.clone()))
        .collect();
    render_records(&records, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VersoError;

    fn chars(text: &str, top: f32, font: Option<&str>) -> Vec<PdfChar> {
        text.chars()
            .map(|c| PdfChar {
                text: c.to_string(),
                top,
                fontname: font.map(|f| f.to_string()),
                size: font.map(|_| 10.0),
            })
            .collect()
    }

    fn sample_pages() -> Vec<PdfPage> {
        let mut page_chars = chars("Title", 50.0, Some("Times-Bold"));
        page_chars.extend(chars("first line", 70.0, None));
        page_chars.extend(chars("  ", 90.0, None));
        page_chars.extend(chars("same", 92.0, None));
        vec![PdfPage {
            chars: page_chars,
            tables: vec![vec![
                vec![Some("h1".to_string()), None],
                vec![Some("v1".to_string()), Some("v2".to_string())],
            ]],
        }]
    }

    #[test]
    fn test_line_grouping() {
        let lines = group_lines(&sample_pages()[0].chars);
        let contents: Vec<&str> = lines.iter().map(|l| l.0.as_str()).collect();
        assert_eq!(contents, vec!["Title", "first line", "  same"]);
        assert_eq!(lines[0].1, "Times-Bold");
        assert_eq!(lines[0].2, 10.0);
        assert_eq!(lines[1].1, "Arial");
        assert_eq!(lines[1].2, 12.0);
    }

    #[test]
    fn test_paragraphs_then_cells() {
        let doc = PdfDocument::from_pages(&sample_pages());
        let records = doc.content();
        assert_eq!(records.len(), 7);
        assert_eq!(records[3].kind, RecordKind::TableCell);
        assert_eq!(records[4].content, "");
        assert_eq!(doc.paragraph_text(), "Title\nfirst line\n  same");
    }

    #[test]
    fn test_map_translations_covers_cells() {
        let mut doc = PdfDocument::from_pages(&sample_pages());
        let translations: Vec<String> = ["Titre ", "", "même", "e1", "", "", "w2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        doc.map_translations(&translations).unwrap();

        let contents: Vec<String> = doc.content().into_iter().map(|r| r.content).collect();
        assert_eq!(contents, vec!["Titre", "first line", "même", "e1", "", "v1", "w2"]);
        assert_eq!(doc.content()[0].font.as_deref(), Some("Times-Bold"));
    }

    #[test]
    fn test_length_mismatch() {
        let mut doc = PdfDocument::from_pages(&sample_pages());
        let result = doc.map_translations(&["x".to_string()]);
        assert!(matches!(result, Err(VersoError::Document(_))));
        assert_eq!(doc.content()[0].content, "Title");
    }

    #[test]
    fn test_save_renders_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        PdfDocument::from_pages(&sample_pages()).save(&path).unwrap();
        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF"));
    }
}
