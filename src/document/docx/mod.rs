// Structured docx adapter
//
// word/document.xml is held as an event list. Body-level paragraphs come first, then
// the cells of body-level tables, table by table and row by row. A replaced paragraph
// keeps its paragraph properties and the first run's properties.

pub mod package;
pub mod xml;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::debug;

use crate::error::{Result, VersoError};
use super::{ensure_same_length, DocumentAdapter, Record};
use package::{DocxPackage, DOCUMENT_PART};
use xml::{parse_xml, write_xml, XmlEvent};

/// Inclusive event range of one `w:p` element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Paragraph(Span),
    Cell(Vec<Span>),
}

pub struct DocxDocument {
    package: DocxPackage,
    events: Vec<XmlEvent>,
    slots: Vec<Slot>,
}

impl DocxDocument {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_package(DocxPackage::read(path)?)
    }

    pub fn from_package(package: DocxPackage) -> Result<Self> {
        let events = parse_xml(package.part(DOCUMENT_PART)?)?;
        let slots = scan_slots(&events)?;
        debug!("Docx document: {} paragraphs and cells", slots.len());
        Ok(Self {
            package,
            events,
            slots,
        })
    }

    /// Body paragraphs joined by newlines, tables excluded
    pub fn paragraph_text(&self) -> String {
        self.slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Paragraph(span) => Some(span_text(&self.events, *span)),
                Slot::Cell(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl DocumentAdapter for DocxDocument {
    fn content(&self) -> Vec<Record> {
        self.slots
            .iter()
            .enumerate()
            .map(|(position, slot)| match slot {
                Slot::Paragraph(span) => Record::paragraph(position, span_text(&self.events, *span)),
                Slot::Cell(spans) => {
                    let text = spans
                        .iter()
                        .map(|span| span_text(&self.events, *span))
                        .collect::<Vec<_>>()
                        .join("\n");
                    Record::table_cell(position, text)
                }
            })
            .collect()
    }

    fn map_translations(&mut self, translated: &[String]) -> Result<()> {
        ensure_same_length(self.slots.len(), translated)?;

        // start index -> (end index, replacement events)
        let mut edits: BTreeMap<usize, (usize, Vec<XmlEvent>)> = BTreeMap::new();
        for (slot, translation) in self.slots.iter().zip(translated) {
            if translation.is_empty() {
                continue;
            }
            match slot {
                Slot::Paragraph(span) => {
                    edits.insert(span.start, (span.end, rewrite_paragraph(&self.events, *span, translation)));
                }
                Slot::Cell(spans) => {
                    if let Some((first, rest)) = spans.split_first() {
                        edits.insert(first.start, (first.end, rewrite_paragraph(&self.events, *first, translation)));
                        for span in rest {
                            edits.insert(span.start, (span.end, Vec::new()));
                        }
                    }
                }
            }
        }

        let mut events = Vec::with_capacity(self.events.len());
        let mut i = 0;
        while i < self.events.len() {
            match edits.remove(&i) {
                Some((end, replacement)) => {
                    events.extend(replacement);
                    i = end + 1;
                }
                None => {
                    events.push(self.events[i].clone());
                    i += 1;
                }
            }
        }

        let slots = scan_slots(&events)?;
        if slots.len() != self.slots.len() {
            return Err(VersoError::Document(format!(
                "document structure changed while mapping translations ({} -> {} slots)",
                self.slots.len(),
                slots.len()
            )));
        }

        self.events = events;
        self.slots = slots;
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        let mut replacements = HashMap::new();
        replacements.insert(DOCUMENT_PART.to_string(), write_xml(&self.events)?);
        self.package.write_with_replacements(path, &replacements)
    }
}

/// Locate body paragraphs and top-level table cells
fn scan_slots(events: &[XmlEvent]) -> Result<Vec<Slot>> {
    let mut paragraphs = Vec::new();
    let mut cells: Vec<Vec<Span>> = Vec::new();

    // (element name, start index)
    let mut stack: Vec<(&str, usize)> = Vec::new();
    let mut body_depth: Option<usize> = None;

    for (idx, ev) in events.iter().enumerate() {
        match ev {
            XmlEvent::Start { name, .. } => {
                if name == "w:body" {
                    body_depth = Some(stack.len());
                }
                if name == "w:tc" && is_top_level_cell(&stack, body_depth) {
                    cells.push(Vec::new());
                }
                stack.push((name.as_str(), idx));
            }
            XmlEvent::Empty { name, .. } if name == "w:p" => {
                classify_paragraph(&stack, body_depth, Span { start: idx, end: idx }, &mut paragraphs, &mut cells);
            }
            XmlEvent::End { name } => {
                let (open, start) = stack
                    .pop()
                    .ok_or_else(|| VersoError::Document(format!("unbalanced </{}> in document", name)))?;
                if open != name {
                    return Err(VersoError::Document(format!(
                        "mismatched </{}>, expected </{}>",
                        name, open
                    )));
                }
                if name == "w:p" {
                    classify_paragraph(&stack, body_depth, Span { start, end: idx }, &mut paragraphs, &mut cells);
                }
            }
            _ => {}
        }
    }

    let mut slots: Vec<Slot> = paragraphs.into_iter().map(Slot::Paragraph).collect();
    slots.extend(cells.into_iter().map(Slot::Cell));
    Ok(slots)
}

fn is_top_level_cell(stack: &[(&str, usize)], body_depth: Option<usize>) -> bool {
    match body_depth {
        Some(depth) => {
            stack.len() == depth + 3
                && stack[depth].0 == "w:body"
                && stack[depth + 1].0 == "w:tbl"
                && stack[depth + 2].0 == "w:tr"
        }
        None => false,
    }
}

/// `stack` holds the ancestors of the paragraph
fn classify_paragraph(
    stack: &[(&str, usize)],
    body_depth: Option<usize>,
    span: Span,
    paragraphs: &mut Vec<Span>,
    cells: &mut [Vec<Span>],
) {
    let Some(depth) = body_depth else { return };

    if stack.len() == depth + 1 && stack[depth].0 == "w:body" {
        paragraphs.push(span);
    } else if stack.len() == depth + 4 && stack[depth + 3].0 == "w:tc" && is_top_level_cell(&stack[..depth + 3], body_depth) {
        if let Some(cell) = cells.last_mut() {
            cell.push(span);
        }
    }
}

/// Visible text of a paragraph: `w:t` content, tabs and breaks
fn span_text(events: &[XmlEvent], span: Span) -> String {
    let mut text = String::new();
    let mut in_text = false;
    for ev in &events[span.start..=span.end] {
        match ev {
            XmlEvent::Start { name, .. } if name == "w:t" => in_text = true,
            XmlEvent::End { name } if name == "w:t" => in_text = false,
            XmlEvent::Text { text: t } if in_text => text.push_str(t),
            XmlEvent::CData { text: t } if in_text => text.push_str(t),
            XmlEvent::Empty { name, .. } if name == "w:tab" => text.push('\t'),
            XmlEvent::Empty { name, .. } if name == "w:br" || name == "w:cr" => text.push('\n'),
            _ => {}
        }
    }
    text
}

/// Events of the first direct child element named `tag`, including its end
fn child_element(events: &[XmlEvent], span: Span, tag: &str) -> Vec<XmlEvent> {
    let mut depth = 0usize;
    let mut idx = span.start + 1;
    while idx < span.end {
        let ev = &events[idx];
        match ev {
            XmlEvent::Empty { name, .. } if depth == 0 && name == tag => return vec![ev.clone()],
            XmlEvent::Start { name, .. } => {
                if depth == 0 && name == tag {
                    let mut nested = 0usize;
                    let mut out = Vec::new();
                    for inner in &events[idx..span.end] {
                        match inner {
                            XmlEvent::Start { .. } => nested += 1,
                            XmlEvent::End { .. } => nested -= 1,
                            _ => {}
                        }
                        out.push(inner.clone());
                        if nested == 0 {
                            return out;
                        }
                    }
                    return out;
                }
                depth += 1;
            }
            XmlEvent::End { .. } => depth = depth.saturating_sub(1),
            _ => {}
        }
        idx += 1;
    }
    Vec::new()
}

/// First `w:r` anywhere in the paragraph, as a span
fn first_run(events: &[XmlEvent], span: Span) -> Option<Span> {
    let start = (span.start..=span.end).find(|&i| events[i].is_start("w:r"))?;
    let mut nested = 0usize;
    for (offset, ev) in events[start..=span.end].iter().enumerate() {
        match ev {
            XmlEvent::Start { .. } => nested += 1,
            XmlEvent::End { .. } => {
                nested -= 1;
                if nested == 0 {
                    return Some(Span { start, end: start + offset });
                }
            }
            _ => {}
        }
    }
    None
}

/// Paragraph carrying `text` in a single run
fn rewrite_paragraph(events: &[XmlEvent], span: Span, text: &str) -> Vec<XmlEvent> {
    let attrs = match &events[span.start] {
        XmlEvent::Start { attrs, .. } | XmlEvent::Empty { attrs, .. } => attrs.clone(),
        _ => Vec::new(),
    };

    let mut out = vec![XmlEvent::start("w:p", attrs)];
    if span.start != span.end {
        out.extend(child_element(events, span, "w:pPr"));
    }

    out.push(XmlEvent::start("w:r", Vec::new()));
    if let Some(run) = first_run(events, span) {
        out.extend(child_element(events, run, "w:rPr"));
    }
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push(XmlEvent::empty("w:br"));
        }
        if !line.is_empty() {
            out.push(XmlEvent::start(
                "w:t",
                vec![("xml:space".to_string(), "preserve".to_string())],
            ));
            out.push(XmlEvent::text(line));
            out.push(XmlEvent::end("w:t"));
        }
    }
    out.push(XmlEvent::end("w:r"));
    out.push(XmlEvent::end("w:p"));
    out
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Document XML with one paragraph per entry
pub fn document_xml(paragraphs: &[String]) -> Result<Vec<u8>> {
    let mut events = vec![
        XmlEvent::Decl {
            version: "1.0".to_string(),
            encoding: Some("UTF-8".to_string()),
            standalone: Some("yes".to_string()),
        },
        XmlEvent::start("w:document", vec![("xmlns:w".to_string(), W_NS.to_string())]),
        XmlEvent::start("w:body", Vec::new()),
    ];
    for paragraph in paragraphs {
        events.push(XmlEvent::start("w:p", Vec::new()));
        if !paragraph.is_empty() {
            events.push(XmlEvent::start("w:r", Vec::new()));
            events.push(XmlEvent::start(
                "w:t",
                vec![("xml:space".to_string(), "preserve".to_string())],
            ));
            events.push(XmlEvent::text(paragraph));
            events.push(XmlEvent::end("w:t"));
            events.push(XmlEvent::end("w:r"));
        }
        events.push(XmlEvent::end("w:p"));
    }
    events.push(XmlEvent::end("w:body"));
    events.push(XmlEvent::end("w:document"));
    write_xml(&events)
}

/// Fresh docx with one paragraph per line
pub fn write_paragraphs(lines: &[String], path: &Path) -> Result<()> {
    let package = DocxPackage::from_parts(vec![
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes().to_vec()),
        ("_rels/.rels", ROOT_RELS.as_bytes().to_vec()),
        (DOCUMENT_PART, document_xml(lines)?),
    ]);
    package.write_with_replacements(path, &HashMap::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
        r#"<w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t>Annual </w:t></w:r><w:r><w:t>report</w:t></w:r></w:p>"#,
        r#"<w:p/>"#,
        r#"<w:p><w:r><w:t>Closing</w:t><w:tab/><w:t>words</w:t></w:r></w:p>"#,
        r#"<w:tbl><w:tblPr/>"#,
        r#"<w:tr><w:tc><w:tcPr/><w:p><w:r><w:t>A1</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>B1</w:t></w:r></w:p><w:p><w:r><w:t>more</w:t></w:r></w:p></w:tc></w:tr>"#,
        r#"<w:tr><w:tc><w:p><w:r><w:t>A2</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>B2</w:t></w:r></w:p></w:tc></w:tr>"#,
        r#"</w:tbl><w:sectPr/></w:body></w:document>"#
    );

    fn sample_document() -> DocxDocument {
        let package = DocxPackage::from_parts(vec![
            ("[Content_Types].xml", CONTENT_TYPES.as_bytes().to_vec()),
            ("_rels/.rels", ROOT_RELS.as_bytes().to_vec()),
            (DOCUMENT_PART, SAMPLE.as_bytes().to_vec()),
        ]);
        DocxDocument::from_package(package).unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_paragraphs_then_cells() {
        let records = sample_document().content();
        let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["Annual report", "", "Closing\twords", "A1", "B1\nmore", "A2", "B2"]
        );
        assert_eq!(records[2].kind, super::super::RecordKind::Paragraph);
        assert_eq!(records[3].kind, super::super::RecordKind::TableCell);
        assert_eq!(records[6].position, 6);
    }

    #[test]
    fn test_map_translations_overwrites_in_place() {
        let mut doc = sample_document();
        doc.map_translations(&strings(&["Rapport annuel", "", "", "a1", "b1", "", "b2"]))
            .unwrap();

        let contents: Vec<String> = doc.content().into_iter().map(|r| r.content).collect();
        assert_eq!(
            contents,
            strings(&["Rapport annuel", "", "Closing\twords", "a1", "b1", "A2", "b2"])
        );

        let xml = String::from_utf8(write_xml(&doc.events).unwrap()).unwrap();
        assert!(xml.contains(r#"<w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Rapport annuel</w:t></w:r>"#));
        assert!(xml.contains("<w:tcPr/>"));
        assert!(!xml.contains("more"));
    }

    #[test]
    fn test_newlines_become_breaks() {
        let mut doc = sample_document();
        doc.map_translations(&strings(&["", "", "", "", "x\ny", "", ""])).unwrap();
        assert_eq!(doc.content()[4].content, "x\ny");
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let mut doc = sample_document();
        let before = doc.content();
        assert!(doc.map_translations(&strings(&["only one"])).is_err());
        assert_eq!(doc.content(), before);
    }

    #[test]
    fn test_paragraph_text_skips_tables() {
        assert_eq!(sample_document().paragraph_text(), "Annual report\n\nClosing\twords");
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("translated.docx");

        let mut doc = sample_document();
        doc.map_translations(&strings(&["Un", "Deux", "Trois", "c1", "c2", "c3", "c4"]))
            .unwrap();
        doc.save(&path).unwrap();

        let reopened = DocxDocument::open(&path).unwrap();
        let contents: Vec<String> = reopened.content().into_iter().map(|r| r.content).collect();
        assert_eq!(contents, strings(&["Un", "Deux", "Trois", "c1", "c2", "c3", "c4"]));
    }

    #[test]
    fn test_write_paragraphs_creates_valid_package() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.docx");
        write_paragraphs(&strings(&["first", "a < b & c"]), &path).unwrap();

        let doc = DocxDocument::open(&path).unwrap();
        assert_eq!(doc.paragraph_text(), "first\na < b & c");
    }
}
