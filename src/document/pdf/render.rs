use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use tracing::{debug, warn};

use crate::document::{Record, RecordKind};
use crate::error::{Result, VersoError};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const LEFT_MARGIN: f32 = 10.0;
const TOP_MARGIN: f32 = 10.0;
const BOTTOM_MARGIN: f32 = 15.0;
const LINE_HEIGHT: f32 = 10.0;
const PT_TO_MM: f32 = 0.3528;

pub const DEFAULT_FONT: &str = "Arial";
pub const DEFAULT_SIZE: f32 = 12.0;

/// Straighten curly quotes the builtin fonts cannot encode reliably
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201c}' | '\u{201d}' => '"',
            other => other,
        })
        .collect()
}

/// Builtin face for an extracted font name such as `ABCDEF+Times-Bold,Italic`
pub fn builtin_font(name: &str) -> BuiltinFont {
    let lowered = name.to_lowercase();
    let family = lowered.split(',').next().unwrap_or_default();
    let bold = lowered.contains("bold");

    if family.contains("times") || (family.contains("serif") && !family.contains("sans")) {
        if bold { BuiltinFont::TimesBold } else { BuiltinFont::TimesRoman }
    } else if family.contains("courier") || family.contains("mono") {
        if bold { BuiltinFont::CourierBold } else { BuiltinFont::Courier }
    } else if bold {
        BuiltinFont::HelveticaBold
    } else {
        BuiltinFont::Helvetica
    }
}

/// Greedy word wrap by an average glyph width
pub fn wrap_line(text: &str, size: f32) -> Vec<String> {
    let usable = PAGE_WIDTH - 2.0 * LEFT_MARGIN;
    let glyph = (size * 0.5 * PT_TO_MM).max(0.1);
    let max_chars = ((usable / glyph) as usize).max(1);

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split(' ') {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);

        while current.chars().count() > max_chars {
            let head: String = current.chars().take(max_chars).collect();
            let tail: String = current.chars().skip(max_chars).collect();
            lines.push(head);
            current = tail;
        }
    }
    lines.push(current);
    lines
}

struct PageFlow {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    fallback: IndirectFontRef,
    fonts: HashMap<String, IndirectFontRef>,
    y: f32,
    pages: usize,
}

impl PageFlow {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let fallback = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| VersoError::Document(format!("Failed to load Helvetica: {}", e)))?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            fallback,
            fonts: HashMap::new(),
            y: PAGE_HEIGHT - TOP_MARGIN,
            pages: 1,
        })
    }

    fn font(&mut self, name: &str) -> IndirectFontRef {
        if let Some(font) = self.fonts.get(name) {
            return font.clone();
        }
        let font = match self.doc.add_builtin_font(builtin_font(name)) {
            Ok(font) => font,
            Err(e) => {
                warn!("Font '{}' unavailable, using Helvetica: {}", name, e);
                self.fallback.clone()
            }
        };
        self.fonts.insert(name.to_string(), font.clone());
        font
    }

    fn advance(&mut self) {
        self.y -= LINE_HEIGHT;
        if self.y < BOTTOM_MARGIN {
            self.pages += 1;
            let (page, layer) = self.doc.add_page(
                Mm(PAGE_WIDTH),
                Mm(PAGE_HEIGHT),
                format!("Layer {}", self.pages),
            );
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - TOP_MARGIN;
        }
    }

    fn write_block(&mut self, text: &str, font: &IndirectFontRef, size: f32) {
        for line in text.split('\n') {
            for wrapped in wrap_line(&sanitize_text(line), size) {
                self.layer
                    .use_text(wrapped, size, Mm(LEFT_MARGIN), Mm(self.y), font);
                self.advance();
            }
        }
    }

    fn save(self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.doc
            .save(&mut writer)
            .map_err(|e| VersoError::Document(format!("Failed to write {}: {}", path.display(), e)))?;
        debug!("Rendered {} pages to {}", self.pages, path.display());
        Ok(())
    }
}

/// Flow records onto fresh A4 pages; paragraphs are followed by a blank line
pub fn render_records(records: &[Record], path: &Path) -> Result<()> {
    let mut flow = PageFlow::new("translated")?;

    for record in records {
        let font = flow.font(record.font.as_deref().unwrap_or(DEFAULT_FONT));
        let size = record.size.unwrap_or(DEFAULT_SIZE);
        flow.write_block(&record.content, &font, size);
        if record.kind == RecordKind::Paragraph {
            flow.advance();
        }
    }

    flow.save(path)
}
