use std::path::Path;

use crate::error::Result;
use super::{ensure_same_length, non_empty_lines, DocumentAdapter, Record};

/// Line-delimited text; blank lines are not records and are not written back
pub struct PlainTextDocument {
    lines: Vec<String>,
}

impl PlainTextDocument {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_text(&std::fs::read_to_string(path)?))
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            lines: non_empty_lines(text),
        }
    }
}

impl DocumentAdapter for PlainTextDocument {
    fn content(&self) -> Vec<Record> {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| Record::paragraph(i, line.clone()))
            .collect()
    }

    fn map_translations(&mut self, translated: &[String]) -> Result<()> {
        ensure_same_length(self.lines.len(), translated)?;
        let updated = self
            .lines
            .iter()
            .zip(translated)
            .map(|(original, translation)| {
                if translation.is_empty() {
                    original.clone()
                } else {
                    translation.clone()
                }
            })
            .collect();
        self.lines = updated;
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        write_text(&self.lines, path)
    }
}

pub fn write_text(lines: &[String], path: &Path) -> Result<()> {
    std::fs::write(path, lines.join("\n"))?;
    Ok(())
}
