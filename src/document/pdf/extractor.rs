use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, VersoError};

/// One positioned character, as reported by the extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfChar {
    pub text: String,
    pub top: f32,
    #[serde(default)]
    pub fontname: Option<String>,
    #[serde(default)]
    pub size: Option<f32>,
}

/// Rows of cells; `None` marks a cell the table finder saw but could not read
pub type PdfTable = Vec<Vec<Option<String>>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfPage {
    #[serde(default)]
    pub chars: Vec<PdfChar>,
    #[serde(default)]
    pub tables: Vec<PdfTable>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPdf {
    pub pages: Vec<PdfPage>,
}

/// Character and table extraction for PDF input
pub trait PdfExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<ExtractedPdf>;
}

/// Runs an external extractor that prints the page JSON on stdout
pub struct CommandPdfExtractor {
    binary: String,
}

impl CommandPdfExtractor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn check_availability(&self) -> Result<()> {
        let output = Command::new(&self.binary)
            .arg("--help")
            .output()
            .map_err(|e| VersoError::Document(format!("{} command not found: {}", self.binary, e)))?;

        if output.status.success() {
            info!("PDF extractor '{}' is available", self.binary);
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(VersoError::Document(format!(
                "PDF extractor '{}' not available: {}",
                self.binary, stderr
            )))
        }
    }
}

impl PdfExtractor for CommandPdfExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedPdf> {
        debug!("Extracting {} with {}", path.display(), self.binary);

        let output = Command::new(&self.binary)
            .arg(path)
            .output()
            .map_err(|e| VersoError::Document(format!("Failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VersoError::Document(format!(
                "{} failed on {}: {}",
                self.binary,
                path.display(),
                stderr
            )));
        }

        let extracted: ExtractedPdf = serde_json::from_slice(&output.stdout)?;
        debug!("Extracted {} pages", extracted.pages.len());
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_json_shape() {
        let json = r#"{"pages":[{"chars":[{"text":"H","top":10.0,"fontname":"Times-Bold","size":14.0},{"text":"i","top":10.2}],"tables":[[["a",null],["c","d"]]]}]}"#;
        let extracted: ExtractedPdf = serde_json::from_str(json).unwrap();
        let page = &extracted.pages[0];
        assert_eq!(page.chars.len(), 2);
        assert_eq!(page.chars[0].fontname.as_deref(), Some("Times-Bold"));
        assert_eq!(page.chars[1].size, None);
        assert_eq!(page.tables[0][0][1], None);
    }

    #[test]
    fn test_missing_binary_is_a_document_error() {
        let extractor = CommandPdfExtractor::new("verso-no-such-extractor");
        let result = extractor.extract(Path::new("input.pdf"));
        assert!(matches!(result, Err(VersoError::Document(_))));
    }
}
