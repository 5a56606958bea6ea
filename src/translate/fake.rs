use async_trait::async_trait;

use crate::error::Result;
use super::TranslationBackend;

const MARKER: &str = "FAKE";

/// Deterministic stand-in: the first four characters are replaced by a marker
pub struct FakeBackend;

impl FakeBackend {
    pub fn new() -> Self {
        Self
    }

    pub fn transform_one(text: &str) -> String {
        let rest: String = text.chars().skip(MARKER.len()).collect();
        format!("{}{}", MARKER, rest)
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranslationBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn transform(
        &self,
        texts: &[String],
        _src_lang: &str,
        _tgt_lang: &str,
        _prev_contexts: Option<&[String]>,
    ) -> Result<Vec<String>> {
        Ok(texts.iter().map(|t| Self::transform_one(t)).collect())
    }
}
