use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::language;
use super::filter::{select_valid, IgnoreSetFilter, ValidityFilter};
use super::generator::TextGenerator;
use super::reassemble::reassemble;
use super::TranslationBackend;

const OUTPUT_TOKEN_RATIO: usize = 2;
const MIN_OUTPUT_TOKENS: usize = 16;

/// Multilingual sequence-to-sequence model steered by a `<2xx>` target tag
pub struct Seq2SeqBackend {
    generator: Arc<dyn TextGenerator>,
    filter: Arc<dyn ValidityFilter>,
    batch_size: usize,
    max_tokens: usize,
}

/// Target tag for a language name, e.g. `<2fr>` for "French"
pub fn target_tag(tgt_lang: &str) -> Result<String> {
    let code = match tgt_lang.trim() {
        "Arabic" => "ar".to_string(),
        "French" => "fr".to_string(),
        "English" => "en".to_string(),
        "Chinese" => "zh".to_string(),
        "Brazilian Portuguese" => "pt_br".to_string(),
        "Spanish" => "es".to_string(),
        "German" => "de".to_string(),
        "Italian" => "it".to_string(),
        "Japanese" => "ja".to_string(),
        "Russian" => "ru".to_string(),
        other => language::code_for(other)?,
    };
    Ok(format!("<2{}>", code))
}

impl Seq2SeqBackend {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        filter: Arc<dyn ValidityFilter>,
        batch_size: usize,
        max_tokens: usize,
    ) -> Self {
        Self {
            generator,
            filter,
            batch_size: batch_size.max(1),
            max_tokens,
        }
    }

    pub fn from_config(config: &PipelineConfig, generator: Arc<dyn TextGenerator>) -> Self {
        let filter: Arc<dyn ValidityFilter> = Arc::new(IgnoreSetFilter::new(config.ignore_prompt.iter().cloned()));
        Self::new(generator, filter, config.batch_size, config.max_token)
    }

    /// Output budget from the longest input of the chunk, capped by `max_tokens`
    ///
    /// A translation may need more tokens than its source, so the longest input is
    /// scaled by OUTPUT_TOKEN_RATIO and never drops below MIN_OUTPUT_TOKENS.
    fn chunk_budget(&self, chunk: &[String]) -> usize {
        let longest = chunk
            .iter()
            .map(|t| self.generator.count_tokens(t))
            .max()
            .unwrap_or(1);
        (longest * OUTPUT_TOKEN_RATIO)
            .max(MIN_OUTPUT_TOKENS)
            .min(self.max_tokens.max(1))
    }
}

#[async_trait]
impl TranslationBackend for Seq2SeqBackend {
    fn name(&self) -> &str {
        "madlad"
    }

    async fn transform(
        &self,
        texts: &[String],
        _src_lang: &str,
        tgt_lang: &str,
        _prev_contexts: Option<&[String]>,
    ) -> Result<Vec<String>> {
        let tag = target_tag(tgt_lang)?;
        let mask = self.filter.mask(texts);
        let inputs: Vec<String> = select_valid(texts, &mask)
            .into_iter()
            .map(|t| format!("{} {}", tag, t))
            .collect();

        let total = inputs.len().div_ceil(self.batch_size);
        let mut outputs = Vec::with_capacity(inputs.len());
        for (idx, chunk) in inputs.chunks(self.batch_size).enumerate() {
            let budget = self.chunk_budget(chunk);
            info!("┌─ Seq2seq batch {}/{} ({} texts, {} tokens) ────────", idx + 1, total, chunk.len(), budget);

            let mut generated = self.generator.generate(chunk, budget).await?;
            if generated.len() != chunk.len() {
                warn!("│ Generator returned {} outputs for {} inputs", generated.len(), chunk.len());
                generated.resize(chunk.len(), String::new());
            }
            info!("└─────────────────────────────────────");
            outputs.extend(generated.into_iter().map(|t| t.trim().to_string()));
        }

        Ok(reassemble(&mask, outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VersoError;
    use crate::translate::generator::MockTextGenerator;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_target_tag() {
        assert_eq!(target_tag("French").unwrap(), "<2fr>");
        assert_eq!(target_tag("Brazilian Portuguese").unwrap(), "<2pt_br>");
        assert_eq!(target_tag("Dutch").unwrap(), "<2nl>");
        assert!(matches!(target_tag("Quenya"), Err(VersoError::UnknownLanguage(_))));
    }

    #[tokio::test]
    async fn test_budget_follows_each_chunk() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_count_tokens()
            .returning(|t| t.split_whitespace().count() * 10);
        generator
            .expect_generate()
            .withf(|inputs, max| inputs.len() == 2 && *max == 80)
            .times(1)
            .returning(|inputs, _| Ok(inputs.iter().map(|i| format!(" {} ", i)).collect()));
        generator
            .expect_generate()
            .withf(|inputs, max| inputs.len() == 1 && *max == 40)
            .times(1)
            .returning(|inputs, _| Ok(inputs.to_vec()));

        let filter: Arc<dyn ValidityFilter> = Arc::new(IgnoreSetFilter::new([""]));
        let backend = Seq2SeqBackend::new(Arc::new(generator), filter, 2, 512);
        let out = backend
            .transform(&strings(&["one", "one two three", "", "x"]), "English", "French", None)
            .await
            .unwrap();

        assert_eq!(
            out,
            strings(&["<2fr> one", "<2fr> one two three", "", "<2fr> x"])
        );
    }

    #[tokio::test]
    async fn test_budget_capped_by_max_tokens() {
        let mut generator = MockTextGenerator::new();
        generator.expect_count_tokens().returning(|_| 50);
        generator
            .expect_generate()
            .withf(|_, max| *max == 8)
            .returning(|inputs, _| Ok(inputs.to_vec()));

        let filter: Arc<dyn ValidityFilter> = Arc::new(IgnoreSetFilter::default());
        let backend = Seq2SeqBackend::new(Arc::new(generator), filter, 4, 8);
        let out = backend.transform(&strings(&["a"]), "English", "German", None).await.unwrap();
        assert_eq!(out, strings(&["<2de> a"]));
    }

    struct RecordingGenerator {
        budgets: std::sync::Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl TextGenerator for RecordingGenerator {
        async fn generate(&self, inputs: &[String], max_new_tokens: usize) -> Result<Vec<String>> {
            self.budgets.lock().unwrap().push(max_new_tokens);
            Ok(inputs.to_vec())
        }
    }

    #[tokio::test]
    async fn test_budget_exceeds_source_length() {
        let generator = Arc::new(RecordingGenerator {
            budgets: std::sync::Mutex::new(Vec::new()),
        });
        let filter: Arc<dyn ValidityFilter> = Arc::new(IgnoreSetFilter::default());
        let backend = Seq2SeqBackend::new(generator.clone(), filter, 8, 512);

        let long = "The quick brown fox jumps over the lazy dog near the riverbank at dawn";
        backend.transform(&strings(&["Hello"]), "English", "French", None).await.unwrap();
        backend.transform(&strings(&[long]), "English", "Japanese", None).await.unwrap();

        let budgets = generator.budgets.lock().unwrap().clone();
        assert_eq!(budgets.len(), 2);
        assert!(budgets[0] >= MIN_OUTPUT_TOKENS);
        let words = long.split_whitespace().count() + 1;
        assert!(budgets[1] >= 2 * words, "budget {} for {} words", budgets[1], words);
    }
}
