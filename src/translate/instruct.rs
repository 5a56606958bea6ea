use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use super::context::ContextSettings;
use super::filter::{IgnoreSetFilter, ValidityFilter};
use super::generator::TextGenerator;
use super::parser::ResponseParser;
use super::prompt::{PromptBuilder, PromptTemplate};
use super::reassemble::reassemble;
use super::TranslationBackend;

/// Instruction-tuned model driven by a prompt template, optionally with context
pub struct InstructBackend {
    generator: Arc<dyn TextGenerator>,
    prompts: PromptBuilder,
    parser: ResponseParser,
    batch_size: usize,
    max_tokens: usize,
}

impl InstructBackend {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        prompts: PromptBuilder,
        parser: ResponseParser,
        batch_size: usize,
        max_tokens: usize,
    ) -> Self {
        Self {
            generator,
            prompts,
            parser,
            batch_size: batch_size.max(1),
            max_tokens,
        }
    }

    pub fn from_config(config: &PipelineConfig, generator: Arc<dyn TextGenerator>) -> Result<Self> {
        let template = PromptTemplate::load(&config.prompt)?;
        let filter: Arc<dyn ValidityFilter> = Arc::new(IgnoreSetFilter::new(config.ignore_prompt.iter().cloned()));
        let context = config
            .use_context
            .then(|| ContextSettings::new(config.context_window, config.separateur_context.clone()));

        if context.is_some() && !template.uses_context() {
            warn!("use_context is enabled but the prompt template has no {{context}} slot");
        }

        Ok(Self::new(
            generator,
            PromptBuilder::new(template, filter, context),
            config.response_parsing_method,
            config.batch_size,
            config.max_token,
        ))
    }

    /// Raw generations for every prompt, chunked by batch size
    ///
    /// A chunk that comes back short is padded with empty outputs so later chunks stay
    /// aligned with their prompts.
    async fn generate_all(&self, prompts: &[String]) -> Result<Vec<String>> {
        let total = prompts.len().div_ceil(self.batch_size);
        let mut outputs = Vec::with_capacity(prompts.len());

        for (idx, chunk) in prompts.chunks(self.batch_size).enumerate() {
            info!("┌─ Generation batch {}/{} ({} prompts) ────────", idx + 1, total, chunk.len());
            let started = std::time::Instant::now();

            let mut generated = self.generator.generate(chunk, self.max_tokens).await?;
            if generated.len() != chunk.len() {
                warn!("│ Generator returned {} outputs for {} prompts", generated.len(), chunk.len());
                generated.resize(chunk.len(), String::new());
            }

            info!("│ Processed in {:.2} seconds", started.elapsed().as_secs_f64());
            info!("└─────────────────────────────────────");
            outputs.extend(generated);
        }

        Ok(outputs)
    }
}

#[async_trait]
impl TranslationBackend for InstructBackend {
    fn name(&self) -> &str {
        "tower_instruct"
    }

    async fn transform(
        &self,
        texts: &[String],
        src_lang: &str,
        tgt_lang: &str,
        prev_contexts: Option<&[String]>,
    ) -> Result<Vec<String>> {
        let src_langs = vec![src_lang.to_string(); texts.len()];
        let tgt_langs = vec![tgt_lang.to_string(); texts.len()];
        let prepared = self.prompts.prepare(texts, &src_langs, &tgt_langs, prev_contexts)?;

        debug!(
            "{} of {} records are translatable",
            prepared.prompts.len(),
            texts.len()
        );

        let raw = self.generate_all(&prepared.prompts).await?;
        let parsed = prepared
            .prompts
            .iter()
            .zip(raw.iter())
            .map(|(prompt, output)| self.parser.parse(output, prompt))
            .collect();

        Ok(reassemble(&prepared.valid_mask, parsed))
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

    fn backend(generator: MockTextGenerator, template: &str, context: Option<ContextSettings>, batch_size: usize) -> InstructBackend {
        let filter: Arc<dyn ValidityFilter> = Arc::new(IgnoreSetFilter::new(["", " "]));
        InstructBackend::new(
            Arc::new(generator),
            PromptBuilder::new(PromptTemplate::parse(template).unwrap(), filter, context),
            ResponseParser::KeepFirstLine,
            batch_size,
            32,
        )
    }

    #[tokio::test]
    async fn test_invalid_records_are_not_sent() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .withf(|inputs, max| inputs == strings(&["T: Hello", "T: World"]).as_slice() && *max == 32)
            .times(1)
            .returning(|inputs, _| Ok(inputs.iter().map(|p| format!("{}\nBonjour {}", p, p.len())).collect()));

        let backend = backend(generator, "T: {text}", None, 8);
        let out = backend
            .transform(&strings(&["Hello", " ", "World"]), "English", "French", None)
            .await
            .unwrap();
        assert_eq!(out, strings(&["Bonjour 8", "", "Bonjour 8"]));
    }

    #[tokio::test]
    async fn test_context_is_derived_when_not_supplied() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .withf(|inputs, _| inputs == strings(&["[] A", "[A ] C"]).as_slice())
            .times(1)
            .returning(|inputs, _| Ok(inputs.to_vec()));

        let backend = backend(generator, "[{context}] {text}", Some(ContextSettings::new(2, " ")), 8);
        let out = backend
            .transform(&strings(&["A", "", "C"]), "English", "French", None)
            .await
            .unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[1], "");
    }

    #[tokio::test]
    async fn test_prompts_are_chunked_by_batch_size() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .withf(|inputs, _| inputs.len() <= 2)
            .times(2)
            .returning(|inputs, _| Ok(inputs.iter().map(|p| p.to_uppercase()).collect()));

        let backend = backend(generator, "{text}", None, 2);
        let out = backend
            .transform(&strings(&["a", "b", "c"]), "English", "French", None)
            .await
            .unwrap();
        assert_eq!(out, strings(&["A", "B", "C"]));
    }

    #[tokio::test]
    async fn test_short_generation_keeps_alignment() {
        let mut generator = MockTextGenerator::new();
        let mut call = 0;
        generator.expect_generate().times(2).returning(move |inputs, _| {
            call += 1;
            if call == 1 {
                Ok(vec![inputs[0].to_uppercase()])
            } else {
                Ok(inputs.iter().map(|p| p.to_uppercase()).collect())
            }
        });

        let backend = backend(generator, "{text}", None, 2);
        let out = backend
            .transform(&strings(&["a", "b", "c"]), "English", "French", None)
            .await
            .unwrap();
        assert_eq!(out, strings(&["A", "", "C"]));
    }

    #[tokio::test]
    async fn test_generation_failure_is_surfaced() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .returning(|_, _| Err(VersoError::Inference("out of memory".to_string())));

        let backend = backend(generator, "{text}", None, 4);
        let err = backend
            .transform(&strings(&["a"]), "English", "French", None)
            .await
            .unwrap_err();
        assert!(matches!(err, VersoError::Inference(_)));
    }

    #[tokio::test]
    async fn test_all_invalid_batch_skips_generation() {
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().times(0);

        let backend = backend(generator, "{text}", None, 4);
        let out = backend
            .transform(&strings(&["", " "]), "English", "French", None)
            .await
            .unwrap();
        assert_eq!(out, strings(&["", ""]));
    }
}
