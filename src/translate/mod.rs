// Translation core
//
// Leaves first: validity filter, context window, prompt formatting, response parsing
// and reassembly. Back-ends combine them behind one `transform` capability:
// - Fake: deterministic marker transform for pipeline tests
// - TowerInstruct: instruction-tuned model with prompt template and optional context
// - Madlad: multilingual seq2seq model with a target-language tag

pub mod filter;
pub mod context;
pub mod prompt;
pub mod parser;
pub mod reassemble;
pub mod priority;
pub mod generator;
pub mod fake;
pub mod instruct;
pub mod seq2seq;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{PipelineConfig, PipelineKind};
use crate::error::Result;

pub use filter::{IgnoreSetFilter, ValidityFilter};
pub use generator::{OllamaGenerator, TextGenerator};
pub use parser::ResponseParser;

/// Text-to-text translation over one batch
///
/// `result.len() == texts.len()` and `result[i]` translates `texts[i]`. A failure that
/// affects the whole batch is returned as an error, never as a shorter result.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn transform(
        &self,
        texts: &[String],
        src_lang: &str,
        tgt_lang: &str,
        prev_contexts: Option<&[String]>,
    ) -> Result<Vec<String>>;
}

/// Factory for creating back-end instances
pub struct BackendFactory;

impl BackendFactory {
    /// Create the configured back-end, talking to the configured generation server
    pub fn create_backend(config: &PipelineConfig) -> Result<Box<dyn TranslationBackend>> {
        match config.pipeline {
            PipelineKind::Fake => Ok(Box::new(fake::FakeBackend::new())),
            PipelineKind::TowerInstruct | PipelineKind::Madlad => {
                let generator: Arc<dyn TextGenerator> = Arc::new(OllamaGenerator::from_config(config)?);
                Self::create_with_generator(config, generator)
            }
        }
    }

    /// Create the configured back-end around an existing generator
    pub fn create_with_generator(
        config: &PipelineConfig,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Box<dyn TranslationBackend>> {
        match config.pipeline {
            PipelineKind::Fake => Ok(Box::new(fake::FakeBackend::new())),
            PipelineKind::TowerInstruct => Ok(Box::new(instruct::InstructBackend::from_config(config, generator)?)),
            PipelineKind::Madlad => Ok(Box::new(seq2seq::Seq2SeqBackend::from_config(config, generator))),
        }
    }
}
