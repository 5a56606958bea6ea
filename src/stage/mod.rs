// Inference-server stages
//
// A request carries a batch of records for one language pair. Every stage answers
// with exactly one output per input record, in order:
// - Preprocess: records -> prompts + validity mask
// - Translate: records -> translations, coalescing requests that share a language pair
// - Postprocess: raw generations + mask -> translations

pub mod counter;
pub mod server;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{Result, VersoError};
use crate::translate::context::ContextSettings;
use crate::translate::filter::{IgnoreSetFilter, ValidityFilter};
use crate::translate::parser::ResponseParser;
use crate::translate::prompt::{PreparedBatch, PromptBuilder, PromptTemplate};
use crate::translate::reassemble::reassemble;
use crate::translate::TranslationBackend;

pub use counter::RequestCounter;
pub use server::{StageHandle, StageServer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub texts: Vec<String>,
    pub src_name: String,
    pub tgt_name: String,
}

impl TranslationRequest {
    pub fn new(texts: Vec<String>, src_name: impl Into<String>, tgt_name: impl Into<String>) -> Self {
        Self {
            texts,
            src_name: src_name.into(),
            tgt_name: tgt_name.into(),
        }
    }

    pub fn single(text: impl Into<String>, src_name: impl Into<String>, tgt_name: impl Into<String>) -> Self {
        Self::new(vec![text.into()], src_name, tgt_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub translations: Vec<String>,
}

/// Prompt building for a batch of requests
pub struct PreprocessStage {
    builder: PromptBuilder,
}

impl PreprocessStage {
    pub fn new(builder: PromptBuilder) -> Self {
        Self { builder }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let template = PromptTemplate::load(&config.prompt)?;
        let filter: Arc<dyn ValidityFilter> = Arc::new(IgnoreSetFilter::new(config.ignore_prompt.iter().cloned()));
        let context = config
            .use_context
            .then(|| ContextSettings::new(config.context_window, config.separateur_context.clone()));
        Ok(Self::new(PromptBuilder::new(template, filter, context)))
    }

    /// One prepared batch per request; context is built inside each request only
    pub fn execute(&self, requests: &[TranslationRequest]) -> Vec<Result<PreparedBatch>> {
        requests
            .iter()
            .map(|request| {
                let n = request.texts.len();
                let src = vec![request.src_name.clone(); n];
                let tgt = vec![request.tgt_name.clone(); n];
                self.builder.prepare(&request.texts, &src, &tgt, None)
            })
            .collect()
    }
}

/// Response parsing and reassembly
pub struct PostprocessStage {
    parser: ResponseParser,
}

impl PostprocessStage {
    pub fn new(parser: ResponseParser) -> Self {
        Self { parser }
    }

    /// `raw[i]` is the generation for `batch.prompts[i]`
    pub fn execute_one(&self, batch: &PreparedBatch, raw: &[String]) -> Vec<String> {
        if raw.len() != batch.prompts.len() {
            warn!(
                "Postprocess received {} generations for {} prompts",
                raw.len(),
                batch.prompts.len()
            );
        }
        let parsed = batch
            .prompts
            .iter()
            .zip(raw)
            .map(|(prompt, output)| self.parser.parse(output, prompt))
            .collect();
        reassemble(&batch.valid_mask, parsed)
    }

    pub fn execute(&self, batches: &[(PreparedBatch, Vec<String>)]) -> Vec<Vec<String>> {
        batches
            .iter()
            .map(|(batch, raw)| self.execute_one(batch, raw))
            .collect()
    }
}

/// Back-end dispatch over several requests
pub struct TranslateStage {
    backend: Arc<dyn TranslationBackend>,
    context: Option<ContextSettings>,
}

impl TranslateStage {
    pub fn new(backend: Arc<dyn TranslationBackend>, context: Option<ContextSettings>) -> Self {
        Self { backend, context }
    }

    pub fn from_config(config: &PipelineConfig, backend: Arc<dyn TranslationBackend>) -> Self {
        let context = config
            .use_context
            .then(|| ContextSettings::new(config.context_window, config.separateur_context.clone()));
        Self::new(backend, context)
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// One result per request, in request order
    ///
    /// Requests sharing a language pair go to the back-end in a single call and are
    /// split back by size. A failed call fails every request of that pair.
    pub async fn execute(&self, requests: &[TranslationRequest]) -> Vec<Result<Vec<String>>> {
        let mut groups: Vec<((&str, &str), Vec<usize>)> = Vec::new();
        let mut index: HashMap<(&str, &str), usize> = HashMap::new();
        for (i, request) in requests.iter().enumerate() {
            let key = (request.src_name.as_str(), request.tgt_name.as_str());
            match index.get(&key) {
                Some(&g) => groups[g].1.push(i),
                None => {
                    index.insert(key, groups.len());
                    groups.push((key, vec![i]));
                }
            }
        }

        let mut results: Vec<Option<Result<Vec<String>>>> = (0..requests.len()).map(|_| None).collect();
        for ((src, tgt), members) in groups {
            let mut texts = Vec::new();
            let mut contexts = Vec::new();
            for &i in &members {
                texts.extend(requests[i].texts.iter().cloned());
                if let Some(settings) = &self.context {
                    contexts.extend(settings.build(&requests[i].texts));
                }
            }

            info!(
                "┌─ {} -> {}: {} requests, {} records ────────",
                src,
                tgt,
                members.len(),
                texts.len()
            );
            let prev_contexts = self.context.as_ref().map(|_| contexts.as_slice());
            let outcome = self.backend.transform(&texts, src, tgt, prev_contexts).await;

            match outcome {
                Ok(translated) if translated.len() == texts.len() => {
                    let mut offset = 0;
                    for &i in &members {
                        let size = requests[i].texts.len();
                        results[i] = Some(Ok(translated[offset..offset + size].to_vec()));
                        offset += size;
                    }
                    info!("│ Translated {} records", texts.len());
                }
                Ok(translated) => {
                    warn!("│ Back-end returned {} results for {} records", translated.len(), texts.len());
                    for &i in &members {
                        results[i] = Some(Err(VersoError::BatchShape {
                            expected: texts.len(),
                            actual: translated.len(),
                        }));
                    }
                }
                Err(e) => {
                    warn!("│ Back-end failed: {}", e);
                    let message = e.to_string();
                    for &i in &members {
                        results[i] = Some(Err(VersoError::Inference(message.clone())));
                    }
                }
            }
            info!("└─────────────────────────────────────");
        }

        debug!("Translate stage answered {} requests", requests.len());
        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err(VersoError::Inference("request was not processed".to_string()))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::fake::FakeBackend;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Records every call and echoes `text|context`
    #[derive(Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<(String, String, usize)>>,
    }

    #[async_trait]
    impl TranslationBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        async fn transform(
            &self,
            texts: &[String],
            src_lang: &str,
            tgt_lang: &str,
            prev_contexts: Option<&[String]>,
        ) -> Result<Vec<String>> {
            self.calls
                .lock()
                .unwrap()
                .push((src_lang.to_string(), tgt_lang.to_string(), texts.len()));
            Ok(texts
                .iter()
                .enumerate()
                .map(|(i, t)| match prev_contexts {
                    Some(c) => format!("{}|{}", t, c[i]),
                    None => t.clone(),
                })
                .collect())
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl TranslationBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        async fn transform(
            &self,
            _texts: &[String],
            _src_lang: &str,
            _tgt_lang: &str,
            _prev_contexts: Option<&[String]>,
        ) -> Result<Vec<String>> {
            Err(VersoError::Inference("device lost".to_string()))
        }
    }

    #[tokio::test]
    async fn test_coalesces_by_language_pair() {
        let backend = Arc::new(RecordingBackend::default());
        let stage = TranslateStage::new(backend.clone(), None);
        let requests = vec![
            TranslationRequest::new(strings(&["a", "b"]), "English", "French"),
            TranslationRequest::single("c", "French", "English"),
            TranslationRequest::single("d", "English", "French"),
        ];

        let results = stage.execute(&requests).await;
        assert_eq!(results[0].as_ref().unwrap(), &strings(&["a", "b"]));
        assert_eq!(results[1].as_ref().unwrap(), &strings(&["c"]));
        assert_eq!(results[2].as_ref().unwrap(), &strings(&["d"]));

        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], ("English".to_string(), "French".to_string(), 3));
    }

    #[tokio::test]
    async fn test_context_stays_inside_request() {
        let backend = Arc::new(RecordingBackend::default());
        let stage = TranslateStage::new(backend, Some(ContextSettings::new(1, " ")));
        let requests = vec![
            TranslationRequest::new(strings(&["one", "two"]), "English", "French"),
            TranslationRequest::new(strings(&["three"]), "English", "French"),
        ];

        let results = stage.execute(&requests).await;
        assert_eq!(results[0].as_ref().unwrap(), &strings(&["one|", "two|one"]));
        assert_eq!(results[1].as_ref().unwrap(), &strings(&["three|"]));
    }

    #[tokio::test]
    async fn test_failure_is_per_language_pair() {
        let stage = TranslateStage::new(Arc::new(FailingBackend), None);
        let results = stage
            .execute(&[TranslationRequest::single("x", "English", "French")])
            .await;
        assert!(matches!(results[0], Err(VersoError::Inference(_))));

        let fake = TranslateStage::new(Arc::new(FakeBackend::new()), None);
        let results = fake
            .execute(&[TranslationRequest::single("Hello", "English", "French")])
            .await;
        assert_eq!(results[0].as_ref().unwrap(), &strings(&["FAKEo"]));
    }

    #[test]
    fn test_preprocess_then_postprocess() {
        let template = PromptTemplate::parse("{src_lang}>{tgt_lang} [{context}] {text}").unwrap();
        let filter: Arc<dyn ValidityFilter> = Arc::new(IgnoreSetFilter::new(["", " ", "\n"]));
        let pre = PreprocessStage::new(PromptBuilder::new(
            template,
            filter,
            Some(ContextSettings::new(1, " ")),
        ));

        let requests = vec![
            TranslationRequest::new(strings(&["Hi", ""]), "English", "French"),
            TranslationRequest::new(strings(&["Yes"]), "English", "German"),
        ];
        let prepared: Vec<PreparedBatch> = pre.execute(&requests).into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(prepared[0].prompts, strings(&["English>French [] Hi"]));
        assert_eq!(prepared[0].valid_mask, vec![true, false]);
        assert_eq!(prepared[1].prompts, strings(&["English>German [] Yes"]));

        let post = PostprocessStage::new(ResponseParser::KeepFirstLine);
        let outputs = post.execute(&[
            (prepared[0].clone(), strings(&["Salut\nextra"])),
            (prepared[1].clone(), strings(&["Ja"])),
        ]);
        assert_eq!(outputs, vec![strings(&["Salut", ""]), strings(&["Ja"])]);
    }
}
