// Evaluation harness
//
// BLEU is computed natively; COMET goes through a scoring service. Results of a run
// are kept in a JSON run record under the tracking directory.

pub mod bleu;
pub mod comet;
pub mod flores;
pub mod metrics;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::document::{DocumentFactory, PdfExtractor};
use crate::error::{Result, VersoError};
use crate::pipeline::TranslationPipeline;

pub use bleu::{corpus_bleu, text_bleu};
pub use comet::{CometSample, CometScore, CometScorer, HttpCometScorer};
pub use metrics::{RunRecord, RunRecorder};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalScores {
    pub bleu: Option<f64>,
    pub comet: Option<f64>,
}

/// Which metrics to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSelection {
    pub bleu: bool,
    pub comet: bool,
}

impl MetricSelection {
    pub fn validate(&self) -> Result<()> {
        if !self.bleu && !self.comet {
            return Err(VersoError::Evaluation(
                "select an evaluation method, bleu or comet".to_string(),
            ));
        }
        Ok(())
    }
}

/// Score a whole translated text against its reference, with COMET when a scorer is given
pub async fn score_texts(
    translated: &str,
    reference: &str,
    source: &str,
    comet: Option<&dyn CometScorer>,
    recorder: &mut RunRecorder,
) -> Result<EvalScores> {
    let bleu = text_bleu(translated, reference);
    recorder.log_metric("bleu_score", bleu);

    let comet = match comet {
        Some(scorer) => {
            let sample = CometSample {
                src: source.to_string(),
                mt: translated.to_string(),
                reference: reference.to_string(),
            };
            let score = scorer.score(&[sample]).await?;
            recorder.log_metric("comet_score", score.system_score);
            Some(score.system_score)
        }
        None => None,
    };

    info!("Evaluation completed. BLEU: {}, COMET: {:?}", bleu, comet);
    Ok(EvalScores { bleu: Some(bleu), comet })
}

/// Evaluate a document translation against a ground truth
///
/// When `translated` is given it is scored as is; otherwise `source` is translated
/// with `pipeline` first.
pub async fn evaluate_document(
    pipeline: Option<&TranslationPipeline>,
    source: &Path,
    ground_truth: &Path,
    translated: Option<&Path>,
    extractor: &dyn PdfExtractor,
    comet: Option<&dyn CometScorer>,
    recorder: &mut RunRecorder,
) -> Result<EvalScores> {
    recorder.log_param("eval_dataset", ground_truth.display().to_string());
    recorder.log_param("source", source.display().to_string());

    let source_text = DocumentFactory::read_text(source, extractor)?;
    let reference_text = DocumentFactory::read_text(ground_truth, extractor)?;

    let translated_text = match (translated, pipeline) {
        (Some(path), _) => DocumentFactory::read_text(path, extractor)?,
        (None, Some(pipeline)) => {
            let lines = crate::document::non_empty_lines(&source_text);
            pipeline.translate_texts(&lines).await?.join("\n")
        }
        (None, None) => {
            return Err(VersoError::Evaluation(
                "either a translated document or a pipeline is required".to_string(),
            ))
        }
    };

    score_texts(&translated_text, &reference_text, &source_text, comet, recorder).await
}

/// Translate a FLORES-200 split and score it
///
/// Translations are written next to the run record. BLEU covers the full aligned
/// list, so an empty translation counts against the score.
pub async fn evaluate_flores(
    pipeline: &TranslationPipeline,
    dataset: &str,
    sentence_id: Option<usize>,
    metrics: MetricSelection,
    comet: Option<&dyn CometScorer>,
    recorder: &mut RunRecorder,
) -> Result<EvalScores> {
    metrics.validate()?;
    let config = pipeline.config();
    recorder.log_param("eval_dataset", dataset);

    let (mut sources, mut references) =
        flores::load_flores(&config.flores_dir, &config.src_code, &config.tgt_code, dataset)?;
    if let Some(id) = sentence_id {
        let (Some(src), Some(reference)) = (sources.get(id).cloned(), references.get(id).cloned()) else {
            return Err(VersoError::Evaluation(format!(
                "sentence {} is outside the {} split ({} sentences)",
                id,
                dataset,
                sources.len()
            )));
        };
        sources = vec![src];
        references = vec![reference];
    }

    info!("Translating {} FLORES sentences", sources.len());
    let translations = pipeline.translate_texts(&sources).await?;
    let empty = translations.iter().filter(|t| t.is_empty()).count();
    if empty > 0 {
        warn!("{} of {} translations are empty", empty, translations.len());
    }

    let output = translations_path(recorder.run_dir(), dataset, config);
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut body = translations.join("\n");
    body.push('\n');
    std::fs::write(&output, body)?;
    info!("Translations written to {}", output.display());

    let mut scores = EvalScores::default();
    if metrics.bleu {
        let bleu = corpus_bleu(&translations, &references);
        recorder.log_metric("bleu_score", bleu);
        scores.bleu = Some(bleu);
    }
    if metrics.comet {
        match comet {
            Some(scorer) => {
                let score = scorer
                    .score(&comet::samples(&sources, &translations, &references))
                    .await?;
                recorder.log_metric("comet_score", score.system_score);
                scores.comet = Some(score.system_score);
            }
            None => warn!("COMET requested but no comet_endpoint is configured"),
        }
    }

    Ok(scores)
}

fn translations_path(run_dir: &Path, dataset: &str, config: &crate::config::PipelineConfig) -> PathBuf {
    run_dir.join(format!(
        "flores200_{}-{}_{}-{}.evl",
        dataset, config.src_code, config.tgt_code, config.version
    ))
}
