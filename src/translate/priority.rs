// Rule-based back-end precedence
//
// Bilingual seq2seq models first, then the document instruction model (document mode
// only), then the generic multilingual model, then the sentence instruction model
// (sentence mode only).

use tracing::debug;

use crate::error::Result;
use crate::language;

/// Sentence-level instruction-tuned model
pub const INSTRUCT_SENTENCE_MODEL: &str = "sentence_trad_tower";
/// Document-level instruction-tuned model
pub const INSTRUCT_DOCUMENT_MODEL: &str = "sentence_trad_tower_docs";
/// Generic multilingual seq2seq model
pub const MULTILINGUAL_MODEL: &str = "madlad";

/// Languages supported by the document instruction model, by code
pub const DOCUMENT_MODEL_LANGUAGES: [&str; 10] = ["en", "de", "fr", "es", "zh", "pt", "it", "ru", "ko", "nl"];

/// Identifier of the bilingual model for one direction
pub fn seq2seq_model_name(src_code: &str, tgt_code: &str) -> String {
    format!("{}_{}_seq2seq", src_code, tgt_code)
}

/// Ordered preference list over the available back-ends
pub fn select_priority<S: AsRef<str>>(
    available: &[S],
    src_lang: &str,
    tgt_lang: &str,
    document_mode: bool,
) -> Result<Vec<String>> {
    let src_code = language::code_for(src_lang)?;
    let tgt_code = language::code_for(tgt_lang)?;
    let is_available = |name: &str| available.iter().any(|a| a.as_ref() == name);

    let mut priority = Vec::new();

    let seq2seq = seq2seq_model_name(&src_code, &tgt_code);
    if is_available(&seq2seq) {
        priority.push(seq2seq);
    }

    if document_mode
        && is_available(INSTRUCT_DOCUMENT_MODEL)
        && DOCUMENT_MODEL_LANGUAGES.contains(&src_code.as_str())
        && DOCUMENT_MODEL_LANGUAGES.contains(&tgt_code.as_str())
    {
        priority.push(INSTRUCT_DOCUMENT_MODEL.to_string());
    }

    if is_available(MULTILINGUAL_MODEL) {
        priority.push(MULTILINGUAL_MODEL.to_string());
    }

    if !document_mode && is_available(INSTRUCT_SENTENCE_MODEL) {
        priority.push(INSTRUCT_SENTENCE_MODEL.to_string());
    }

    debug!(
        "Back-end priority for {} -> {} (document: {}): {:?}",
        src_code, tgt_code, document_mode, priority
    );
    Ok(priority)
}
