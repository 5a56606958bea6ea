use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, VersoError};
use super::context::ContextSettings;
use super::filter::{select_valid, ValidityFilter};

pub const SLOT_TEXT: &str = "text";
pub const SLOT_SRC_LANG: &str = "src_lang";
pub const SLOT_TGT_LANG: &str = "tgt_lang";
pub const SLOT_CONTEXT: &str = "context";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Slot(String),
}

/// Prompt template with `{name}` slots; `{{` and `}}` are literal braces
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pieces: Vec<Piece>,
}

/// Values available for substitution
#[derive(Debug, Clone, Copy)]
pub struct PromptVars<'a> {
    pub text: &'a str,
    pub src_lang: &'a str,
    pub tgt_lang: &'a str,
    pub context: Option<&'a str>,
}

impl PromptTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for n in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    if !closed {
                        return Err(VersoError::Template("unterminated slot in template".to_string()));
                    }
                    let name = name.trim().to_string();
                    if name.is_empty() || name.contains('{') {
                        return Err(VersoError::Template(format!("invalid slot name '{}'", name)));
                    }
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(Piece::Slot(name));
                }
                '}' => {
                    return Err(VersoError::Template("single '}' encountered in template".to_string()));
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Self { pieces })
    }

    /// Load a template file; a missing or unreadable file is a configuration error
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            VersoError::Config(format!("Failed to read prompt template {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.pieces.iter().filter_map(|p| match p {
            Piece::Slot(name) => Some(name.as_str()),
            Piece::Literal(_) => None,
        })
    }

    pub fn uses_context(&self) -> bool {
        self.slots().any(|s| s == SLOT_CONTEXT)
    }

    pub fn format(&self, vars: &PromptVars<'_>) -> Result<String> {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Slot(name) => {
                    let value = match name.as_str() {
                        SLOT_TEXT => Some(vars.text),
                        SLOT_SRC_LANG => Some(vars.src_lang),
                        SLOT_TGT_LANG => Some(vars.tgt_lang),
                        SLOT_CONTEXT => vars.context,
                        _ => None,
                    };
                    let value = value.ok_or_else(|| {
                        VersoError::Template(format!("slot '{{{}}}' has no value", name))
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// Prompts for the valid records of a batch, with the mask that selected them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreparedBatch {
    pub prompts: Vec<String>,
    pub valid_mask: Vec<bool>,
}

/// Filter, context and template applied in the fixed order: context is built on the
/// whole batch, then the mask selects the entries of valid records.
pub struct PromptBuilder {
    template: PromptTemplate,
    filter: Arc<dyn ValidityFilter>,
    context: Option<ContextSettings>,
}

impl PromptBuilder {
    pub fn new(template: PromptTemplate, filter: Arc<dyn ValidityFilter>, context: Option<ContextSettings>) -> Self {
        Self {
            template,
            filter,
            context,
        }
    }

    pub fn filter(&self) -> &Arc<dyn ValidityFilter> {
        &self.filter
    }

    pub fn context(&self) -> Option<&ContextSettings> {
        self.context.as_ref()
    }

    /// `src_langs`/`tgt_langs` hold one language name per record
    pub fn prepare(
        &self,
        texts: &[String],
        src_langs: &[String],
        tgt_langs: &[String],
        prev_contexts: Option<&[String]>,
    ) -> Result<PreparedBatch> {
        if src_langs.len() != texts.len() || tgt_langs.len() != texts.len() {
            return Err(VersoError::BatchShape {
                expected: texts.len(),
                actual: src_langs.len().min(tgt_langs.len()),
            });
        }

        let valid_mask = self.filter.mask(texts);

        let contexts = match (&self.context, prev_contexts) {
            (None, _) => None,
            (Some(_), Some(given)) => {
                if given.len() != texts.len() {
                    return Err(VersoError::BatchShape {
                        expected: texts.len(),
                        actual: given.len(),
                    });
                }
                Some(select_valid(given, &valid_mask))
            }
            (Some(settings), None) => Some(select_valid(&settings.build(texts), &valid_mask)),
        };

        let valid: Vec<usize> = valid_mask
            .iter()
            .enumerate()
            .filter(|(_, v)| **v)
            .map(|(i, _)| i)
            .collect();

        let mut prompts = Vec::with_capacity(valid.len());
        for (n, &i) in valid.iter().enumerate() {
            let vars = PromptVars {
                text: &texts[i],
                src_lang: &src_langs[i],
                tgt_lang: &tgt_langs[i],
                context: contexts.as_ref().map(|c| c[n].as_str()),
            };
            prompts.push(self.template.format(&vars)?);
        }

        Ok(PreparedBatch { prompts, valid_mask })
    }
}
