use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

const MAX_ORDER: usize = 4;

static TOKENIZE_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        // punctuation and symbols, except apostrophe, period and comma
        (Regex::new(r"([{-~\[-` -&(-+:-@/])").expect("valid regex"), " ${1} "),
        // period and comma unless preceded by a digit
        (Regex::new(r"([^0-9])([\.,])").expect("valid regex"), "${1} ${2} "),
        // period and comma unless followed by a digit
        (Regex::new(r"([\.,])([^0-9])").expect("valid regex"), " ${1} ${2}"),
        // dash preceded by a digit
        (Regex::new(r"([0-9])(-)").expect("valid regex"), "${1} ${2} "),
    ]
});

/// mteval-v13a tokenization
pub fn tokenize_13a(line: &str) -> Vec<String> {
    let mut text = line
        .replace("<skipped>", "")
        .replace("-\n", "")
        .replace('\n', " ");
    if text.contains('&') {
        text = text
            .replace("&quot;", "\"")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">");
    }

    let mut text = format!(" {} ", text);
    for (pattern, replacement) in TOKENIZE_RULES.iter() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }
    text.split_whitespace().map(str::to_string).collect()
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for gram in tokens.windows(n) {
            *counts.entry(gram).or_insert(0) += 1;
        }
    }
    counts
}

/// Corpus statistics accumulated over hypothesis/reference pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BleuStats {
    pub correct: [usize; MAX_ORDER],
    pub totals: [usize; MAX_ORDER],
    pub sys_len: usize,
    pub ref_len: usize,
}

impl BleuStats {
    pub fn add(&mut self, hypothesis: &str, reference: &str) {
        let hyp = tokenize_13a(hypothesis);
        let reference = tokenize_13a(reference);
        self.sys_len += hyp.len();
        self.ref_len += reference.len();

        for n in 1..=MAX_ORDER {
            let hyp_counts = ngram_counts(&hyp, n);
            let ref_counts = ngram_counts(&reference, n);
            self.correct[n - 1] += hyp_counts
                .iter()
                .map(|(gram, count)| (*count).min(ref_counts.get(gram).copied().unwrap_or(0)))
                .sum::<usize>();
            self.totals[n - 1] += hyp.len().saturating_sub(n - 1);
        }
    }

    /// Score in 0..=100 with exponential smoothing of empty n-gram orders
    pub fn score(&self) -> f64 {
        if self.sys_len == 0 {
            return 0.0;
        }

        let mut precisions = [0.0f64; MAX_ORDER];
        let mut smooth = 1.0f64;
        for n in 0..MAX_ORDER {
            if self.totals[n] == 0 {
                break;
            }
            precisions[n] = if self.correct[n] == 0 {
                smooth *= 2.0;
                100.0 / (smooth * self.totals[n] as f64)
            } else {
                100.0 * self.correct[n] as f64 / self.totals[n] as f64
            };
        }

        let brevity = if self.sys_len >= self.ref_len {
            1.0
        } else {
            (1.0 - self.ref_len as f64 / self.sys_len as f64).exp()
        };

        let log_sum: f64 = precisions
            .iter()
            .map(|p| if *p == 0.0 { -9_999_999_999.0 } else { p.ln() })
            .sum();
        brevity * (log_sum / MAX_ORDER as f64).exp()
    }
}

fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}

/// Corpus BLEU over aligned sentence lists, rounded to 5 decimals
///
/// Pairs beyond the shorter list are ignored.
pub fn corpus_bleu<H: AsRef<str>, R: AsRef<str>>(hypotheses: &[H], references: &[R]) -> f64 {
    let mut stats = BleuStats::default();
    for (hyp, reference) in hypotheses.iter().zip(references) {
        stats.add(hyp.as_ref(), reference.as_ref());
    }
    round5(stats.score())
}

/// BLEU of a whole translated text against a whole reference
pub fn text_bleu(translated: &str, reference: &str) -> f64 {
    corpus_bleu(&[translated], &[reference])
}
