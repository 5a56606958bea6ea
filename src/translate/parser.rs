use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::VersoError;

static BRACKET_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""translated_text":\s*"([^"]*)""#).expect("valid regex"));

static JSON_OBJECT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*?\}").expect("valid regex"));

/// Strategy for extracting the translation from a raw model continuation
///
/// Every strategy is total: malformed output yields an empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseParser {
    /// Drop the echoed prompt, keep the first line
    #[default]
    KeepFirstLine,
    /// Pick the `"translated_text": "..."` pair out of free text
    BracketRegexp,
    /// Parse the last `{...}` object and read `translated_text`
    Json,
}

impl ResponseParser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeepFirstLine => "keep_first_line",
            Self::BracketRegexp => "bracket_regexp",
            Self::Json => "json",
        }
    }

    pub fn parse(&self, raw_output: &str, prompt: &str) -> String {
        match self {
            Self::KeepFirstLine => keep_first_line(raw_output, prompt),
            Self::BracketRegexp => bracket_regexp(raw_output),
            Self::Json => json_field(raw_output, prompt),
        }
    }
}

impl fmt::Display for ResponseParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseParser {
    type Err = VersoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep_first_line" => Ok(Self::KeepFirstLine),
            "bracket_regexp" => Ok(Self::BracketRegexp),
            "json" => Ok(Self::Json),
            other => Err(VersoError::Config(format!(
                "Invalid response parsing method '{}'. Valid methods: keep_first_line, bracket_regexp, json",
                other
            ))),
        }
    }
}

fn strip_prompt(raw_output: &str, prompt: &str) -> String {
    if prompt.is_empty() {
        raw_output.to_string()
    } else {
        raw_output.replace(prompt, "")
    }
}

fn keep_first_line(raw_output: &str, prompt: &str) -> String {
    let stripped = strip_prompt(raw_output, prompt);
    stripped
        .trim()
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .unwrap_or_default()
}

fn bracket_regexp(raw_output: &str) -> String {
    let matches: Vec<&str> = BRACKET_PATTERN
        .captures_iter(raw_output)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    // The first match usually comes from the instruction echoed by the model
    let selected = match matches.len() {
        0 => {
            debug!("No translated_text pair in output");
            return String::new();
        }
        1 => matches[0],
        _ => matches[1],
    };

    selected.trim().to_string()
}

fn json_field(raw_output: &str, prompt: &str) -> String {
    let normalized = raw_output.replace('\'', "\"");
    let candidate = match JSON_OBJECT_PATTERN.find_iter(&normalized).last() {
        Some(m) => m.as_str(),
        None => {
            debug!("No JSON object in output");
            return String::new();
        }
    };

    match serde_json::from_str::<serde_json::Value>(candidate) {
        Ok(value) => {
            let text = value
                .get("translated_text")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .trim();
            strip_prompt(text, prompt)
        }
        Err(e) => {
            warn!("Malformed JSON in model output ({}): {}", e, candidate);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_first_line_removes_echo() {
        let prompt = "Translate to French: Hello\n";
        let raw = "Translate to French: Hello\n Bonjour \nExplanation follows";
        assert_eq!(ResponseParser::KeepFirstLine.parse(raw, prompt), "Bonjour");
    }

    #[test]
    fn test_keep_first_line_idempotent() {
        let parser = ResponseParser::KeepFirstLine;
        for raw in ["  Bonjour le monde \n second", "\n\nfirst\nsecond", "", "single"] {
            let once = parser.parse(raw, "");
            assert_eq!(parser.parse(&once, ""), once);
        }
    }

    #[test]
    fn test_bracket_regexp_prefers_second_match() {
        let raw = r#"Answer with "translated_text": "<translation>" then "translated_text": "Bonjour""#;
        assert_eq!(ResponseParser::BracketRegexp.parse(raw, ""), "Bonjour");
    }

    #[test]
    fn test_bracket_regexp_single_match_falls_back() {
        let raw = r#"{"translated_text": " Salut "}"#;
        assert_eq!(ResponseParser::BracketRegexp.parse(raw, ""), "Salut");
    }

    #[test]
    fn test_bracket_regexp_keeps_inner_text() {
        let raw = r#""translated_text": "x" "translated_text": "  C'est  bon ""#;
        assert_eq!(ResponseParser::BracketRegexp.parse(raw, ""), "C'est  bon");
    }

    #[test]
    fn test_bracket_regexp_no_match() {
        assert_eq!(ResponseParser::BracketRegexp.parse("Bonjour", ""), "");
    }

    #[test]
    fn test_json_takes_last_object() {
        let raw = "Format: {'translated_text': 'x'}\nOutput: {'translated_text': 'Bonjour le monde'}";
        assert_eq!(ResponseParser::Json.parse(raw, ""), "Bonjour le monde");
    }

    #[test]
    fn test_json_without_braces() {
        assert_eq!(ResponseParser::Json.parse("no braces here", ""), "");
    }

    #[test]
    fn test_json_malformed_object() {
        assert_eq!(ResponseParser::Json.parse("{translated_text: oops}", ""), "");
    }

    #[test]
    fn test_json_missing_field() {
        assert_eq!(ResponseParser::Json.parse(r#"{"text": "Bonjour"}"#, ""), "");
    }

    #[test]
    fn test_from_str() {
        assert_eq!("json".parse::<ResponseParser>().unwrap(), ResponseParser::Json);
        assert_eq!(
            "Keep_First_Line".parse::<ResponseParser>().unwrap(),
            ResponseParser::KeepFirstLine
        );
        assert!("regex".parse::<ResponseParser>().is_err());
    }
}
