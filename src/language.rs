// Language name and code lookup
//
// Accepts English names ("French"), ISO 639-1 codes ("fr"), ISO 639-3 codes ("fra")
// and FLORES-200 codes ("fra_Latn"). A small built-in table answers the common cases,
// everything else goes through isolang.

use isolang::Language;

use crate::error::{Result, VersoError};

/// Resolve a language name or code to its short (ISO 639-1 when available) code
pub fn code_for(language: &str) -> Result<String> {
    let trimmed = language.trim();
    if trimmed.is_empty() {
        return Err(VersoError::UnknownLanguage(language.to_string()));
    }

    if let Some(code) = builtin_code(trimmed) {
        return Ok(code.to_string());
    }

    let lowered = trimmed.to_lowercase();

    // FLORES codes carry a script suffix: "fra_Latn"
    let base = lowered.split(['_', '-']).next().unwrap_or(lowered.as_str());

    if base.len() == 2 {
        if let Some(lang) = Language::from_639_1(base) {
            return Ok(short_code(lang));
        }
    }

    if base.len() == 3 {
        if let Some(lang) = Language::from_639_3(base) {
            return Ok(short_code(lang));
        }
    }

    if let Some(lang) = Language::from_name(trimmed).or_else(|| Language::from_name(&title_case(trimmed))) {
        return Ok(short_code(lang));
    }

    Err(VersoError::UnknownLanguage(language.to_string()))
}

/// English display name for a language name or code
pub fn name_for(language: &str) -> Result<String> {
    let code = code_for(language)?;
    if let Some(name) = builtin_name(&code) {
        return Ok(name.to_string());
    }
    let lang = Language::from_639_1(&code)
        .or_else(|| Language::from_639_3(&code))
        .ok_or_else(|| VersoError::UnknownLanguage(language.to_string()))?;
    Ok(lang.to_name().to_string())
}

/// FLORES-200 file code ("fra_Latn") for a language name or code
pub fn flores_code(language: &str) -> Result<String> {
    let trimmed = language.trim();
    if let Some((base, script)) = trimmed.split_once('_') {
        if base.len() == 3 && script.len() == 4 {
            return Ok(trimmed.to_string());
        }
    }

    let code = code_for(trimmed)?;
    let special = match code.as_str() {
        "ar" => Some("arb_Arab"),
        "zh" => Some("zho_Hans"),
        "ja" => Some("jpn_Jpan"),
        "ko" => Some("kor_Hang"),
        "ru" => Some("rus_Cyrl"),
        "uk" => Some("ukr_Cyrl"),
        _ => None,
    };
    if let Some(flores) = special {
        return Ok(flores.to_string());
    }

    let lang = Language::from_639_1(&code)
        .or_else(|| Language::from_639_3(&code))
        .ok_or_else(|| VersoError::UnknownLanguage(language.to_string()))?;
    Ok(format!("{}_Latn", lang.to_639_3()))
}

fn short_code(lang: Language) -> String {
    lang.to_639_1()
        .map(|c| c.to_string())
        .unwrap_or_else(|| lang.to_639_3().to_string())
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

fn builtin_code(language: &str) -> Option<&'static str> {
    let code = match language.to_lowercase().as_str() {
        "english" | "en" => "en",
        "french" | "fr" => "fr",
        "german" | "de" => "de",
        "spanish" | "es" => "es",
        "italian" | "it" => "it",
        "portuguese" | "brazilian portuguese" | "pt" | "pt_br" | "pt-br" => "pt",
        "dutch" | "nl" => "nl",
        "russian" | "ru" => "ru",
        "chinese" | "zh" => "zh",
        "japanese" | "ja" => "ja",
        "korean" | "ko" => "ko",
        "arabic" | "ar" => "ar",
        "polish" | "pl" => "pl",
        "turkish" | "tr" => "tr",
        "ukrainian" | "uk" => "uk",
        _ => return None,
    };
    Some(code)
}

fn builtin_name(code: &str) -> Option<&'static str> {
    let name = match code {
        "en" => "English",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "nl" => "Dutch",
        "ru" => "Russian",
        "zh" => "Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "ar" => "Arabic",
        "pl" => "Polish",
        "tr" => "Turkish",
        "uk" => "Ukrainian",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_resolve_case_insensitively() {
        assert_eq!(code_for("French").unwrap(), "fr");
        assert_eq!(code_for("english").unwrap(), "en");
        assert_eq!(code_for(" German ").unwrap(), "de");
    }

    #[test]
    fn test_codes_resolve() {
        assert_eq!(code_for("fr").unwrap(), "fr");
        assert_eq!(code_for("deu").unwrap(), "de");
        assert_eq!(code_for("fra_Latn").unwrap(), "fr");
    }

    #[test]
    fn test_brazilian_portuguese_is_portuguese() {
        assert_eq!(code_for("Brazilian Portuguese").unwrap(), "pt");
        assert_eq!(code_for("pt_BR").unwrap(), "pt");
    }

    #[test]
    fn test_isolang_fallback() {
        assert_eq!(code_for("Swedish").unwrap(), "sv");
        assert_eq!(code_for("sv").unwrap(), "sv");
    }

    #[test]
    fn test_unknown_language() {
        assert!(matches!(code_for("Klingonese"), Err(VersoError::UnknownLanguage(_))));
        assert!(matches!(code_for(""), Err(VersoError::UnknownLanguage(_))));
    }

    #[test]
    fn test_name_for() {
        assert_eq!(name_for("fr").unwrap(), "French");
        assert_eq!(name_for("eng_Latn").unwrap(), "English");
    }

    #[test]
    fn test_flores_code() {
        assert_eq!(flores_code("French").unwrap(), "fra_Latn");
        assert_eq!(flores_code("de").unwrap(), "deu_Latn");
        assert_eq!(flores_code("Chinese").unwrap(), "zho_Hans");
        assert_eq!(flores_code("arb_Arab").unwrap(), "arb_Arab");
    }
}
