use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, VersoError};
use crate::language::flores_code;

/// `{root}/{dataset}/{code}.{dataset}`, e.g. `dev/fra_Latn.dev`
pub fn flores_path(root: &Path, language: &str, dataset: &str) -> Result<PathBuf> {
    let code = flores_code(language)?;
    Ok(root.join(dataset).join(format!("{}.{}", code, dataset)))
}

/// Sentences of one language, trimmed, one per line
pub fn read_flores(root: &Path, language: &str, dataset: &str) -> Result<Vec<String>> {
    let path = flores_path(root, language, dataset)?;
    if !path.exists() {
        return Err(VersoError::FileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(&path)?;
    let sentences: Vec<String> = content.lines().map(|l| l.trim().to_string()).collect();
    debug!("Loaded {} sentences from {}", sentences.len(), path.display());
    Ok(sentences)
}

/// Aligned source and target sentences
pub fn load_flores(root: &Path, src: &str, tgt: &str, dataset: &str) -> Result<(Vec<String>, Vec<String>)> {
    Ok((read_flores(root, src, dataset)?, read_flores(root, tgt, dataset)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_and_trimming() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("dev")).unwrap();
        std::fs::write(dir.path().join("dev/eng_Latn.dev"), "Hello \n World\n").unwrap();
        std::fs::write(dir.path().join("dev/fra_Latn.dev"), "Bonjour\nMonde\n").unwrap();

        assert_eq!(
            flores_path(dir.path(), "English", "dev").unwrap(),
            dir.path().join("dev/eng_Latn.dev")
        );

        let (src, tgt) = load_flores(dir.path(), "en", "French", "dev").unwrap();
        assert_eq!(src, vec!["Hello", "World"]);
        assert_eq!(tgt, vec!["Bonjour", "Monde"]);
    }

    #[test]
    fn test_missing_split() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_flores(dir.path(), "fr", "devtest"),
            Err(VersoError::FileNotFound(_))
        ));
    }
}
