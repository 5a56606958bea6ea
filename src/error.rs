use thiserror::Error;

#[derive(Error, Debug)]
pub enum VersoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Backend inference error: {0}")]
    Inference(String),

    #[error("Batch shape mismatch: expected {expected} records, got {actual}")]
    BatchShape { expected: usize, actual: usize },

    #[error("Document error: {0}")]
    Document(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, VersoError>;
