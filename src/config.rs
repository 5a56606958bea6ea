use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, VersoError};
use crate::translate::parser::ResponseParser;

// Defaults shared by serde and `Default`
fn default_experiment_name() -> String {
    "default_experiment".to_string()
}

fn default_run_name() -> String {
    "default_run".to_string()
}

fn default_tracking_dir() -> PathBuf {
    PathBuf::from(".verso/runs")
}

fn default_prompt() -> PathBuf {
    PathBuf::from("config/prompts/example_prompt.txt")
}

fn default_separator() -> String {
    " ".to_string()
}

fn default_context_window() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    1
}

fn default_llm_model() -> String {
    "Unbabel/TowerInstruct-Mistral-7B-v0.2".to_string()
}

fn default_batch_size() -> usize {
    1024
}

fn default_max_token() -> usize {
    512
}

fn default_device() -> String {
    "cuda".to_string()
}

fn default_ignore_prompt() -> Vec<String> {
    vec![String::new(), " ".to_string(), "\n".to_string()]
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_pdf_extractor() -> String {
    "pdfchars".to_string()
}

fn default_flores_dir() -> PathBuf {
    PathBuf::from("cache/flores200_dataset")
}

/// Translation back-end variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    /// Fake: deterministic marker transform, no model involved
    Fake,
    /// TowerInstruct: instruction-tuned model driven by a prompt template, optionally with context
    TowerInstruct,
    /// Madlad: multilingual sequence-to-sequence model driven by a target-language tag
    Madlad,
}

impl PipelineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fake => "fake",
            Self::TowerInstruct => "tower_instruct",
            Self::Madlad => "madlad",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Experiment name used to group run records
    #[serde(default = "default_experiment_name")]
    pub experiment_name: String,
    /// Run name of the run record
    #[serde(default = "default_run_name")]
    pub run_name: String,
    /// Directory where run records are written
    #[serde(default = "default_tracking_dir")]
    pub tracking_dir: PathBuf,
    /// Prompt template path
    #[serde(default = "default_prompt")]
    pub prompt: PathBuf,
    /// Back-end variant
    #[serde(default = "default_pipeline")]
    pub pipeline: PipelineKind,
    /// Inject preceding records as context into prompts
    #[serde(default = "default_true")]
    pub use_context: bool,
    /// Separator used when joining context records
    #[serde(default = "default_separator")]
    pub separateur_context: String,
    /// Number of preceding records used as context
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    /// Re-project translations onto the original document structure
    #[serde(default = "default_true")]
    pub preserve_formatting: bool,
    #[serde(default = "default_version")]
    pub version: u32,
    /// Model identifier passed to the generation server
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    /// Number of prompts sent per generation call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum number of generated tokens
    #[serde(default = "default_max_token")]
    pub max_token: usize,
    #[serde(default)]
    pub response_parsing_method: ResponseParser,
    /// Accelerator hint: "cuda" or "cpu"
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default = "default_src_code")]
    pub src_code: String,
    #[serde(default = "default_src_name")]
    pub src_name: String,
    #[serde(default = "default_tgt_code")]
    pub tgt_code: String,
    #[serde(default = "default_tgt_name")]
    pub tgt_name: String,
    /// Exact strings treated as non-translatable records
    #[serde(default = "default_ignore_prompt")]
    pub ignore_prompt: Vec<String>,
    /// Generation server endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Command emitting the character stream and tables of a PDF as JSON
    #[serde(default = "default_pdf_extractor")]
    pub pdf_extractor: String,
    /// COMET scoring service URL; COMET is skipped when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comet_endpoint: Option<String>,
    /// Root of the FLORES-200 dataset
    #[serde(default = "default_flores_dir")]
    pub flores_dir: PathBuf,
}

fn default_pipeline() -> PipelineKind {
    PipelineKind::TowerInstruct
}

fn default_src_code() -> String {
    "en".to_string()
}

fn default_src_name() -> String {
    "English".to_string()
}

fn default_tgt_code() -> String {
    "fr".to_string()
}

fn default_tgt_name() -> String {
    "French".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            experiment_name: default_experiment_name(),
            run_name: default_run_name(),
            tracking_dir: default_tracking_dir(),
            prompt: default_prompt(),
            pipeline: default_pipeline(),
            use_context: true,
            separateur_context: default_separator(),
            context_window: default_context_window(),
            preserve_formatting: true,
            version: default_version(),
            llm_model: default_llm_model(),
            batch_size: default_batch_size(),
            max_token: default_max_token(),
            response_parsing_method: ResponseParser::default(),
            device: default_device(),
            src_code: default_src_code(),
            src_name: default_src_name(),
            tgt_code: default_tgt_code(),
            tgt_name: default_tgt_name(),
            ignore_prompt: default_ignore_prompt(),
            endpoint: default_endpoint(),
            pdf_extractor: default_pdf_extractor(),
            comet_endpoint: None,
            flores_dir: default_flores_dir(),
        }
    }
}

impl PipelineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VersoError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| VersoError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| VersoError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| VersoError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(VersoError::Config("batch_size must be greater than 0".to_string()));
        }
        if self.max_token == 0 {
            return Err(VersoError::Config("max_token must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Swap source and target languages
    pub fn reversed(mut self) -> Self {
        std::mem::swap(&mut self.src_code, &mut self.tgt_code);
        std::mem::swap(&mut self.src_name, &mut self.tgt_name);
        self
    }

    pub fn is_cpu(&self) -> bool {
        self.device.eq_ignore_ascii_case("cpu")
    }

    /// Flattened key/value view used for run records
    pub fn params(&self) -> Vec<(String, String)> {
        let value = match toml::Value::try_from(self) {
            Ok(value) => value,
            Err(_) => return Vec::new(),
        };
        let mut params = Vec::new();
        if let toml::Value::Table(table) = value {
            for (key, value) in table {
                let rendered = match value {
                    toml::Value::String(s) => s,
                    other => other.to_string(),
                };
                params.push((key, rendered));
            }
        }
        params
    }
}
