use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{Result, VersoError};

/// Opaque text-to-text inference function
///
/// One output per input, in order. An implementation may return fewer outputs than
/// inputs; callers treat missing outputs as empty.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, inputs: &[String], max_new_tokens: usize) -> Result<Vec<String>>;

    /// Model-token estimate used for per-batch length budgets
    ///
    /// Subword vocabularies split words into several pieces and non-Latin scripts
    /// into about one piece per character.
    fn count_tokens(&self, text: &str) -> usize {
        estimate_tokens(text)
    }
}

/// Roughly four characters or three quarters of a word per token, whichever is larger
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    let chars = text.chars().filter(|c| !c.is_whitespace()).count();
    let non_ascii = text.chars().filter(|c| !c.is_ascii() && !c.is_whitespace()).count();
    (words * 4).div_ceil(3).max(chars.div_ceil(4)).max(non_ascii).max(1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub raw: bool,
    pub options: GenerateOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub num_predict: usize,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_gpu: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    pub done: bool,
}

/// Generation through an Ollama server
pub struct OllamaGenerator {
    client: Client,
    endpoint: String,
    model: String,
    cpu_only: bool,
}

impl OllamaGenerator {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, cpu_only: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300)) // 5 minute timeout
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            cpu_only,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(&config.endpoint, &config.llm_model, config.is_cpu())
    }

    /// Check that the server is reachable and the model is pulled
    pub async fn check_availability(&self) -> Result<()> {
        let url = format!("{}/api/show", self.endpoint);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "name": self.model }))
            .send()
            .await
            .map_err(|e| VersoError::Inference(format!("Failed to connect to Ollama: {}", e)))?;

        if response.status().is_success() {
            info!("Ollama model '{}' is available", self.model);
            Ok(())
        } else {
            Err(VersoError::Inference(format!(
                "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
                self.model, self.model
            )))
        }
    }

    async fn generate_one(&self, prompt: &str, max_new_tokens: usize) -> Result<String> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            raw: true,
            options: GenerateOptions {
                num_predict: max_new_tokens,
                temperature: 0.0,
                num_gpu: if self.cpu_only { Some(0) } else { None },
            },
        };

        let url = format!("{}/api/generate", self.endpoint);
        debug!("Sending generation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| VersoError::Inference(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(VersoError::Inference(format!(
                "Ollama API error {}: {}",
                status, error_text
            )));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| VersoError::Inference(format!("Failed to parse response: {}", e)))?;

        debug!("Raw generation: {}", generated.response);
        Ok(generated.response)
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn generate(&self, inputs: &[String], max_new_tokens: usize) -> Result<Vec<String>> {
        let mut outputs = Vec::with_capacity(inputs.len());
        for input in inputs {
            outputs.push(self.generate_one(input, max_new_tokens).await?);
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = GenerateRequest {
            model: "tower".to_string(),
            prompt: "Hi".to_string(),
            stream: false,
            raw: true,
            options: GenerateOptions {
                num_predict: 16,
                temperature: 0.0,
                num_gpu: None,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["options"]["num_predict"], 16);
        assert!(value["options"].get("num_gpu").is_none());
        assert_eq!(value["stream"], false);
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let generator = OllamaGenerator::new("http://localhost:11434/", "tower", true).unwrap();
        assert_eq!(generator.endpoint, "http://localhost:11434");
        assert!(generator.cpu_only);
    }

    #[test]
    fn test_default_token_count() {
        struct Words;

        #[async_trait]
        impl TextGenerator for Words {
            async fn generate(&self, inputs: &[String], _max: usize) -> Result<Vec<String>> {
                Ok(inputs.to_vec())
            }
        }

        assert_eq!(Words.count_tokens("one two  three"), 4);
        assert_eq!(Words.count_tokens(""), 1);
        assert_eq!(Words.count_tokens("internationalization"), 5);
        assert_eq!(Words.count_tokens("日本語の文章です"), 8);
    }
}
