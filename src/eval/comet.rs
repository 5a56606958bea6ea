use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, VersoError};

/// One source / translation / reference triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CometSample {
    pub src: String,
    pub mt: String,
    #[serde(rename = "ref")]
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CometScore {
    pub system_score: f64,
    #[serde(default)]
    pub scores: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct CometRequest<'a> {
    data: &'a [CometSample],
}

/// Learned translation quality metric
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CometScorer: Send + Sync {
    async fn score(&self, samples: &[CometSample]) -> Result<CometScore>;
}

/// Scores through a COMET service answering `{system_score, scores}`
pub struct HttpCometScorer {
    client: Client,
    endpoint: String,
}

impl HttpCometScorer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl CometScorer for HttpCometScorer {
    async fn score(&self, samples: &[CometSample]) -> Result<CometScore> {
        debug!("Scoring {} samples with COMET at {}", samples.len(), self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&CometRequest { data: samples })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VersoError::Evaluation(format!(
                "COMET service returned {}: {}",
                status, body
            )));
        }

        let score: CometScore = response.json().await?;
        info!("COMET score: {:.4}", score.system_score);
        Ok(score)
    }
}

/// Triples from aligned lists, cut to the shortest
pub fn samples(sources: &[String], translations: &[String], references: &[String]) -> Vec<CometSample> {
    sources
        .iter()
        .zip(translations)
        .zip(references)
        .map(|((src, mt), reference)| CometSample {
            src: src.clone(),
            mt: mt.clone(),
            reference: reference.clone(),
        })
        .collect()
}
