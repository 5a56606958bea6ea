use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::Result;

/// Persisted run: parameters, metrics and provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub experiment: String,
    pub run_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub git_commit: Option<String>,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
}

/// Collects one run and writes it as JSON under the experiment directory
pub struct RunRecorder {
    dir: PathBuf,
    record: RunRecord,
}

impl RunRecorder {
    pub fn new(tracking_dir: &Path, experiment: &str, run_name: &str) -> Self {
        Self {
            dir: tracking_dir.join(experiment),
            record: RunRecord {
                id: Uuid::new_v4(),
                experiment: experiment.to_string(),
                run_name: run_name.to_string(),
                started_at: Utc::now(),
                finished_at: None,
                git_commit: git_commit(),
                params: BTreeMap::new(),
                metrics: BTreeMap::new(),
            },
        }
    }

    /// New run named after the configuration, with every config field as a parameter
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut recorder = Self::new(&config.tracking_dir, &config.experiment_name, &config.run_name);
        for (key, value) in config.params() {
            recorder.log_param(key, value);
        }
        recorder
    }

    pub fn log_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        debug!("param {}: {}", key, value);
        self.record.params.insert(key, value);
    }

    pub fn log_metric(&mut self, key: impl Into<String>, value: f64) {
        let key = key.into();
        info!("metric {}: {}", key, value);
        self.record.metrics.insert(key, value);
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    /// Directory holding this run's record and artifacts
    pub fn run_dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}-{}.json", self.record.run_name, self.record.id))
    }

    pub fn finish(mut self) -> Result<PathBuf> {
        self.record.finished_at = Some(Utc::now());
        std::fs::create_dir_all(&self.dir)?;
        let path = self.record_path();
        std::fs::write(&path, serde_json::to_string_pretty(&self.record)?)?;
        info!("Run record saved to {}", path.display());
        Ok(path)
    }
}

/// Current commit of the enclosing git repository, if any
pub fn git_commit() -> Option<String> {
    let output = Command::new("git").args(["rev-parse", "HEAD"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let commit = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!commit.is_empty()).then_some(commit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_written_under_experiment() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.tracking_dir = dir.path().to_path_buf();
        config.experiment_name = "flores".to_string();
        config.run_name = "en-fr".to_string();

        let mut recorder = RunRecorder::from_config(&config);
        recorder.log_param("eval_dataset", "dev");
        recorder.log_metric("bleu_score", 41.2);
        let path = recorder.finish().unwrap();

        assert!(path.starts_with(dir.path().join("flores")));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("en-fr-"));

        let saved: RunRecord = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.metrics["bleu_score"], 41.2);
        assert_eq!(saved.params["eval_dataset"], "dev");
        assert_eq!(saved.params["batch_size"], "1024");
        assert!(saved.finished_at.is_some());
    }
}
