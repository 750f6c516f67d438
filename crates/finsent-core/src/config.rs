//! Configuration structures and the run manifest handed between stages.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::LabelMap;
use crate::{Error, Result};

/// Default hub id of the pretrained encoder
pub const DEFAULT_PRETRAINED: &str = "bert-base-uncased";

/// Sequence length used for training and evaluation batches
pub const TRAIN_MAX_SEQ_LEN: usize = 128;

/// Sequence length limit for live inference
pub const INFERENCE_MAX_SEQ_LEN: usize = 512;

/// Main configuration for a fine-tuning run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Model configuration
    pub model: ModelConfig,
    /// Training hyperparameters
    pub training: TrainingParams,
    /// Output configuration
    pub output: OutputConfig,
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.training.epochs == 0 {
            return Err(Error::Config("Number of epochs must be greater than 0".into()));
        }
        if self.training.batch_size == 0 {
            return Err(Error::Config("Batch size must be greater than 0".into()));
        }
        if self.training.learning_rate <= 0.0 {
            return Err(Error::Config("Learning rate must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.training.warmup_fraction) {
            return Err(Error::Config(format!(
                "Warmup fraction must be in [0, 1), got {}",
                self.training.warmup_fraction
            )));
        }
        if self.model.max_seq_len == 0 {
            return Err(Error::Config("Max sequence length must be greater than 0".into()));
        }
        Ok(())
    }
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Hub id or local directory holding `config.json`, `tokenizer.json`
    /// and `pytorch_model.bin`
    pub pretrained: String,
    /// Fixed sequence length of training and evaluation batches
    pub max_seq_len: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            pretrained: DEFAULT_PRETRAINED.to_string(),
            max_seq_len: TRAIN_MAX_SEQ_LEN,
        }
    }
}

/// Training hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    /// Number of training epochs
    pub epochs: usize,
    /// Batch size
    pub batch_size: usize,
    /// Peak learning rate
    pub learning_rate: f64,
    /// Decoupled weight decay for AdamW
    pub weight_decay: f32,
    /// Fraction of optimizer steps spent warming up
    pub warmup_fraction: f64,
    /// Gradient norm clipping value
    pub grad_clip: Option<f32>,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epochs: 4,
            batch_size: 32,
            learning_rate: 2e-5,
            weight_decay: 0.01,
            warmup_fraction: 0.1,
            grad_clip: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory the best checkpoint is written to
    pub checkpoint_dir: PathBuf,
    /// Export per-epoch metrics to CSV
    pub export_csv: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("model"),
            export_csv: true,
        }
    }
}

/// Train/validation split configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SplitConfig {
    /// Fraction of each class held out for validation
    pub validation_fraction: f64,
    /// Seed of the split RNG
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            validation_fraction: 0.2,
            seed: 42,
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(Error::Config(format!(
                "Validation fraction must be in (0, 1), got {}",
                self.validation_fraction
            )));
        }
        Ok(())
    }
}

/// Explicit hand-off between the encode, train and evaluate stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunManifest {
    /// Raw input CSV (`text,label`)
    pub raw_path: PathBuf,
    /// Cleaned and encoded CSV (`clean_news,label_encoded`)
    pub encoded_path: PathBuf,
    /// Label mapping fitted at encoding time
    pub labels: LabelMap,
    /// Split used by both training and evaluation
    pub split: SplitConfig,
    /// Number of encoded rows
    pub num_rows: usize,
    /// Checkpoint directory, filled in by training
    #[serde(default)]
    pub checkpoint_dir: Option<PathBuf>,
}

impl RunManifest {
    pub fn new(
        raw_path: impl Into<PathBuf>,
        encoded_path: impl Into<PathBuf>,
        labels: LabelMap,
        split: SplitConfig,
        num_rows: usize,
    ) -> Self {
        Self {
            raw_path: raw_path.into(),
            encoded_path: encoded_path.into(),
            labels,
            split,
            num_rows,
            checkpoint_dir: None,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("Run manifest saved to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read manifest {}: {e}", path.display()))
        })?;
        let manifest: Self = serde_json::from_str(&json)?;
        manifest.split.validate()?;
        Ok(manifest)
    }
}
