//! Checkpoint directory management.
//!
//! A checkpoint directory holds:
//! - `model.mpk`: burn compact record of the full classifier
//! - `checkpoint.json`: metadata needed to rebuild and interpret the model
//! - `tokenizer.json`: the tokenizer the model was trained with
//!
//! Saving overwrites the previous contents in place.

use std::fs;
use std::path::{Path, PathBuf};

use burn::prelude::*;
use burn::record::CompactRecorder;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use finsent_core::{Error, LabelMap, Result};
use finsent_dataset::TextEncoder;

use crate::model::{BertConfig, ClassifierConfig, SentimentClassifier};

pub const MODEL_FILE: &str = "model";
pub const METADATA_FILE: &str = "checkpoint.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const HISTORY_FILE: &str = "training_metrics.csv";

/// Metadata stored next to the model record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// One-based epoch that produced the checkpoint
    pub epoch: usize,
    pub val_accuracy: f64,
    pub train_loss: f64,
    pub learning_rate: f64,
    pub timestamp: String,
    pub encoder: BertConfig,
    /// Falls back to the standard sentiment labels when absent
    #[serde(default)]
    pub labels: LabelMap,
    pub max_seq_len: usize,
    pub pretrained: String,
    pub seed: u64,
    pub num_parameters: usize,
}

impl CheckpointMetadata {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        epoch: usize,
        val_accuracy: f64,
        train_loss: f64,
        learning_rate: f64,
        encoder: BertConfig,
        labels: LabelMap,
        max_seq_len: usize,
        pretrained: impl Into<String>,
        seed: u64,
    ) -> Self {
        Self {
            epoch,
            val_accuracy,
            train_loss,
            learning_rate,
            timestamp: Utc::now().to_rfc3339(),
            encoder,
            labels,
            max_seq_len,
            pretrained: pretrained.into(),
            seed,
            num_parameters: 0,
        }
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig::new(self.encoder.clone(), self.labels.len())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize checkpoint: {e}")))?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| Error::Serialization(format!("Failed to deserialize checkpoint: {e}")))
    }
}

/// Reads and writes the single best-model checkpoint of a run
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    checkpoint_dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
        }
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.checkpoint_dir.join(MODEL_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.checkpoint_dir.join(METADATA_FILE)
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.checkpoint_dir.join(TOKENIZER_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.checkpoint_dir.join(HISTORY_FILE)
    }

    /// Whether a complete checkpoint is present
    pub fn exists(&self) -> bool {
        self.metadata_path().is_file()
            && self.tokenizer_path().is_file()
            && self.model_path().with_extension("mpk").is_file()
    }

    /// Writes model, metadata and tokenizer, replacing any previous checkpoint.
    pub fn save<B: Backend>(
        &self,
        model: &SentimentClassifier<B>,
        metadata: &CheckpointMetadata,
        encoder: &TextEncoder,
    ) -> Result<()> {
        fs::create_dir_all(&self.checkpoint_dir)?;

        model
            .clone()
            .save_file(self.model_path(), &CompactRecorder::new())?;

        let mut metadata = metadata.clone();
        metadata.num_parameters = model.num_params();
        metadata.save(&self.metadata_path())?;
        encoder.save(&self.tokenizer_path())?;

        info!(
            "Checkpoint saved to {} (epoch {}, val acc {:.4})",
            self.checkpoint_dir.display(),
            metadata.epoch,
            metadata.val_accuracy
        );
        Ok(())
    }

    pub fn load_metadata(&self) -> Result<CheckpointMetadata> {
        let path = self.metadata_path();
        if !path.is_file() {
            return Err(Error::NotFound(format!(
                "No checkpoint metadata at {}",
                path.display()
            )));
        }
        CheckpointMetadata::load(&path)
    }

    /// Rebuilds the classifier from metadata and loads its record.
    pub fn load_model<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<(SentimentClassifier<B>, CheckpointMetadata)> {
        let metadata = self.load_metadata()?;
        let record_path = self.model_path().with_extension("mpk");
        if !record_path.is_file() {
            return Err(Error::NotFound(format!(
                "No model record at {}",
                record_path.display()
            )));
        }

        let model = metadata
            .classifier_config()
            .init::<B>(device)
            .load_file(self.model_path(), &CompactRecorder::new(), device)?;

        info!(
            "Loaded checkpoint from {} (epoch {}, val acc {:.4})",
            self.checkpoint_dir.display(),
            metadata.epoch,
            metadata.val_accuracy
        );
        Ok((model, metadata))
    }

    /// Loads the saved tokenizer configured with the given length policy.
    pub fn load_encoder(&self, max_len: usize, pad_to_max: bool) -> Result<TextEncoder> {
        let path = self.tokenizer_path();
        if !path.is_file() {
            return Err(Error::NotFound(format!("No tokenizer at {}", path.display())));
        }
        TextEncoder::from_file(&path, max_len, pad_to_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::tiny_config;
    use burn::backend::NdArray;
    use finsent_dataset::word_level_tokenizer;
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    fn metadata() -> CheckpointMetadata {
        CheckpointMetadata::new(
            2,
            0.75,
            0.4,
            1e-5,
            tiny_config(10),
            LabelMap::default(),
            16,
            "local-test",
            42,
        )
    }

    fn encoder() -> TextEncoder {
        let tokenizer = word_level_tokenizer(&["up", "down", "flat"]).unwrap();
        TextEncoder::fixed_length(tokenizer, 16).unwrap()
    }

    #[test]
    fn test_metadata_defaults_labels() {
        let mut value = serde_json::to_value(metadata()).unwrap();
        value.as_object_mut().unwrap().remove("labels");
        let parsed: CheckpointMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.labels, LabelMap::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let manager = CheckpointManager::new(dir.path().join("model"));
        assert!(!manager.exists());

        let device = Default::default();
        let meta = metadata();
        let model = meta.classifier_config().init::<TestBackend>(&device);
        manager.save(&model, &meta, &encoder()).unwrap();
        assert!(manager.exists());

        let (loaded, loaded_meta) = manager.load_model::<TestBackend>(&device).unwrap();
        assert_eq!(loaded_meta.epoch, 2);
        assert_eq!(loaded_meta.labels, LabelMap::default());
        assert_eq!(loaded_meta.num_parameters, model.num_params());

        let ids = Tensor::<TestBackend, 2, Int>::from_data(
            TensorData::new(vec![2i64, 4, 5, 3], [1, 4]),
            &device,
        );
        let mask = Tensor::<TestBackend, 2, Int>::ones([1, 4], &device);
        let expected: Vec<f32> = model
            .forward(ids.clone(), mask.clone())
            .into_data()
            .convert::<f32>()
            .to_vec()
            .unwrap();
        let actual: Vec<f32> = loaded
            .forward(ids, mask)
            .into_data()
            .convert::<f32>()
            .to_vec()
            .unwrap();
        for (a, b) in expected.iter().zip(&actual) {
            // compact records store half precision weights
            assert!((a - b).abs() < 1e-2);
        }

        let reloaded = manager.load_encoder(16, true).unwrap();
        assert_eq!(
            reloaded.encode("up down").unwrap(),
            encoder().encode("up down").unwrap()
        );
    }

    #[test]
    fn test_missing_checkpoint() {
        let dir = TempDir::new().unwrap();
        let manager = CheckpointManager::new(dir.path());
        assert!(matches!(manager.load_metadata(), Err(Error::NotFound(_))));
        assert!(manager.load_model::<TestBackend>(&Default::default()).is_err());
    }

    #[test]
    fn test_corrupt_record_is_an_error() {
        let dir = TempDir::new().unwrap();
        let manager = CheckpointManager::new(dir.path());
        metadata().save(&manager.metadata_path()).unwrap();
        fs::write(manager.model_path().with_extension("mpk"), b"not a record").unwrap();
        assert!(manager.load_model::<TestBackend>(&Default::default()).is_err());
    }
}
