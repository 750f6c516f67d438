//! Application state for the sentiment server
//!
//! The model is loaded once at startup. A failed load leaves the server
//! running in the `not_loaded` state instead of exiting.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use finsent_core::{backend_name, default_device, DefaultBackend, Result};
use finsent_training::{Prediction, SentimentPredictor};
use tracing::{info, warn};

/// Anything that can score a single text
pub trait SentimentAnalyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Result<Prediction>;
}

/// Serializes forward passes through a loaded predictor
pub struct PredictorAnalyzer {
    predictor: Mutex<SentimentPredictor<DefaultBackend>>,
}

impl PredictorAnalyzer {
    pub fn new(predictor: SentimentPredictor<DefaultBackend>) -> Self {
        Self {
            predictor: Mutex::new(predictor),
        }
    }
}

impl SentimentAnalyzer for PredictorAnalyzer {
    fn analyze(&self, text: &str) -> Result<Prediction> {
        // A panicking request leaves the predictor itself intact.
        let predictor = self
            .predictor
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        predictor.predict(text)
    }
}

/// Whether a model is available for requests
#[derive(Clone)]
pub enum ModelSlot {
    Loaded(Arc<dyn SentimentAnalyzer>),
    NotLoaded { reason: String },
}

impl ModelSlot {
    pub fn status(&self) -> &'static str {
        match self {
            ModelSlot::Loaded(_) => "loaded",
            ModelSlot::NotLoaded { .. } => "not_loaded",
        }
    }
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding `model.mpk`, `checkpoint.json` and `tokenizer.json`
    pub checkpoint_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            checkpoint_dir: PathBuf::from("model"),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub model: ModelSlot,
    /// Name of the compute device inference runs on
    pub device: String,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(model: ModelSlot, device: impl Into<String>) -> Self {
        Self {
            model,
            device: device.into(),
        }
    }

    /// Loads the checkpoint, degrading to `not_loaded` on any failure.
    pub fn load(config: &ServerConfig) -> Self {
        let device = default_device();
        let loaded = SentimentPredictor::<DefaultBackend>::load(&config.checkpoint_dir, &device);
        let model = match loaded {
            Ok((predictor, metadata)) => {
                info!(
                    "Model loaded from {} (epoch {}, val acc {:.4}, labels {})",
                    config.checkpoint_dir.display(),
                    metadata.epoch,
                    metadata.val_accuracy,
                    metadata.labels
                );
                ModelSlot::Loaded(Arc::new(PredictorAnalyzer::new(predictor)))
            }
            Err(e) => {
                warn!(
                    "Error loading model from {}: {}",
                    config.checkpoint_dir.display(),
                    e
                );
                ModelSlot::NotLoaded {
                    reason: e.to_string(),
                }
            }
        };
        Self::new(model, backend_name())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::Path;

    use finsent_core::LabelMap;
    use finsent_dataset::{word_level_tokenizer, TextEncoder};
    use finsent_training::{BertConfig, CheckpointManager, CheckpointMetadata};
    use tempfile::TempDir;

    /// Writes a small randomly initialised checkpoint into `dir`.
    pub(crate) fn save_tiny_checkpoint(dir: &Path) {
        let tokenizer = word_level_tokenizer(&["up", "down", "flat"]).unwrap();
        let encoder = TextEncoder::fixed_length(tokenizer, 16).unwrap();
        let config = BertConfig {
            vocab_size: encoder.vocab_size(),
            hidden_size: 8,
            num_hidden_layers: 1,
            num_attention_heads: 2,
            intermediate_size: 16,
            hidden_dropout_prob: 0.0,
            attention_probs_dropout_prob: 0.0,
            max_position_embeddings: 32,
            ..Default::default()
        };
        let metadata = CheckpointMetadata::new(
            1,
            0.5,
            0.7,
            1e-5,
            config,
            LabelMap::default(),
            16,
            "local-test",
            42,
        );
        let model = metadata
            .classifier_config()
            .init::<DefaultBackend>(&default_device());
        CheckpointManager::new(dir)
            .save(&model, &metadata, &encoder)
            .unwrap();
    }

    fn config(dir: &Path) -> ServerConfig {
        ServerConfig {
            checkpoint_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_checkpoint_degrades() {
        let dir = TempDir::new().unwrap();
        let state = AppState::load(&config(&dir.path().join("model")));
        assert_eq!(state.model.status(), "not_loaded");
        assert_eq!(state.device, backend_name());
    }

    #[test]
    fn test_saved_checkpoint_loads() {
        let dir = TempDir::new().unwrap();
        save_tiny_checkpoint(dir.path());
        let state = AppState::load(&config(dir.path()));
        assert_eq!(state.model.status(), "loaded");
    }

    #[test]
    fn test_text_longer_than_position_table() {
        let dir = TempDir::new().unwrap();
        save_tiny_checkpoint(dir.path());
        let state = AppState::load(&config(dir.path()));
        let ModelSlot::Loaded(analyzer) = &state.model else {
            panic!("model not loaded");
        };

        let long_text = vec!["up down"; 20].join(" ");
        assert!(analyzer.analyze(&long_text).is_ok());
        assert!(analyzer.analyze("up down").is_ok());
    }

    #[test]
    fn test_poisoned_lock_keeps_serving() {
        let dir = TempDir::new().unwrap();
        save_tiny_checkpoint(dir.path());
        let (predictor, _) =
            SentimentPredictor::<DefaultBackend>::load(dir.path(), &default_device()).unwrap();
        let analyzer = Arc::new(PredictorAnalyzer::new(predictor));

        let held = analyzer.clone();
        let result = std::thread::spawn(move || {
            let _guard = held.predictor.lock().unwrap();
            panic!("forward pass panicked");
        })
        .join();
        assert!(result.is_err());
        assert!(analyzer.predictor.is_poisoned());

        let prediction = analyzer.analyze("up down").unwrap();
        assert_eq!(prediction.all_scores.len(), 3);
    }
}
