//! Single-text inference with a fine-tuned checkpoint.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use burn::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use finsent_core::{Error, LabelMap, Result, INFERENCE_MAX_SEQ_LEN};
use finsent_dataset::TextEncoder;

use crate::checkpoint::{CheckpointManager, CheckpointMetadata};
use crate::evaluator::argmax;
use crate::model::SentimentClassifier;

/// Result of classifying one text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Arg-max label name
    pub label: String,
    /// Probability of `label`
    pub score: f64,
    /// Full distribution keyed by label name
    pub all_scores: BTreeMap<String, f64>,
}

impl Prediction {
    /// Builds a prediction from a probability row indexed like `labels`.
    pub fn from_probabilities(probabilities: &[f64], labels: &LabelMap) -> Result<Self> {
        if probabilities.len() != labels.len() {
            return Err(Error::Model(format!(
                "Model produced {} scores for {} labels",
                probabilities.len(),
                labels.len()
            )));
        }
        let best =
            argmax(probabilities).ok_or_else(|| Error::Model("Model produced no scores".into()))?;
        let score = probabilities[best];

        let all_scores = labels
            .names()
            .iter()
            .cloned()
            .zip(probabilities.iter().copied())
            .collect();

        Ok(Self {
            label: labels.decode(best)?.to_string(),
            score,
            all_scores,
        })
    }
}

/// A loaded classifier with its tokenizer and label names
pub struct SentimentPredictor<B: Backend> {
    model: SentimentClassifier<B>,
    encoder: TextEncoder,
    labels: LabelMap,
    device: B::Device,
}

impl<B: Backend> SentimentPredictor<B> {
    pub fn new(
        model: SentimentClassifier<B>,
        encoder: TextEncoder,
        labels: LabelMap,
        device: B::Device,
    ) -> Self {
        Self {
            model,
            encoder,
            labels,
            device,
        }
    }

    /// Loads model, tokenizer and label map from a checkpoint directory.
    ///
    /// Texts are never padded. They are truncated at 512 tokens, or at the
    /// encoder's position table size when that is smaller.
    pub fn load(checkpoint_dir: &Path, device: &B::Device) -> Result<(Self, CheckpointMetadata)> {
        let manager = CheckpointManager::new(checkpoint_dir);
        let (model, metadata) = manager.load_model::<B>(device)?;
        let max_len = INFERENCE_MAX_SEQ_LEN.min(metadata.encoder.max_position_embeddings);
        let encoder = manager.load_encoder(max_len, false)?;
        let predictor = Self::new(model, encoder, metadata.labels.clone(), device.clone());
        Ok((predictor, metadata))
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    pub fn predict(&self, text: &str) -> Result<Prediction> {
        let start = Instant::now();
        let encoded = self.encoder.encode(text)?;
        let len = encoded.input_ids.len();
        if len == 0 {
            return Err(Error::Tokenizer("Text produced no tokens".into()));
        }

        let to_tensor = |values: &[u32]| {
            let data: Vec<i64> = values.iter().map(|&v| v as i64).collect();
            Tensor::<B, 2, Int>::from_data(TensorData::new(data, [1, len]), &self.device)
        };
        let input_ids = to_tensor(&encoded.input_ids);
        let attention_mask = to_tensor(&encoded.attention_mask);

        let probabilities: Vec<f64> = self
            .model
            .predict_proba(input_ids, attention_mask)
            .into_data()
            .convert::<f64>()
            .to_vec()
            .map_err(|e| Error::Model(format!("Failed to read probabilities: {e:?}")))?;

        let prediction = Prediction::from_probabilities(&probabilities, &self.labels)?;
        debug!(
            "Predicted {} ({:.4}) for {} tokens in {:.1} ms",
            prediction.label,
            prediction.score,
            len,
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(prediction)
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

    fn predictor() -> SentimentPredictor<TestBackend> {
        let device = Default::default();
        let tokenizer = word_level_tokenizer(&["profit", "loss", "shares", "rose"]).unwrap();
        let encoder = TextEncoder::truncating(tokenizer, 16).unwrap();
        let model = crate::model::ClassifierConfig::new(tiny_config(encoder.vocab_size()), 3)
            .init::<TestBackend>(&device);
        SentimentPredictor::new(model, encoder, LabelMap::default(), device)
    }

    #[test]
    fn test_prediction_is_argmax_of_distribution() {
        let prediction = predictor().predict("Shares rose on record profit").unwrap();
        let total: f64 = prediction.all_scores.values().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert_eq!(prediction.all_scores.len(), 3);

        let max = prediction
            .all_scores
            .values()
            .cloned()
            .fold(f64::MIN, f64::max);
        assert_eq!(prediction.score, max);
        assert_eq!(prediction.all_scores[&prediction.label], prediction.score);
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let predictor = predictor();
        let a = predictor.predict("loss widened").unwrap();
        let b = predictor.predict("loss widened").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_probabilities() {
        let prediction =
            Prediction::from_probabilities(&[0.1, 0.2, 0.7], &LabelMap::default()).unwrap();
        assert_eq!(prediction.label, "positive");
        assert_eq!(prediction.score, 0.7);
        assert_eq!(prediction.all_scores["negative"], 0.1);

        assert!(Prediction::from_probabilities(&[0.5, 0.5], &LabelMap::default()).is_err());

        let tied =
            Prediction::from_probabilities(&[0.4, 0.4, 0.2], &LabelMap::default()).unwrap();
        assert_eq!(tied.label, "negative");
    }

    #[test]
    fn test_load_truncates_to_position_table() {
        let dir = TempDir::new().unwrap();
        let device = Default::default();
        let tokenizer = word_level_tokenizer(&["up", "down"]).unwrap();
        let encoder = TextEncoder::fixed_length(tokenizer, 16).unwrap();
        let config = tiny_config(encoder.vocab_size());
        assert_eq!(config.max_position_embeddings, 32);

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
        let model = metadata.classifier_config().init::<TestBackend>(&device);
        let manager = CheckpointManager::new(dir.path());
        manager.save(&model, &metadata, &encoder).unwrap();

        let (predictor, _) = SentimentPredictor::<TestBackend>::load(dir.path(), &device).unwrap();
        let long_text = vec!["up down"; 20].join(" ");
        let prediction = predictor.predict(&long_text).unwrap();
        assert!((prediction.all_scores.values().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!(predictor.predict("up down").is_ok());
    }

    #[test]
    fn test_load_from_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let result = SentimentPredictor::<TestBackend>::load(
            &dir.path().join("missing"),
            &Default::default(),
        );
        assert!(result.is_err());
    }
}
