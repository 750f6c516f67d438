//! Supervised fine-tuning loop.
//!
//! A custom loop over burn's autodiff API: per epoch one shuffled pass of
//! AdamW updates with a per-step learning rate, then a gradient-free pass
//! over the validation split. The checkpoint is rewritten whenever
//! validation accuracy strictly improves on the best seen so far.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{AdamWConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use finsent_core::{EpochRecord, Error, Result, TrainingHistory, TrainingParams};
use finsent_dataset::{NewsBatcher, NewsDataset, TextEncoder};

use crate::checkpoint::{CheckpointManager, CheckpointMetadata};
use crate::evaluator::predict_dataset;
use crate::lr_schedule::{LearningRateScheduler, SchedulerType};
use crate::model::SentimentClassifier;

/// Hyperparameters of one fine-tuning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub weight_decay: f32,
    pub warmup_fraction: f64,
    pub grad_clip: Option<f32>,
    /// Seeds batch shuffling and backend randomness
    pub seed: u64,
    pub export_history: bool,
}

impl TrainerConfig {
    pub fn from_params(params: &TrainingParams, seed: u64, export_history: bool) -> Self {
        Self {
            epochs: params.epochs,
            batch_size: params.batch_size,
            learning_rate: params.learning_rate,
            weight_decay: params.weight_decay,
            warmup_fraction: params.warmup_fraction,
            grad_clip: params.grad_clip,
            seed,
            export_history,
        }
    }

    pub fn batches_per_epoch(&self, num_examples: usize) -> usize {
        num_examples.div_ceil(self.batch_size.max(1))
    }

    pub fn scheduler(&self, num_examples: usize) -> LearningRateScheduler {
        let total_steps = self.epochs * self.batches_per_epoch(num_examples);
        LearningRateScheduler::new(
            SchedulerType::linear_warmup(total_steps, self.warmup_fraction),
            self.learning_rate,
        )
    }
}

/// Best-so-far bookkeeping across epochs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingState {
    /// Last completed epoch (one-based)
    pub epoch: usize,
    pub best_val_accuracy: f64,
    pub best_epoch: Option<usize>,
    pub history: TrainingHistory,
}

impl TrainingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an epoch; returns whether it beat the best accuracy so far.
    pub fn record_epoch(
        &mut self,
        epoch: usize,
        train_loss: f64,
        val_accuracy: f64,
        learning_rate: f64,
    ) -> bool {
        let improved = val_accuracy > self.best_val_accuracy;
        if improved {
            self.best_val_accuracy = val_accuracy;
            self.best_epoch = Some(epoch);
        }
        self.epoch = epoch;
        self.history.push(EpochRecord {
            epoch,
            train_loss,
            val_accuracy,
            learning_rate,
            improved,
        });
        improved
    }
}

/// Runs the fine-tuning loop and owns checkpoint writes
pub struct Trainer {
    config: TrainerConfig,
    checkpoints: CheckpointManager,
}

impl Trainer {
    pub fn new(config: TrainerConfig, checkpoints: CheckpointManager) -> Self {
        Self {
            config,
            checkpoints,
        }
    }

    /// Fine-tunes `model` for the configured number of epochs.
    ///
    /// `metadata` is the template written with each checkpoint; its epoch
    /// and metric fields are filled in per save.
    pub fn fit<B: AutodiffBackend>(
        &self,
        mut model: SentimentClassifier<B>,
        train: &NewsDataset,
        validation: &NewsDataset,
        encoder: &TextEncoder,
        metadata: &CheckpointMetadata,
        device: &B::Device,
    ) -> Result<TrainingState> {
        let config = &self.config;
        if config.epochs == 0 || config.batch_size == 0 {
            return Err(Error::InvalidArgument(
                "epochs and batch_size must be greater than 0".into(),
            ));
        }
        if train.is_empty() {
            return Err(Error::Training("Training split is empty".into()));
        }
        if validation.is_empty() {
            return Err(Error::Training("Validation split is empty".into()));
        }

        B::seed(config.seed);
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let batcher = NewsBatcher::<B>::new(device.clone());
        let loss_fn = CrossEntropyLossConfig::new().init(device);
        let mut optimizer = AdamWConfig::new()
            .with_weight_decay(config.weight_decay)
            .with_grad_clipping(config.grad_clip.map(GradientClippingConfig::Norm))
            .init();

        let num_batches = config.batches_per_epoch(train.len());
        let scheduler = config.scheduler(train.len());
        let mut step = 0usize;
        let mut state = TrainingState::new();

        info!(
            "Training on {} examples, validating on {} ({} epochs, {} batches per epoch)",
            train.len(),
            validation.len(),
            config.epochs,
            num_batches
        );

        for epoch in 1..=config.epochs {
            let pb = ProgressBar::new(num_batches as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches {msg}")
                    .map_err(|e| Error::Other(format!("Invalid progress template: {e}")))?
                    .progress_chars("=>-"),
            );
            pb.set_message(format!("epoch {epoch}/{}", config.epochs));

            let mut indices: Vec<usize> = (0..train.len()).collect();
            indices.shuffle(&mut rng);

            let mut epoch_loss = 0.0f64;
            let mut lr = scheduler.lr_at(step);

            for chunk in indices.chunks(config.batch_size) {
                let items: Vec<_> = chunk.iter().filter_map(|&i| train.get(i)).collect();
                if items.is_empty() {
                    continue;
                }
                let batch = batcher.batch(items);

                let logits = model.forward(batch.input_ids, batch.attention_mask);
                let loss = loss_fn.forward(logits, batch.targets);
                let loss_value: f64 = loss.clone().into_scalar().elem();
                if !loss_value.is_finite() {
                    return Err(Error::Training(format!(
                        "Non-finite loss at epoch {epoch}, step {step}"
                    )));
                }
                epoch_loss += loss_value;

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                lr = scheduler.lr_at(step);
                model = optimizer.step(lr, model, grads);
                step += 1;

                debug!("step {step}: loss {loss_value:.4}, lr {lr:.3e}");
                pb.set_message(format!("epoch {epoch}/{} loss {loss_value:.4}", config.epochs));
                pb.inc(1);
            }
            pb.finish_and_clear();

            let train_loss = epoch_loss / num_batches.max(1) as f64;
            let inner = model.valid();
            let val_accuracy =
                predict_dataset(&inner, validation, config.batch_size, device, None)?.accuracy();

            let improved = state.record_epoch(epoch, train_loss, val_accuracy, lr);
            info!(
                "Epoch {}/{}: train loss {:.4}, val acc {:.4}{}",
                epoch,
                config.epochs,
                train_loss,
                val_accuracy,
                if improved { " (best)" } else { "" }
            );

            if improved {
                let mut meta = metadata.clone();
                meta.epoch = epoch;
                meta.val_accuracy = val_accuracy;
                meta.train_loss = train_loss;
                meta.learning_rate = lr;
                meta.timestamp = Utc::now().to_rfc3339();
                meta.seed = config.seed;
                self.checkpoints.save(&inner, &meta, encoder)?;
            }
        }

        match state.best_epoch {
            Some(best) => info!(
                "Training complete: best val acc {:.4} at epoch {}",
                state.best_val_accuracy, best
            ),
            None => warn!(
                "Validation accuracy never rose above 0; no checkpoint was written to {}",
                self.checkpoints.checkpoint_dir().display()
            ),
        }

        if config.export_history {
            std::fs::create_dir_all(self.checkpoints.checkpoint_dir())?;
            let path = self.checkpoints.history_path();
            state.history.export_csv(&path)?;
            info!("Training history written to {}", path.display());
        }

        Ok(state)
    }
}
