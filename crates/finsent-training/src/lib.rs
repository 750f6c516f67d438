//! Fine-tuning, evaluation and inference for the financial news classifier.
//!
//! The encoder is a BERT stack written as burn modules whose parameter
//! names line up with the hub checkpoint, so pretrained PyTorch weights can
//! be imported directly.

pub mod charts;
pub mod checkpoint;
pub mod evaluator;
pub mod inference;
pub mod lr_schedule;
pub mod model;
pub mod pretrained;
pub mod trainer;

pub use checkpoint::{CheckpointManager, CheckpointMetadata};
pub use evaluator::{predict_dataset, EvaluationReport, Evaluator, Predictions};
pub use inference::{Prediction, SentimentPredictor};
pub use lr_schedule::{LearningRateScheduler, SchedulerType};
pub use model::{BertConfig, BertModel, ClassifierConfig, SentimentClassifier};
pub use pretrained::{load_bert_config, PretrainedFiles};
pub use trainer::{Trainer, TrainerConfig, TrainingState};
