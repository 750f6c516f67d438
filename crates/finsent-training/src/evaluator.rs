//! Model evaluation on a held-out split.
//!
//! Produces accuracy, a per-class classification report, the confusion
//! matrix and one-vs-rest ROC / precision-recall curves, and writes them
//! as `metrics.json` plus three SVG plots.

use std::fs;
use std::path::Path;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::info;

use finsent_core::curves::{one_vs_rest_curves, ClassCurves};
use finsent_core::{ClassificationReport, Error, LabelMap, Result};
use finsent_dataset::{NewsBatcher, NewsDataset};

use crate::charts;
use crate::model::SentimentClassifier;

pub const METRICS_FILE: &str = "metrics.json";
pub const CONFUSION_MATRIX_FILE: &str = "confusion_matrix.svg";
pub const ROC_CURVE_FILE: &str = "roc_curve.svg";
pub const PR_CURVE_FILE: &str = "precision_recall_curve.svg";

/// Model outputs over a dataset, in dataset order
#[derive(Debug, Clone, Default)]
pub struct Predictions {
    pub targets: Vec<usize>,
    pub predictions: Vec<usize>,
    /// Softmax probabilities, one row per example
    pub probabilities: Vec<Vec<f64>>,
}

impl Predictions {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn accuracy(&self) -> f64 {
        if self.targets.is_empty() {
            return 0.0;
        }
        let correct = self
            .targets
            .iter()
            .zip(&self.predictions)
            .filter(|(t, p)| t == p)
            .count();
        correct as f64 / self.targets.len() as f64
    }
}

/// Index of the largest score; ties resolve to the lowest index.
pub(crate) fn argmax(row: &[f64]) -> Option<usize> {
    row.iter()
        .enumerate()
        .rev()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
}

/// Runs the model over `dataset` in order, without gradients.
pub fn predict_dataset<B: Backend>(
    model: &SentimentClassifier<B>,
    dataset: &NewsDataset,
    batch_size: usize,
    device: &B::Device,
    progress: Option<&ProgressBar>,
) -> Result<Predictions> {
    if batch_size == 0 {
        return Err(Error::InvalidArgument("batch_size must be greater than 0".into()));
    }
    let batcher = NewsBatcher::<B>::new(device.clone());
    let len = dataset.len();
    let mut out = Predictions::default();

    for start in (0..len).step_by(batch_size) {
        let end = (start + batch_size).min(len);
        let items: Vec<_> = (start..end).filter_map(|i| dataset.get(i)).collect();
        if items.is_empty() {
            continue;
        }
        out.targets.extend(items.iter().map(|item| item.label));

        let rows = items.len();
        let batch = batcher.batch(items);
        let probs = model.predict_proba(batch.input_ids, batch.attention_mask);
        let num_labels = probs.dims()[1];

        let values: Vec<f32> = probs
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| Error::Model(format!("Failed to read probabilities: {e:?}")))?;

        for row in values.chunks(num_labels).take(rows) {
            let row: Vec<f64> = row.iter().map(|&p| p as f64).collect();
            out.predictions.push(argmax(&row).unwrap_or(0));
            out.probabilities.push(row);
        }

        if let Some(pb) = progress {
            pb.inc(rows as u64);
        }
    }

    Ok(out)
}

/// Evaluation results for one dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub report: ClassificationReport,
    pub curves: Vec<ClassCurves>,
}

impl EvaluationReport {
    pub fn from_predictions(labels: &LabelMap, predictions: &Predictions) -> Result<Self> {
        let report = ClassificationReport::from_predictions(
            labels.names(),
            &predictions.targets,
            &predictions.predictions,
        )?;
        let curves = one_vs_rest_curves(
            labels.names(),
            &predictions.probabilities,
            &predictions.targets,
        );
        Ok(Self { report, curves })
    }

    pub fn accuracy(&self) -> f64 {
        self.report.accuracy
    }

    /// Writes `metrics.json` and the three plots, overwriting earlier output.
    pub fn save(&self, output_dir: &Path) -> Result<()> {
        fs::create_dir_all(output_dir)?;

        let json = serde_json::to_string_pretty(self)?;
        fs::write(output_dir.join(METRICS_FILE), json)?;

        charts::generate_confusion_matrix(
            "Confusion Matrix",
            &self.report.class_names,
            &self.report.confusion_matrix,
            &output_dir.join(CONFUSION_MATRIX_FILE),
        )?;
        charts::generate_roc_chart(&self.curves, &output_dir.join(ROC_CURVE_FILE))?;
        charts::generate_pr_chart(&self.curves, &output_dir.join(PR_CURVE_FILE))?;

        info!("Evaluation results written to {}", output_dir.display());
        Ok(())
    }
}

/// Evaluates a trained classifier
pub struct Evaluator<B: Backend> {
    model: SentimentClassifier<B>,
    labels: LabelMap,
    device: B::Device,
    batch_size: usize,
}

impl<B: Backend> Evaluator<B> {
    pub fn new(
        model: SentimentClassifier<B>,
        labels: LabelMap,
        device: B::Device,
        batch_size: usize,
    ) -> Self {
        Self {
            model,
            labels,
            device,
            batch_size,
        }
    }

    pub fn evaluate(&self, dataset: &NewsDataset) -> Result<EvaluationReport> {
        if dataset.is_empty() {
            return Err(Error::Dataset("Evaluation dataset is empty".into()));
        }
        info!("Evaluating on {} examples", dataset.len());

        let pb = ProgressBar::new(dataset.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} samples ({eta})")
                .map_err(|e| Error::Other(format!("Invalid progress template: {e}")))?
                .progress_chars("=>-"),
        );

        let predictions =
            predict_dataset(&self.model, dataset, self.batch_size, &self.device, Some(&pb))?;
        pb.finish_and_clear();

        let report = EvaluationReport::from_predictions(&self.labels, &predictions)?;
        info!("Accuracy: {:.4}", report.accuracy());
        for curves in &report.curves {
            info!(
                "{}: ROC AUC {:.4}, average precision {:.4}",
                curves.class_name, curves.roc_auc, curves.average_precision
            );
        }
        Ok(report)
    }
}
