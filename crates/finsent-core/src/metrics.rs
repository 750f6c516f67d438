//! Classification metrics and training history.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

use crate::{Error, Result};

/// Precision, recall, F1 and support of a single class
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of true samples of the class
    pub support: usize,
}

impl ClassMetrics {
    fn from_counts(true_positives: usize, predicted: usize, support: usize) -> Self {
        let precision = ratio(true_positives, predicted);
        let recall = ratio(true_positives, support);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
            support,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Per-class report with overall accuracy and averaged scores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Class names, index aligned with `per_class`
    pub class_names: Vec<String>,
    pub per_class: Vec<ClassMetrics>,
    /// Unweighted mean over classes
    pub macro_avg: ClassMetrics,
    /// Mean weighted by support
    pub weighted_avg: ClassMetrics,
    pub accuracy: f64,
    /// Confusion matrix (actual x predicted)
    pub confusion_matrix: Vec<Vec<usize>>,
    /// Total number of samples evaluated
    pub num_samples: usize,
}

impl ClassificationReport {
    /// Builds the report from true and predicted class indices.
    pub fn from_predictions(
        class_names: &[String],
        targets: &[usize],
        predictions: &[usize],
    ) -> Result<Self> {
        if targets.len() != predictions.len() {
            return Err(Error::InvalidArgument(format!(
                "Got {} targets but {} predictions",
                targets.len(),
                predictions.len()
            )));
        }

        let num_classes = class_names.len();
        let mut confusion_matrix = vec![vec![0usize; num_classes]; num_classes];
        for (&actual, &predicted) in targets.iter().zip(predictions) {
            if actual >= num_classes || predicted >= num_classes {
                return Err(Error::InvalidArgument(format!(
                    "Class index out of range: actual {actual}, predicted {predicted}, num classes {num_classes}"
                )));
            }
            confusion_matrix[actual][predicted] += 1;
        }

        Ok(Self::from_confusion_matrix(
            class_names.to_vec(),
            confusion_matrix,
        ))
    }

    /// Computes all scores from a square confusion matrix.
    pub fn from_confusion_matrix(
        class_names: Vec<String>,
        confusion_matrix: Vec<Vec<usize>>,
    ) -> Self {
        let num_classes = confusion_matrix.len();
        let num_samples: usize = confusion_matrix.iter().flatten().sum();
        let correct: usize = (0..num_classes).map(|i| confusion_matrix[i][i]).sum();

        let per_class: Vec<ClassMetrics> = (0..num_classes)
            .map(|class_id| {
                let support: usize = confusion_matrix[class_id].iter().sum();
                let predicted: usize =
                    (0..num_classes).map(|i| confusion_matrix[i][class_id]).sum();
                ClassMetrics::from_counts(confusion_matrix[class_id][class_id], predicted, support)
            })
            .collect();

        let macro_avg = average(&per_class, |_| 1.0, num_samples);
        let weighted_avg = average(&per_class, |m| m.support as f64, num_samples);

        Self {
            class_names,
            per_class,
            macro_avg,
            weighted_avg,
            accuracy: ratio(correct, num_samples),
            confusion_matrix,
            num_samples,
        }
    }

    /// Renders the report as an aligned text table.
    pub fn to_text(&self) -> String {
        let width = self
            .class_names
            .iter()
            .map(String::len)
            .chain(["weighted avg".len()])
            .max()
            .unwrap_or(12);

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}\n",
            "", "precision", "recall", "f1-score", "support"
        );
        for (name, m) in self.class_names.iter().zip(&self.per_class) {
            let _ = writeln!(
                out,
                "{:>width$} {:>9.4} {:>9.4} {:>9.4} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:>width$} {:>9} {:>9} {:>9.4} {:>9}",
            "accuracy", "", "", self.accuracy, self.num_samples
        );
        for (name, m) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            let _ = writeln!(
                out,
                "{:>width$} {:>9.4} {:>9.4} {:>9.4} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            );
        }
        out
    }
}

fn average(
    per_class: &[ClassMetrics],
    weight: impl Fn(&ClassMetrics) -> f64,
    num_samples: usize,
) -> ClassMetrics {
    let total: f64 = per_class.iter().map(&weight).sum();
    if total == 0.0 {
        return ClassMetrics {
            support: num_samples,
            ..Default::default()
        };
    }
    let mean = |f: fn(&ClassMetrics) -> f64| {
        per_class.iter().map(|m| weight(m) * f(m)).sum::<f64>() / total
    };
    ClassMetrics {
        precision: mean(|m| m.precision),
        recall: mean(|m| m.recall),
        f1: mean(|m| m.f1),
        support: num_samples,
    }
}

/// Metrics recorded at the end of one training epoch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EpochRecord {
    /// One-based epoch number
    pub epoch: usize,
    pub train_loss: f64,
    pub val_accuracy: f64,
    /// Learning rate used by the last optimizer step of the epoch
    pub learning_rate: f64,
    /// Whether this epoch produced a new checkpoint
    pub improved: bool,
}

/// Training metrics tracked over a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochRecord>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: EpochRecord) {
        self.epochs.push(record);
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Writes the history as CSV with one row per epoch.
    pub fn export_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.epochs {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names() -> Vec<String> {
        vec!["negative".into(), "neutral".into(), "positive".into()]
    }

    #[test]
    fn test_perfect_predictions() {
        let targets = vec![0, 1, 2, 2, 1];
        let report = ClassificationReport::from_predictions(&names(), &targets, &targets).unwrap();
        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.macro_avg.f1, 1.0);
        assert_eq!(report.weighted_avg.precision, 1.0);
        assert_eq!(report.confusion_matrix[2][2], 2);
    }

    #[test]
    fn test_hand_computed_report() {
        // actual x predicted
        // neg: 2 correct, 1 as neutral
        // neu: 1 correct
        // pos: 1 as negative, 1 correct
        let targets = vec![0, 0, 0, 1, 2, 2];
        let predictions = vec![0, 0, 1, 1, 0, 2];
        let report =
            ClassificationReport::from_predictions(&names(), &targets, &predictions).unwrap();

        assert_eq!(report.num_samples, 6);
        assert!((report.accuracy - 4.0 / 6.0).abs() < 1e-12);
        assert_eq!(report.confusion_matrix, vec![vec![2, 1, 0], vec![0, 1, 0], vec![1, 0, 1]]);

        let neg = report.per_class[0];
        assert!((neg.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((neg.recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(neg.support, 3);

        let neu = report.per_class[1];
        assert!((neu.precision - 0.5).abs() < 1e-12);
        assert_eq!(neu.recall, 1.0);

        let pos = report.per_class[2];
        assert_eq!(pos.precision, 1.0);
        assert_eq!(pos.recall, 0.5);

        let macro_recall = (2.0 / 3.0 + 1.0 + 0.5) / 3.0;
        assert!((report.macro_avg.recall - macro_recall).abs() < 1e-12);
        // weighted recall equals accuracy
        assert!((report.weighted_avg.recall - report.accuracy).abs() < 1e-12);
    }

    #[test]
    fn test_undefined_scores_are_zero() {
        let targets = vec![0, 0];
        let predictions = vec![0, 0];
        let report =
            ClassificationReport::from_predictions(&names(), &targets, &predictions).unwrap();
        assert_eq!(report.per_class[1].precision, 0.0);
        assert_eq!(report.per_class[1].recall, 0.0);
        assert_eq!(report.per_class[1].f1, 0.0);
    }

    #[test]
    fn test_mismatched_lengths() {
        assert!(ClassificationReport::from_predictions(&names(), &[0, 1], &[0]).is_err());
        assert!(ClassificationReport::from_predictions(&names(), &[5], &[0]).is_err());
    }

    #[test]
    fn test_text_report_lists_classes() {
        let targets = vec![0, 1, 2];
        let report = ClassificationReport::from_predictions(&names(), &targets, &targets).unwrap();
        let text = report.to_text();
        assert!(text.contains("precision"));
        assert!(text.contains("neutral"));
        assert!(text.contains("weighted avg"));
    }

    #[test]
    fn test_training_history() {
        let mut history = TrainingHistory::new();
        for (epoch, acc) in [(1, 0.6), (2, 0.8), (3, 0.8)] {
            history.push(EpochRecord {
                epoch,
                train_loss: 1.0 / epoch as f64,
                val_accuracy: acc,
                learning_rate: 1e-5,
                improved: epoch < 3,
            });
        }

        assert_eq!(history.len(), 3);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("training_metrics.csv");
        history.export_csv(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("epoch,train_loss,val_accuracy,learning_rate,improved"));
        assert_eq!(content.lines().count(), 4);
    }
}
