//! One-vs-rest ROC and precision-recall curves.

use serde::{Deserialize, Serialize};

/// Points of a ROC curve, ordered by decreasing threshold
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

/// Points of a precision-recall curve, ordered by decreasing threshold
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PrCurve {
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    pub thresholds: Vec<f64>,
}

/// Curves and summary scores of one class against the rest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassCurves {
    pub class_name: String,
    pub roc: RocCurve,
    pub roc_auc: f64,
    pub pr: PrCurve,
    pub average_precision: f64,
}

/// Cumulative true/false positive counts at every distinct score,
/// walking from the highest score down.
fn cumulative_counts(scores: &[f64], positives: &[bool]) -> Vec<(f64, usize, usize)> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut points = Vec::new();
    let (mut tp, mut fp) = (0usize, 0usize);
    for (pos, &idx) in order.iter().enumerate() {
        if positives[idx] {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_threshold = order
            .get(pos + 1)
            .map_or(true, |&next| scores[next] != scores[idx]);
        if last_of_threshold {
            points.push((scores[idx], tp, fp));
        }
    }
    points
}

/// ROC curve of binary targets against scores.
///
/// The curve starts at `(0, 0)` with an infinite threshold. When a class
/// has no positives (or no negatives) the corresponding rate stays 0.
pub fn roc_curve(scores: &[f64], positives: &[bool]) -> RocCurve {
    let points = cumulative_counts(scores, positives);
    let total_pos = positives.iter().filter(|&&p| p).count();
    let total_neg = positives.len() - total_pos;
    let rate = |count: usize, total: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64
        }
    };

    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    for (threshold, tp, fp) in points {
        curve.fpr.push(rate(fp, total_neg));
        curve.tpr.push(rate(tp, total_pos));
        curve.thresholds.push(threshold);
    }
    curve
}

/// Precision-recall curve of binary targets against scores.
///
/// Ends with the conventional point `(recall 0, precision 1)`; points are
/// ordered by increasing threshold, so recall is non-increasing.
pub fn precision_recall_curve(scores: &[f64], positives: &[bool]) -> PrCurve {
    let points = cumulative_counts(scores, positives);
    let total_pos = positives.iter().filter(|&&p| p).count();

    let mut curve = PrCurve::default();
    // stop once full recall is reached, as lower thresholds add nothing
    let last = points
        .iter()
        .position(|&(_, tp, _)| tp == total_pos)
        .unwrap_or(points.len().saturating_sub(1));

    for &(threshold, tp, fp) in points.iter().take(last + 1).rev() {
        let precision = if tp + fp == 0 {
            1.0
        } else {
            tp as f64 / (tp + fp) as f64
        };
        let recall = if total_pos == 0 {
            0.0
        } else {
            tp as f64 / total_pos as f64
        };
        curve.precision.push(precision);
        curve.recall.push(recall);
        curve.thresholds.push(threshold);
    }
    curve.precision.push(1.0);
    curve.recall.push(0.0);
    curve
}

/// Area under a curve by the trapezoidal rule.
pub fn auc(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum::<f64>()
        .abs()
}

/// Average precision: `sum((R_n - R_{n-1}) * P_n)` over the PR points.
pub fn average_precision(curve: &PrCurve) -> f64 {
    // points run from high recall to (0, 1), so walk them backwards
    let n = curve.recall.len();
    (1..n)
        .rev()
        .map(|i| (curve.recall[i - 1] - curve.recall[i]) * curve.precision[i - 1])
        .sum()
}

/// Builds one-vs-rest curves for every class from row-wise probabilities.
pub fn one_vs_rest_curves(
    class_names: &[String],
    probabilities: &[Vec<f64>],
    targets: &[usize],
) -> Vec<ClassCurves> {
    class_names
        .iter()
        .enumerate()
        .map(|(class_id, name)| {
            let scores: Vec<f64> = probabilities
                .iter()
                .map(|row| row.get(class_id).copied().unwrap_or(0.0))
                .collect();
            let positives: Vec<bool> = targets.iter().map(|&t| t == class_id).collect();

            let roc = roc_curve(&scores, &positives);
            let roc_auc = auc(&roc.fpr, &roc.tpr);
            let pr = precision_recall_curve(&scores, &positives);
            let average_precision = average_precision(&pr);

            ClassCurves {
                class_name: name.clone(),
                roc,
                roc_auc,
                pr,
                average_precision,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roc_perfect_separation() {
        let scores = [0.9, 0.8, 0.3, 0.1];
        let positives = [true, true, false, false];
        let roc = roc_curve(&scores, &positives);

        assert_eq!(roc.fpr[0], 0.0);
        assert_eq!(roc.tpr[0], 0.0);
        assert_eq!(*roc.fpr.last().unwrap(), 1.0);
        assert_eq!(*roc.tpr.last().unwrap(), 1.0);
        assert!((auc(&roc.fpr, &roc.tpr) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_roc_hand_computed() {
        let scores = [0.1, 0.4, 0.35, 0.8];
        let positives = [false, false, true, true];
        let roc = roc_curve(&scores, &positives);

        assert_eq!(roc.tpr, vec![0.0, 0.5, 0.5, 1.0, 1.0]);
        assert_eq!(roc.fpr, vec![0.0, 0.0, 0.5, 0.5, 1.0]);
        assert!((auc(&roc.fpr, &roc.tpr) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_tied_scores_share_a_point() {
        let scores = [0.5, 0.5, 0.5];
        let positives = [true, false, true];
        let roc = roc_curve(&scores, &positives);
        assert_eq!(roc.thresholds.len(), 2);
        assert!((auc(&roc.fpr, &roc.tpr) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_pr_hand_computed() {
        let scores = [0.1, 0.4, 0.35, 0.8];
        let positives = [false, false, true, true];
        let pr = precision_recall_curve(&scores, &positives);

        assert_eq!(pr.recall, vec![1.0, 0.5, 0.5, 0.0]);
        let expected_precision = [2.0 / 3.0, 0.5, 1.0, 1.0];
        for (p, e) in pr.precision.iter().zip(expected_precision) {
            assert!((p - e).abs() < 1e-12);
        }
        assert!((average_precision(&pr) - (0.5 + 0.5 * 2.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_pr_perfect_separation() {
        let scores = [0.9, 0.8, 0.3, 0.1];
        let positives = [true, true, false, false];
        let pr = precision_recall_curve(&scores, &positives);
        assert!((average_precision(&pr) - 1.0).abs() < 1e-12);
        assert_eq!(*pr.recall.last().unwrap(), 0.0);
        assert_eq!(*pr.precision.last().unwrap(), 1.0);
    }

    #[test]
    fn test_one_vs_rest() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let probabilities = vec![
            vec![0.8, 0.1, 0.1],
            vec![0.1, 0.7, 0.2],
            vec![0.2, 0.2, 0.6],
            vec![0.6, 0.3, 0.1],
        ];
        let targets = vec![0, 1, 2, 0];
        let curves = one_vs_rest_curves(&names, &probabilities, &targets);

        assert_eq!(curves.len(), 3);
        for class in &curves {
            assert!((class.roc_auc - 1.0).abs() < 1e-12, "{}", class.class_name);
            assert!((class.average_precision - 1.0).abs() < 1e-12);
        }
    }
}
