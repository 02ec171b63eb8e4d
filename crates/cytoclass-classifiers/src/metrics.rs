//! Classification evaluation metrics.
//!
//! Confusion matrix, accuracy, per-class precision / recall / F1 and their
//! macro and support-weighted averages. A metric whose denominator is zero is
//! reported as 0.0.

use std::fmt;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

fn check_lengths(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<()> {
    if y_true.is_empty() {
        return Err(PipelineError::Format("cannot score empty label vectors".to_string()));
    }
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::Format(format!(
            "true labels ({}) and predictions ({}) differ in length",
            y_true.len(),
            y_pred.len()
        )));
    }
    Ok(())
}

/// Fraction of positions where the prediction equals the true label.
pub fn accuracy(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let correct = y_true.iter().zip(y_pred.iter()).filter(|(a, b)| a == b).count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Entry `(i, j)` counts samples whose true class is `i` and predicted class is `j`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    pub counts: Array2<usize>,
}

impl ConfusionMatrix {
    /// `n_classes` defaults to the largest code seen plus one.
    pub fn from_labels(
        y_true: &Array1<usize>,
        y_pred: &Array1<usize>,
        n_classes: Option<usize>,
    ) -> Result<Self> {
        check_lengths(y_true, y_pred)?;
        let seen = y_true.iter().chain(y_pred.iter()).copied().max().unwrap_or(0) + 1;
        let nc = n_classes.unwrap_or(seen).max(seen);
        let mut counts = Array2::zeros((nc, nc));
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            counts[(t, p)] += 1;
        }
        Ok(ConfusionMatrix { counts })
    }

    pub fn n_classes(&self) -> usize {
        self.counts.nrows()
    }

    pub fn true_positives(&self, class: usize) -> usize {
        self.counts[(class, class)]
    }

    /// Predicted as `class` but actually another class.
    pub fn false_positives(&self, class: usize) -> usize {
        self.counts.column(class).sum() - self.true_positives(class)
    }

    /// Actually `class` but predicted as another class.
    pub fn false_negatives(&self, class: usize) -> usize {
        self.counts.row(class).sum() - self.true_positives(class)
    }

    pub fn support(&self, class: usize) -> usize {
        self.counts.row(class).sum()
    }

    pub fn total(&self) -> usize {
        self.counts.sum()
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub code: usize,
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AveragedMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Accuracy plus per-class and averaged precision / recall / F1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub per_class: Vec<ClassMetrics>,
    pub macro_avg: AveragedMetrics,
    pub weighted_avg: AveragedMetrics,
    /// Row-major confusion counts, true class by predicted class.
    pub confusion: Vec<Vec<usize>>,
    pub n_samples: usize,
}

/// Score predictions against the truth. `class_names[code]` labels each class
/// in the report; missing names fall back to the numeric code.
pub fn score(
    y_true: &Array1<usize>,
    y_pred: &Array1<usize>,
    class_names: &[String],
) -> Result<ClassificationReport> {
    let cm = ConfusionMatrix::from_labels(y_true, y_pred, Some(class_names.len()))?;

    let per_class: Vec<ClassMetrics> = (0..cm.n_classes())
        .map(|class| {
            let tp = cm.true_positives(class);
            let precision = ratio(tp, tp + cm.false_positives(class));
            let recall = ratio(tp, tp + cm.false_negatives(class));
            let f1 = if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            };
            ClassMetrics {
                code: class,
                label: class_names
                    .get(class)
                    .cloned()
                    .unwrap_or_else(|| class.to_string()),
                precision,
                recall,
                f1,
                support: cm.support(class),
            }
        })
        .collect();

    let n_classes = per_class.len() as f64;
    let macro_avg = AveragedMetrics {
        precision: per_class.iter().map(|m| m.precision).sum::<f64>() / n_classes,
        recall: per_class.iter().map(|m| m.recall).sum::<f64>() / n_classes,
        f1: per_class.iter().map(|m| m.f1).sum::<f64>() / n_classes,
    };

    let total = cm.total() as f64;
    let weighted = |f: fn(&ClassMetrics) -> f64| {
        per_class.iter().map(|m| f(m) * m.support as f64).sum::<f64>() / total
    };
    let weighted_avg = AveragedMetrics {
        precision: weighted(|m| m.precision),
        recall: weighted(|m| m.recall),
        f1: weighted(|m| m.f1),
    };

    Ok(ClassificationReport {
        accuracy: accuracy(y_true, y_pred)?,
        per_class,
        macro_avg,
        weighted_avg,
        confusion: cm.counts.outer_iter().map(|row| row.to_vec()).collect(),
        n_samples: y_true.len(),
    })
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for m in &self.per_class {
            writeln!(
                f,
                "{:>14} {:>10.4} {:>10.4} {:>10.4} {:>10}",
                m.label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10.4} {:>10}",
            "accuracy", "", "", self.accuracy, self.n_samples
        )?;
        writeln!(
            f,
            "{:>14} {:>10.4} {:>10.4} {:>10.4} {:>10}",
            "macro avg", self.macro_avg.precision, self.macro_avg.recall, self.macro_avg.f1, self.n_samples
        )?;
        write!(
            f,
            "{:>14} {:>10.4} {:>10.4} {:>10.4} {:>10}",
            "weighted avg",
            self.weighted_avg.precision,
            self.weighted_avg.recall,
            self.weighted_avg.f1,
            self.n_samples
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names() -> Vec<String> {
        vec!["B".to_string(), "M".to_string()]
    }

    #[test]
    fn accuracy_bounds() {
        let y = array![0usize, 1, 1, 0];
        assert_eq!(accuracy(&y, &y).unwrap(), 1.0);
        let flipped = y.mapv(|v| 1 - v);
        assert_eq!(accuracy(&y, &flipped).unwrap(), 0.0);
        assert_eq!(accuracy(&y, &array![0, 1, 0, 0]).unwrap(), 0.75);
    }

    #[test]
    fn accuracy_rejects_mismatch() {
        assert!(accuracy(&array![0usize, 1], &array![0usize]).is_err());
        assert!(accuracy(&Array1::<usize>::zeros(0), &Array1::<usize>::zeros(0)).is_err());
    }

    #[test]
    fn per_class_metrics_from_confusion() {
        // true:  B B B M M
        // pred:  B B M M B
        let y_true = array![0usize, 0, 0, 1, 1];
        let y_pred = array![0usize, 0, 1, 1, 0];
        let report = score(&y_true, &y_pred, &names()).unwrap();

        assert_eq!(report.confusion, vec![vec![2, 1], vec![1, 1]]);
        let b = &report.per_class[0];
        assert!((b.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((b.recall - 2.0 / 3.0).abs() < 1e-12);
        let m = &report.per_class[1];
        assert!((m.precision - 0.5).abs() < 1e-12);
        assert!((m.recall - 0.5).abs() < 1e-12);
        assert_eq!(m.support, 2);
        assert!((report.accuracy - 0.6).abs() < 1e-12);
    }

    #[test]
    fn missing_predictions_give_zero_not_nan() {
        let y_true = array![0usize, 0, 1];
        let y_pred = array![0usize, 0, 0];
        let report = score(&y_true, &y_pred, &names()).unwrap();
        assert_eq!(report.per_class[1].precision, 0.0);
        assert_eq!(report.per_class[1].f1, 0.0);
        assert!(report.to_string().contains("weighted avg"));
    }
}
