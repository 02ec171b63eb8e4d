//! Exploratory statistics over a loaded dataset.
use std::collections::BTreeMap;

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};

use crate::data_handling::Dataset;

/// Descriptive statistics of one feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1); NaN with fewer than two rows.
    pub std: f64,
    pub min: f64,
    pub median: f64,
    pub max: f64,
    /// Mean of the column within each class.
    pub class_means: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_samples: usize,
    pub n_features: usize,
    pub class_counts: BTreeMap<String, usize>,
    pub features: Vec<FeatureSummary>,
}

/// Summarize every feature of `dataset`.
pub fn describe(dataset: &Dataset) -> DatasetSummary {
    let features = dataset
        .x
        .axis_iter(Axis(1))
        .zip(dataset.feature_names.iter())
        .map(|(column, name)| {
            let values = column.to_vec();

            let mut per_class: BTreeMap<String, Vec<f64>> = BTreeMap::new();
            for (value, label) in values.iter().zip(dataset.labels.iter()) {
                per_class.entry(label.clone()).or_default().push(*value);
            }
            let class_means = per_class
                .into_iter()
                .map(|(label, vals)| (label, Statistics::mean(&vals)))
                .collect();

            FeatureSummary {
                name: name.clone(),
                count: values.len(),
                mean: Statistics::mean(&values),
                std: Statistics::std_dev(&values),
                min: Statistics::min(&values),
                median: Data::new(values.clone()).median(),
                max: Statistics::max(&values),
                class_means,
            }
        })
        .collect();

    DatasetSummary {
        n_samples: dataset.n_samples(),
        n_features: dataset.n_features(),
        class_counts: dataset.class_counts(),
        features,
    }
}

/// Pearson correlation between every pair of feature columns.
///
/// Pairs involving a zero-variance column are reported as 0.
pub fn correlation_matrix(x: &Array2<f64>) -> Array2<f64> {
    let columns: Vec<Vec<f64>> = x.axis_iter(Axis(1)).map(|c| c.to_vec()).collect();
    let std: Vec<f64> = columns.iter().map(|c| Statistics::std_dev(c)).collect();
    let n = columns.len();

    let mut corr = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in i..n {
            let denom = std[i] * std[j];
            let r = if denom > 0.0 && denom.is_finite() {
                Statistics::covariance(&columns[i], &columns[j]) / denom
            } else {
                0.0
            };
            corr[(i, j)] = r;
            corr[(j, i)] = r;
        }
    }
    corr
}

/// The `top` most correlated feature pairs by absolute coefficient.
pub fn strongest_correlations(
    corr: &Array2<f64>,
    names: &[String],
    top: usize,
) -> Vec<(String, String, f64)> {
    let mut pairs = Vec::new();
    for i in 0..corr.nrows() {
        for j in (i + 1)..corr.ncols() {
            pairs.push((names[i].clone(), names[j].clone(), corr[(i, j)]));
        }
    }
    pairs.sort_by(|a, b| b.2.abs().total_cmp(&a.2.abs()));
    pairs.truncate(top);
    pairs
}
