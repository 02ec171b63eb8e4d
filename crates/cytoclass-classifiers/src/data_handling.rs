//! In-memory dataset holding the sample matrix, the categorical labels and
//! per-row identifiers, plus helpers for row selection.
use std::collections::BTreeMap;

use ndarray::{Array1, Array2, Axis};

use crate::error::{PipelineError, Result};

/// Canonical column names of the Wisconsin diagnostic breast-cancer features,
/// in file order (ten measurements, each as mean / standard error / worst).
pub const WDBC_FEATURE_NAMES: [&str; 30] = [
    "radius_mean",
    "texture_mean",
    "perimeter_mean",
    "area_mean",
    "smoothness_mean",
    "compactness_mean",
    "concavity_mean",
    "concave_points_mean",
    "symmetry_mean",
    "fractal_dimension_mean",
    "radius_se",
    "texture_se",
    "perimeter_se",
    "area_se",
    "smoothness_se",
    "compactness_se",
    "concavity_se",
    "concave_points_se",
    "symmetry_se",
    "fractal_dimension_se",
    "radius_worst",
    "texture_worst",
    "perimeter_worst",
    "area_worst",
    "smoothness_worst",
    "compactness_worst",
    "concavity_worst",
    "concave_points_worst",
    "symmetry_worst",
    "fractal_dimension_worst",
];

#[derive(Debug, Clone)]
pub struct Dataset {
    /// Sample identifiers (row numbers when the file carries no id column)
    pub ids: Vec<String>,
    pub feature_names: Vec<String>,
    pub x: Array2<f64>,
    /// Categorical labels, aligned with the rows of `x`
    pub labels: Vec<String>,
}

impl Dataset {
    pub fn new(
        ids: Vec<String>,
        feature_names: Vec<String>,
        x: Array2<f64>,
        labels: Vec<String>,
    ) -> Result<Self> {
        if labels.len() != x.nrows() {
            return Err(PipelineError::Format(format!(
                "label vector has {} entries but the sample matrix has {} rows",
                labels.len(),
                x.nrows()
            )));
        }
        if ids.len() != x.nrows() {
            return Err(PipelineError::Format(format!(
                "id vector has {} entries but the sample matrix has {} rows",
                ids.len(),
                x.nrows()
            )));
        }
        if feature_names.len() != x.ncols() {
            return Err(PipelineError::Format(format!(
                "{} feature names given for {} feature columns",
                feature_names.len(),
                x.ncols()
            )));
        }
        Ok(Dataset {
            ids,
            feature_names,
            x,
            labels,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// Number of rows per distinct label, in sorted label order.
    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn log_input_data_summary(&self) {
        log::info!("----- Input Data Summary -----");
        let counts = self
            .class_counts()
            .iter()
            .map(|(label, n)| format!("{} {}", n, label))
            .collect::<Vec<_>>()
            .join(", ");
        log::info!("{} samples ({})", self.n_samples(), counts);
        log::info!("{} feature columns", self.n_features());
        log::info!("------------------------------");
    }

    /// Per-feature descriptive statistics and class counts.
    pub fn describe(&self) -> crate::stats::DatasetSummary {
        crate::stats::describe(self)
    }

    /// Column index of a named feature.
    pub fn feature_index(&self, name: &str) -> Result<usize> {
        self.feature_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| PipelineError::Configuration(format!("unknown feature '{}'", name)))
    }

    /// Keep only the named feature columns, in the order given.
    pub fn select_features(&self, names: &[String]) -> Result<Dataset> {
        let indices = names
            .iter()
            .map(|n| self.feature_index(n))
            .collect::<Result<Vec<_>>>()?;
        Ok(Dataset {
            ids: self.ids.clone(),
            feature_names: names.to_vec(),
            x: self.x.select(Axis(1), &indices),
            labels: self.labels.clone(),
        })
    }
}

/// Row-select a label vector.
pub fn select_labels(y: &Array1<usize>, indices: &[usize]) -> Array1<usize> {
    indices.iter().map(|&i| y[i]).collect()
}
