use ndarray::{Array1, Array2};

use crate::error::Result;

/// Contract shared by every classifier family.
///
/// Labels are integer class codes as produced by `LabelEncoder`. Rows of `x`
/// are samples and columns are features; `predict` must be given the same
/// feature count the model was fitted on.
pub trait ClassifierModel {
    /// Fit the model on a training matrix and its label codes.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()>;

    /// Predict one label code per row of `x`. Fails before `fit`.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>>;

    /// Human readable name for logs and reports.
    fn name(&self) -> &str {
        "classifier"
    }
}
