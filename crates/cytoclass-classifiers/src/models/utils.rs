//! Input checks and small helpers shared by the classifier wrappers.
use ndarray::{Array1, Array2, ArrayView1};

use crate::error::{PipelineError, Result};

/// Check a training pair before it is handed to a backend.
pub fn check_training_data(x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(PipelineError::Model("cannot fit on an empty matrix".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(PipelineError::Model(format!(
            "{} training rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::Model("training matrix contains non-finite values".to_string()));
    }
    Ok(())
}

/// Check that a query matrix matches the fitted feature count.
pub fn check_query(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(PipelineError::Model(format!(
            "model was fitted on {} features but the query has {}",
            n_features,
            x.ncols()
        )));
    }
    Ok(())
}

pub fn not_fitted(name: &str) -> PipelineError {
    PipelineError::Model(format!("{} model used before fit", name))
}

/// Distinct label codes present in `y`, ascending.
pub fn distinct_classes(y: &Array1<usize>) -> Vec<usize> {
    let mut classes = y.to_vec();
    classes.sort_unstable();
    classes.dedup();
    classes
}

/// Index of the largest value; the first one wins on ties.
pub fn argmax(values: ArrayView1<f64>) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}
