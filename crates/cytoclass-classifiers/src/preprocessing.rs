//! Label encoding and per-feature standardization.
//!
//! `Scaler` holds per-column mean/std fitted on one matrix (the training
//! partition) so the same parameters can be applied to any other matrix with
//! the same columns. Columns with zero variance are handled according to
//! `DegeneratePolicy`; they never produce NaN.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Bijective mapping from distinct label values to codes `0..n_classes`.
///
/// Codes follow the sorted order of the distinct values, so fitting on any
/// vector with the same set of values yields the same mapping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit(labels: &[String]) -> Result<Self> {
        if labels.is_empty() {
            return Err(PipelineError::Encoding("cannot fit an encoder on no labels".to_string()));
        }
        let mut classes = labels.to_vec();
        classes.sort();
        classes.dedup();
        Ok(LabelEncoder { classes })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn code_of(&self, label: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| PipelineError::Encoding(format!("unknown label value '{}'", label)))
    }

    pub fn label_of(&self, code: usize) -> Result<&str> {
        self.classes
            .get(code)
            .map(|s| s.as_str())
            .ok_or_else(|| PipelineError::Encoding(format!("unknown label code {}", code)))
    }

    pub fn transform(&self, labels: &[String]) -> Result<Array1<usize>> {
        labels.iter().map(|l| self.code_of(l)).collect()
    }

    pub fn inverse_transform(&self, codes: &Array1<usize>) -> Result<Vec<String>> {
        codes
            .iter()
            .map(|&c| self.label_of(c).map(|s| s.to_string()))
            .collect()
    }
}

/// Fit an encoder on `labels` and return the encoded vector with it.
pub fn encode_labels(labels: &[String]) -> Result<(Array1<usize>, LabelEncoder)> {
    let encoder = LabelEncoder::fit(labels)?;
    let encoded = encoder.transform(labels)?;
    Ok((encoded, encoder))
}

/// Handling of zero-variance feature columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Raise `PipelineError::DegenerateFeature`.
    Error,
    /// Map the column to all zeros.
    Zero,
}

impl Default for DegeneratePolicy {
    fn default() -> Self {
        DegeneratePolicy::Error
    }
}

/// Standard scaler (per-column mean and population std).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Scaler {
    /// Standard deviations at or below this are treated as zero.
    const MIN_STD: f64 = 1e-12;

    /// Fit a `Scaler` from a matrix where rows are samples and columns are
    /// features.
    pub fn fit(x: &Array2<f64>, policy: DegeneratePolicy) -> Result<Scaler> {
        let (nrows, ncols) = x.dim();
        if nrows == 0 || ncols == 0 {
            return Err(PipelineError::Format(
                "cannot fit a scaler on an empty matrix".to_string(),
            ));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::Format(
                "feature matrix contains non-finite values".to_string(),
            ));
        }

        let mean = x.mean_axis(Axis(0)).map(|m| m.to_vec()).unwrap_or_default();
        let std = x.std_axis(Axis(0), 0.0).to_vec();

        for (column, s) in std.iter().enumerate() {
            if *s <= Scaler::MIN_STD && policy == DegeneratePolicy::Error {
                return Err(PipelineError::DegenerateFeature {
                    column,
                    name: format!("feature_{}", column + 1),
                });
            }
        }

        Ok(Scaler { mean, std })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Transform all rows using the fitted parameters and return a new matrix.
    ///
    /// Zero-variance columns map to 0.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(PipelineError::Format(format!(
                "scaler was fitted on {} features but the matrix has {}",
                self.n_features(),
                x.ncols()
            )));
        }
        let mut out = x.clone();
        for (c, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (mean, std) = (self.mean[c], self.std[c]);
            if std <= Scaler::MIN_STD {
                col.fill(0.0);
            } else {
                col.mapv_inplace(|v| (v - mean) / std);
            }
        }
        Ok(out)
    }

    /// Fit on `x` and return the transformed matrix in one call.
    pub fn fit_transform(x: &Array2<f64>, policy: DegeneratePolicy) -> Result<(Scaler, Array2<f64>)> {
        let sc = Scaler::fit(x, policy)?;
        let out = sc.transform(x)?;
        Ok((sc, out))
    }
}

/// Standardize every column of `x`, returning the scaled matrix with the
/// per-column means and standard deviations. Zero-variance columns raise
/// `PipelineError::DegenerateFeature`.
pub fn standardize(x: &Array2<f64>) -> Result<(Array2<f64>, Vec<f64>, Vec<f64>)> {
    let (sc, out) = Scaler::fit_transform(x, DegeneratePolicy::Error)?;
    Ok((out, sc.mean, sc.std))
}

/// Name a degenerate column after its feature, for error messages.
pub fn name_degenerate(err: PipelineError, feature_names: &[String]) -> PipelineError {
    match err {
        PipelineError::DegenerateFeature { column, name } => PipelineError::DegenerateFeature {
            column,
            name: feature_names.get(column).cloned().unwrap_or(name),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn standardize_population_convention() {
        let x = array![[1.0], [2.0], [3.0]];
        let (scaled, mean, std) = standardize(&x).unwrap();
        assert!((mean[0] - 2.0).abs() < 1e-12);
        assert!((std[0] - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
        let expected = [-1.224744871391589, 0.0, 1.224744871391589];
        for (got, want) in scaled.column(0).iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-9, "{} != {}", got, want);
        }
    }

    #[test]
    fn constant_column_policies() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        match standardize(&x) {
            Err(PipelineError::DegenerateFeature { column, .. }) => assert_eq!(column, 1),
            other => panic!("expected degenerate feature error, got {:?}", other),
        }

        let (_, scaled) = Scaler::fit_transform(&x, DegeneratePolicy::Zero).unwrap();
        assert!(scaled.column(1).iter().all(|v| *v == 0.0));
        assert!(scaled.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn transform_reuses_training_parameters() {
        let train = array![[0.0], [2.0]];
        let sc = Scaler::fit(&train, DegeneratePolicy::Error).unwrap();
        let test = sc.transform(&array![[4.0]]).unwrap();
        assert_eq!(test[(0, 0)], 3.0);
        assert!(sc.transform(&array![[1.0, 2.0]]).is_err());
    }

    #[test]
    fn encoder_sorted_and_stable() {
        let labels: Vec<String> = ["M", "B", "B", "M"].iter().map(|s| s.to_string()).collect();
        let (codes, enc) = encode_labels(&labels).unwrap();
        assert_eq!(enc.classes(), &["B".to_string(), "M".to_string()]);
        assert_eq!(codes.to_vec(), vec![1, 0, 0, 1]);

        let again = LabelEncoder::fit(&["B".to_string(), "M".to_string()]).unwrap();
        assert_eq!(enc, again);
        assert_eq!(enc.inverse_transform(&codes).unwrap(), labels);
    }

    #[test]
    fn encoder_rejects_unknowns() {
        let (_, enc) = encode_labels(&["A".to_string(), "B".to_string()]).unwrap();
        assert!(matches!(
            enc.transform(&["C".to_string()]),
            Err(PipelineError::Encoding(_))
        ));
        assert!(matches!(enc.label_of(7), Err(PipelineError::Encoding(_))));
    }
}
