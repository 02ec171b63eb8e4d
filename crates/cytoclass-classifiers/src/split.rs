//! Seeded train/test partitioning and k-fold splitting for cross-validation.
use std::collections::BTreeMap;

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data_handling::select_labels;
use crate::error::{PipelineError, Result};

/// A train/test partition together with the original row indices of both sides.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<usize>,
    pub y_test: Array1<usize>,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Shuffle `0..n` with a generator seeded from `seed`.
pub fn permutation(n: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);
    indices
}

/// Split `(x, y)` into training and held-out test subsets.
///
/// The rows are permuted with `seed` and the first `round(test_fraction * n)`
/// permuted indices form the test set.
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<usize>,
    test_fraction: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    let n = x.nrows();
    if y.len() != n {
        return Err(PipelineError::Partition(format!(
            "{} labels for {} samples",
            y.len(),
            n
        )));
    }
    if !test_fraction.is_finite() || test_fraction <= 0.0 || test_fraction >= 1.0 {
        return Err(PipelineError::Partition(format!(
            "test_fraction must lie strictly between 0 and 1, got {}",
            test_fraction
        )));
    }

    let n_test = (test_fraction * n as f64).round() as usize;
    if n_test == 0 || n_test >= n {
        return Err(PipelineError::Partition(format!(
            "test_fraction {} of {} samples leaves an empty partition",
            test_fraction, n
        )));
    }

    let perm = permutation(n, seed);
    let test_indices = perm[..n_test].to_vec();
    let train_indices = perm[n_test..].to_vec();

    log::debug!(
        "Split {} samples into {} training and {} test rows (seed {})",
        n,
        train_indices.len(),
        test_indices.len(),
        seed
    );

    Ok(TrainTestSplit {
        x_train: x.select(Axis(0), &train_indices),
        x_test: x.select(Axis(0), &test_indices),
        y_train: select_labels(y, &train_indices),
        y_test: select_labels(y, &test_indices),
        train_indices,
        test_indices,
    })
}

/// One cross-validation fold: rows to train on and rows to validate on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// K-fold splitter. With `stratified`, each class is spread round-robin over
/// the folds so every fold keeps roughly the overall class balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub stratified: bool,
    pub seed: u64,
}

impl Default for KFold {
    fn default() -> Self {
        Self {
            n_splits: 5,
            shuffle: true,
            stratified: true,
            seed: 0,
        }
    }
}

impl KFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self {
            n_splits,
            seed,
            ..Self::default()
        }
    }

    /// Build the folds for `y`. Fold sizes differ by at most one in the
    /// unstratified case; each sample is validated exactly once.
    pub fn split(&self, y: &Array1<usize>) -> Result<Vec<Fold>> {
        let n = y.len();
        if self.n_splits < 2 {
            return Err(PipelineError::Partition(format!(
                "n_splits must be at least 2, got {}",
                self.n_splits
            )));
        }
        if self.n_splits > n {
            return Err(PipelineError::Partition(format!(
                "n_splits ({}) > n_samples ({})",
                self.n_splits, n
            )));
        }

        let order: Vec<usize> = if self.shuffle {
            permutation(n, self.seed)
        } else {
            (0..n).collect()
        };

        let mut assignment = vec![0usize; n];
        if self.stratified {
            let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
            for &idx in &order {
                by_class.entry(y[idx]).or_default().push(idx);
            }
            let mut next = 0usize;
            for members in by_class.values() {
                for &idx in members {
                    assignment[idx] = next % self.n_splits;
                    next += 1;
                }
            }
        } else {
            let base = n / self.n_splits;
            let extra = n % self.n_splits;
            let mut pos = 0;
            for fold in 0..self.n_splits {
                let size = base + usize::from(fold < extra);
                for &idx in &order[pos..pos + size] {
                    assignment[idx] = fold;
                }
                pos += size;
            }
        }

        let folds: Vec<Fold> = (0..self.n_splits)
            .map(|fold| {
                let mut train = Vec::new();
                let mut validation = Vec::new();
                for (idx, &f) in assignment.iter().enumerate() {
                    if f == fold {
                        validation.push(idx);
                    } else {
                        train.push(idx);
                    }
                }
                Fold { train, validation }
            })
            .collect();

        if let Some(empty) = folds.iter().position(|f| f.validation.is_empty() || f.train.is_empty()) {
            return Err(PipelineError::Partition(format!("fold {} is empty", empty)));
        }

        Ok(folds)
    }
}
