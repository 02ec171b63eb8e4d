//! Cross-validated scoring of a model configuration.
//!
//! Every fold gets a fresh classifier and a fresh `Scaler` fitted on that
//! fold's training rows only.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::config::ModelType;
use crate::data_handling::select_labels;
use crate::error::Result;
use crate::metrics::accuracy;
use crate::models::{ClassifierModel, ScaledClassifier};
use crate::preprocessing::DegeneratePolicy;
use crate::split::{Fold, KFold};

/// Score of a single fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldScore {
    pub fold: usize,
    pub n_train: usize,
    pub n_validation: usize,
    pub accuracy: f64,
}

/// Aggregated cross-validation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvResult {
    pub folds: Vec<FoldScore>,
    pub mean_score: f64,
    /// Population standard deviation of the fold accuracies.
    pub std_score: f64,
}

impl CvResult {
    pub fn fold_scores(&self) -> Vec<f64> {
        self.folds.iter().map(|f| f.accuracy).collect()
    }
}

/// Train on each fold's training rows and score accuracy on its validation rows.
pub fn cross_val_score(
    model_type: &ModelType,
    x: &Array2<f64>,
    y: &Array1<usize>,
    folds: &[Fold],
    policy: DegeneratePolicy,
) -> Result<CvResult> {
    let mut scores = Vec::with_capacity(folds.len());
    for (i, fold) in folds.iter().enumerate() {
        let x_train = x.select(Axis(0), &fold.train);
        let x_val = x.select(Axis(0), &fold.validation);
        let y_train = select_labels(y, &fold.train);
        let y_val = select_labels(y, &fold.validation);

        let mut model = ScaledClassifier::from_model_type(model_type, policy)?;
        model.fit(&x_train, &y_train)?;
        let acc = accuracy(&y_val, &model.predict(&x_val)?)?;
        log::trace!("{} fold {}: accuracy {:.4}", model_type.name(), i + 1, acc);

        scores.push(FoldScore {
            fold: i,
            n_train: fold.train.len(),
            n_validation: fold.validation.len(),
            accuracy: acc,
        });
    }

    let values = Array1::from_iter(scores.iter().map(|s| s.accuracy));
    Ok(CvResult {
        mean_score: values.mean().unwrap_or(0.0),
        std_score: values.std(0.0),
        folds: scores,
    })
}

/// Build the folds from `kfold` and cross-validate `model_type` on them.
pub fn cross_validate(
    model_type: &ModelType,
    x: &Array2<f64>,
    y: &Array1<usize>,
    kfold: &KFold,
    policy: DegeneratePolicy,
) -> Result<CvResult> {
    let folds = kfold.split(y)?;
    cross_val_score(model_type, x, y, &folds, policy)
}
