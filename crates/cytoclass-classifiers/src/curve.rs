//! Train and test accuracy as one hyperparameter varies.
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{ModelType, ParamValue};
use crate::error::{PipelineError, Result};
use crate::metrics::accuracy;
use crate::models::{ClassifierModel, ScaledClassifier};
use crate::preprocessing::DegeneratePolicy;
use crate::split::TrainTestSplit;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub value: ParamValue,
    pub train_accuracy: f64,
    pub test_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyCurve {
    pub model: String,
    pub parameter: String,
    pub points: Vec<CurvePoint>,
}

impl AccuracyCurve {
    /// The point with the highest test accuracy, first one on ties.
    pub fn best_point(&self) -> Option<&CurvePoint> {
        let mut best: Option<&CurvePoint> = None;
        for point in &self.points {
            if best.map_or(true, |b| point.test_accuracy > b.test_accuracy) {
                best = Some(point);
            }
        }
        best
    }
}

/// Fit one model per value of `parameter` on the training partition and
/// record its accuracy on both partitions.
pub fn accuracy_curve(
    base: &ModelType,
    parameter: &str,
    values: &[ParamValue],
    split: &TrainTestSplit,
    policy: DegeneratePolicy,
) -> Result<AccuracyCurve> {
    if values.is_empty() {
        return Err(PipelineError::Configuration(format!(
            "no values given for parameter '{}'",
            parameter
        )));
    }
    let models = values
        .iter()
        .map(|value| {
            let mut model = base.clone();
            model.set_param(parameter, value)?;
            model.validate()?;
            Ok((value.clone(), model))
        })
        .collect::<Result<Vec<_>>>()?;

    log::info!(
        "Accuracy curve for {} over {} values of '{}'",
        base.name(),
        models.len(),
        parameter
    );

    let points = models
        .par_iter()
        .map(|(value, model_type)| {
            let mut model = ScaledClassifier::from_model_type(model_type, policy)?;
            model.fit(&split.x_train, &split.y_train)?;
            let train_accuracy = accuracy(&split.y_train, &model.predict(&split.x_train)?)?;
            let test_accuracy = accuracy(&split.y_test, &model.predict(&split.x_test)?)?;
            log::debug!(
                "{}={}: train {:.4}, test {:.4}",
                parameter,
                value,
                train_accuracy,
                test_accuracy
            );
            Ok(CurvePoint {
                value: value.clone(),
                train_accuracy,
                test_accuracy,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(AccuracyCurve {
        model: base.name().to_string(),
        parameter: parameter.to_string(),
        points,
    })
}
