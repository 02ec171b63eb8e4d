use ndarray::{Array1, Array2};

use crate::config::ModelType;
use crate::error::Result;
use crate::models::classifier_trait::ClassifierModel;
use crate::models::factory::build_model;
use crate::models::utils::not_fitted;
use crate::preprocessing::{DegeneratePolicy, Scaler};

/// A classifier preceded by a `Scaler` fitted on the same training rows.
///
/// `predict` standardizes queries with the training statistics, so test rows
/// and validation folds never leak into the scaling parameters.
pub struct ScaledClassifier {
    policy: DegeneratePolicy,
    scaler: Option<Scaler>,
    inner: Box<dyn ClassifierModel>,
}

impl ScaledClassifier {
    pub fn new(inner: Box<dyn ClassifierModel>, policy: DegeneratePolicy) -> Self {
        ScaledClassifier {
            policy,
            scaler: None,
            inner,
        }
    }

    /// Build the classifier for `model_type` and wrap it.
    pub fn from_model_type(model_type: &ModelType, policy: DegeneratePolicy) -> Result<Self> {
        Ok(Self::new(build_model(model_type)?, policy))
    }

    pub fn scaler(&self) -> Option<&Scaler> {
        self.scaler.as_ref()
    }
}

impl ClassifierModel for ScaledClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
        let (scaler, scaled) = Scaler::fit_transform(x, self.policy)?;
        self.inner.fit(&scaled, y)?;
        self.scaler = Some(scaler);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let scaler = self.scaler.as_ref().ok_or_else(|| not_fitted(self.inner.name()))?;
        self.inner.predict(&scaler.transform(x)?)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
