use linfa::prelude::*;
use linfa_logistic::{
    FittedLogisticRegression, LogisticRegression, MultiFittedLogisticRegression,
    MultiLogisticRegression,
};
use ndarray::{Array1, Array2};

use crate::config::LogisticConfig;
use crate::error::{PipelineError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::utils::{check_query, check_training_data, distinct_classes, not_fitted};

enum FittedLogistic {
    Constant(usize),
    Binary(FittedLogisticRegression<f64, usize>),
    Multinomial(MultiFittedLogisticRegression<f64, usize>),
}

/// L2-regularized logistic regression backed by `linfa-logistic`.
///
/// Two classes use the binary model; more classes use the multinomial one.
pub struct LogisticClassifier {
    config: LogisticConfig,
    n_features: usize,
    model: Option<FittedLogistic>,
}

impl LogisticClassifier {
    pub fn new(config: LogisticConfig) -> Self {
        LogisticClassifier {
            config,
            n_features: 0,
            model: None,
        }
    }
}

fn backend_error<E: std::fmt::Display>(e: E) -> PipelineError {
    PipelineError::Model(format!("logistic regression training failed: {}", e))
}

impl ClassifierModel for LogisticClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
        check_training_data(x, y)?;
        let classes = distinct_classes(y);
        let alpha = 1.0 / self.config.c;
        log::trace!(
            "Fitting logistic regression (alpha = {}, max_iterations = {}) on {} rows, {} classes",
            alpha,
            self.config.max_iterations,
            x.nrows(),
            classes.len()
        );

        let dataset = Dataset::new(x.to_owned(), y.to_owned());
        let fitted = match classes.len() {
            1 => FittedLogistic::Constant(classes[0]),
            2 => FittedLogistic::Binary(
                LogisticRegression::default()
                    .alpha(alpha)
                    .max_iterations(self.config.max_iterations)
                    .gradient_tolerance(self.config.gradient_tolerance)
                    .fit(&dataset)
                    .map_err(backend_error)?,
            ),
            _ => FittedLogistic::Multinomial(
                MultiLogisticRegression::default()
                    .alpha(alpha)
                    .max_iterations(self.config.max_iterations)
                    .gradient_tolerance(self.config.gradient_tolerance)
                    .fit(&dataset)
                    .map_err(backend_error)?,
            ),
        };

        self.n_features = x.ncols();
        self.model = Some(fitted);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let model = self.model.as_ref().ok_or_else(|| not_fitted(self.name()))?;
        check_query(x, self.n_features)?;
        let predictions = match model {
            FittedLogistic::Constant(code) => Array1::from_elem(x.nrows(), *code),
            FittedLogistic::Binary(model) => model.predict(x),
            FittedLogistic::Multinomial(model) => model.predict(x),
        };
        Ok(predictions)
    }

    fn name(&self) -> &str {
        "logistic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn binary_separable() {
        let x = array![[-3.0], [-2.0], [-1.5], [1.5], [2.0], [3.0]];
        let y = array![0usize, 0, 0, 1, 1, 1];
        let mut model = LogisticClassifier::new(LogisticConfig::default());
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&array![[-4.0], [4.0]]).unwrap().to_vec(), vec![0, 1]);
    }

    #[test]
    fn three_classes_use_multinomial_model() {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [5.0, 0.0],
            [5.1, 0.3],
            [0.0, 5.0],
            [0.2, 5.2]
        ];
        let y = array![0usize, 0, 1, 1, 2, 2];
        let mut model = LogisticClassifier::new(LogisticConfig {
            c: 10.0,
            max_iterations: 200,
            ..LogisticConfig::default()
        });
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&array![[0.1, 0.1], [6.0, 0.0], [0.0, 6.0]]).unwrap();
        assert_eq!(pred.to_vec(), vec![0, 1, 2]);
    }

    #[test]
    fn wrong_width_query_fails() {
        let mut model = LogisticClassifier::new(LogisticConfig::default());
        model
            .fit(&array![[0.0], [1.0]], &array![0usize, 1])
            .unwrap();
        assert!(model.predict(&array![[0.0, 1.0]]).is_err());
    }
}
