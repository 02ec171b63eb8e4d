use linfa::dataset::Pr;
use linfa::prelude::*;
use linfa_svm::{Svm, SvmParams};
use ndarray::{Array1, Array2, Axis};

use crate::config::{SvmConfig, SvmKernel};
use crate::error::{PipelineError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::utils::{argmax, check_query, check_training_data, distinct_classes, not_fitted};

enum FittedSvm {
    /// Only one class was present during training.
    Constant(usize),
    /// Two classes: `true` maps to `positive`, `false` to `negative`.
    Binary {
        model: Svm<f64, bool>,
        negative: usize,
        positive: usize,
    },
    /// One probabilistic machine per class, highest probability wins.
    OneVsRest(Vec<(usize, Svm<f64, Pr>)>),
}

/// Soft-margin support vector classifier backed by `linfa-svm`.
///
/// Kernels follow the usual conventions: `rbf` is `exp(-gamma * |x - y|^2)`
/// and `poly` is `(gamma * <x, y> + coef0)^degree`.
pub struct SvmClassifier {
    config: SvmConfig,
    n_features: usize,
    model: Option<FittedSvm>,
}

impl SvmClassifier {
    pub fn new(config: SvmConfig) -> Self {
        SvmClassifier {
            config,
            n_features: 0,
            model: None,
        }
    }

    /// Resolve `gamma`, defaulting to `1 / (n_features * var(X))`.
    fn resolve_gamma(&self, x: &Array2<f64>) -> f64 {
        if let Some(gamma) = self.config.gamma {
            return gamma;
        }
        let var = x.var(0.0);
        if var > 0.0 {
            1.0 / (x.ncols() as f64 * var)
        } else {
            1.0
        }
    }

    /// Translate the configuration into `linfa-svm` parameters. `linfa-svm`
    /// has no gamma on its polynomial kernel, so the kernel scale is folded
    /// into the constant and the box constraint.
    fn params<T>(&self, gamma: f64) -> SvmParams<f64, T> {
        let cfg = &self.config;
        let c = match cfg.kernel {
            SvmKernel::Poly => cfg.c * gamma.powi(cfg.degree as i32),
            _ => cfg.c,
        };
        let params = Svm::<f64, T>::params().eps(cfg.eps).pos_neg_weights(c, c);
        match cfg.kernel {
            SvmKernel::Linear => params.linear_kernel(),
            SvmKernel::Rbf => params.gaussian_kernel(1.0 / gamma),
            SvmKernel::Poly => params.polynomial_kernel(cfg.coef0 / gamma, cfg.degree as f64),
        }
    }
}

fn backend_error<E: std::fmt::Display>(e: E) -> PipelineError {
    PipelineError::Model(format!("SVM training failed: {}", e))
}

impl ClassifierModel for SvmClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
        check_training_data(x, y)?;
        let classes = distinct_classes(y);
        let gamma = self.resolve_gamma(x);
        log::trace!(
            "Fitting SVM ({:?} kernel, C = {}, gamma = {:.4e}) on {} rows, {} classes",
            self.config.kernel,
            self.config.c,
            gamma,
            x.nrows(),
            classes.len()
        );

        let fitted = match classes.as_slice() {
            [only] => FittedSvm::Constant(*only),
            [negative, positive] => {
                let targets = y.mapv(|code| code == *positive);
                let dataset = Dataset::new(x.to_owned(), targets);
                let model = self.params::<bool>(gamma).fit(&dataset).map_err(backend_error)?;
                FittedSvm::Binary {
                    model,
                    negative: *negative,
                    positive: *positive,
                }
            }
            _ => {
                let mut machines = Vec::with_capacity(classes.len());
                for &class in &classes {
                    let targets = y.mapv(|code| code == class);
                    let dataset = Dataset::new(x.to_owned(), targets);
                    let model = self.params::<Pr>(gamma).fit(&dataset).map_err(backend_error)?;
                    machines.push((class, model));
                }
                FittedSvm::OneVsRest(machines)
            }
        };

        self.n_features = x.ncols();
        self.model = Some(fitted);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let model = self.model.as_ref().ok_or_else(|| not_fitted(self.name()))?;
        check_query(x, self.n_features)?;

        let predictions = match model {
            FittedSvm::Constant(code) => Array1::from_elem(x.nrows(), *code),
            FittedSvm::Binary {
                model,
                negative,
                positive,
            } => {
                let decisions: Array1<bool> = model.predict(x);
                decisions.mapv(|d| if d { *positive } else { *negative })
            }
            FittedSvm::OneVsRest(machines) => {
                let mut scores = Array2::<f64>::zeros((x.nrows(), machines.len()));
                for (col, (_, machine)) in machines.iter().enumerate() {
                    let probs: Array1<Pr> = machine.predict(x);
                    scores
                        .column_mut(col)
                        .assign(&probs.mapv(|p| *p as f64));
                }
                scores
                    .axis_iter(Axis(0))
                    .map(|row| machines[argmax(row)].0)
                    .collect()
            }
        };
        Ok(predictions)
    }

    fn name(&self) -> &str {
        "svm"
    }
}
