use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{PipelineError, Result};

/// A single hyperparameter value as it appears in configs and search spaces.
///
/// Deserialized untagged, so `5` is an `Int`, `0.1` a `Float`, `"rbf"` a
/// `Text` and `[64, 32]` a `Layers` list.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
    Layers(Vec<usize>),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Some(*v as usize),
            ParamValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Some(*v as usize),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(s) => write!(f, "{}", s),
            ParamValue::Layers(layers) => {
                let parts: Vec<String> = layers.iter().map(|l| l.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

/// One named hyperparameter configuration. Keys iterate in sorted order.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Render a parameter set as `name=value, name=value`.
pub fn format_params(params: &ParamSet) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn invalid_value(param: &str, value: &ParamValue) -> PipelineError {
    PipelineError::Configuration(format!("invalid value '{}' for parameter '{}'", value, param))
}

fn unknown_param(model: &str, param: &str) -> PipelineError {
    PipelineError::Configuration(format!("unknown parameter '{}' for {} model", param, model))
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KnnWeights {
    Uniform,
    Distance,
}

impl FromStr for KnnWeights {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "uniform" => Ok(KnnWeights::Uniform),
            "distance" => Ok(KnnWeights::Distance),
            _ => Err(PipelineError::Configuration(format!(
                "unknown KNN weighting '{}'. Valid options are: uniform, distance",
                s
            ))),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KnnAlgorithm {
    KdTree,
    Brute,
}

impl FromStr for KnnAlgorithm {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "kdtree" | "kd_tree" => Ok(KnnAlgorithm::KdTree),
            "brute" => Ok(KnnAlgorithm::Brute),
            _ => Err(PipelineError::Configuration(format!(
                "unknown KNN algorithm '{}'. Valid options are: kd_tree, brute",
                s
            ))),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SvmKernel {
    Linear,
    Rbf,
    Poly,
}

impl FromStr for SvmKernel {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(SvmKernel::Linear),
            "rbf" | "gauss" | "gaussian" => Ok(SvmKernel::Rbf),
            "poly" | "polynomial" => Ok(SvmKernel::Poly),
            _ => Err(PipelineError::Configuration(format!(
                "unsupported kernel type '{}'. Valid options are: linear, rbf, poly",
                s
            ))),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Tanh,
    Logistic,
}

impl FromStr for Activation {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "relu" => Ok(Activation::Relu),
            "tanh" => Ok(Activation::Tanh),
            "logistic" | "sigmoid" => Ok(Activation::Logistic),
            _ => Err(PipelineError::Configuration(format!(
                "unknown activation '{}'. Valid options are: relu, tanh, logistic",
                s
            ))),
        }
    }
}

/// k-nearest-neighbour vote.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct KnnConfig {
    pub n_neighbors: usize,
    pub weights: KnnWeights,
    pub algorithm: KnnAlgorithm,
}

impl Default for KnnConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            weights: KnnWeights::Uniform,
            algorithm: KnnAlgorithm::KdTree,
        }
    }
}

/// Accepts a number, `null` or `"scale"` (same as `null`), matching what
/// `set_param("gamma", ..)` accepts.
fn deserialize_gamma<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Gamma {
        Value(f64),
        Named(String),
    }

    match Option::<Gamma>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Gamma::Value(v)) => Ok(Some(v)),
        Some(Gamma::Named(s)) if s == "scale" => Ok(None),
        Some(Gamma::Named(s)) => Err(serde::de::Error::custom(format!(
            "invalid gamma '{}', expected a number or \"scale\"",
            s
        ))),
    }
}

/// Soft-margin support vector classifier.
///
/// `gamma = None` resolves at fit time to `1 / (n_features * var(X))`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SvmConfig {
    pub c: f64,
    pub kernel: SvmKernel,
    #[serde(deserialize_with = "deserialize_gamma")]
    pub gamma: Option<f64>,
    pub degree: u32,
    pub coef0: f64,
    pub eps: f64,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: SvmKernel::Rbf,
            gamma: None,
            degree: 3,
            coef0: 0.0,
            eps: 1e-3,
        }
    }
}

/// L2-regularized logistic regression. `c` is the inverse regularization strength.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LogisticConfig {
    pub c: f64,
    pub max_iterations: u64,
    pub gradient_tolerance: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iterations: 100,
            gradient_tolerance: 1e-4,
        }
    }
}

/// Feed-forward network trained with mini-batch Adam on cross-entropy.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MlpConfig {
    pub hidden_layer_sizes: Vec<usize>,
    pub activation: Activation,
    /// L2 penalty.
    pub alpha: f64,
    pub learning_rate: f64,
    pub max_epochs: usize,
    pub batch_size: usize,
    /// Stop once the epoch loss improves by less than this for `n_iter_no_change` epochs.
    pub tolerance: f64,
    pub n_iter_no_change: usize,
    pub seed: u64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_layer_sizes: vec![100],
            activation: Activation::Relu,
            alpha: 1e-4,
            learning_rate: 1e-3,
            max_epochs: 200,
            batch_size: 32,
            tolerance: 1e-4,
            n_iter_no_change: 10,
            seed: 42,
        }
    }
}

/// Supported model types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ModelType {
    Knn(KnnConfig),
    Svm(SvmConfig),
    LogisticRegression(LogisticConfig),
    Mlp(MlpConfig),
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::Knn(KnnConfig::default())
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "knn" => Ok(ModelType::Knn(KnnConfig::default())),
            "svm" => Ok(ModelType::Svm(SvmConfig::default())),
            "logistic" | "logistic_regression" | "logreg" => {
                Ok(ModelType::LogisticRegression(LogisticConfig::default()))
            }
            "mlp" => Ok(ModelType::Mlp(MlpConfig::default())),
            _ => Err(format!(
                "Unknown model type: {}. Valid options are: knn, svm, logistic, mlp",
                s
            )),
        }
    }
}

impl ModelType {
    /// Short lowercase name used in logs and report file names.
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::Knn(_) => "knn",
            ModelType::Svm(_) => "svm",
            ModelType::LogisticRegression(_) => "logistic",
            ModelType::Mlp(_) => "mlp",
        }
    }

    /// Check hyperparameter ranges before a model is built.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(PipelineError::Configuration(msg));
        match self {
            ModelType::Knn(cfg) => {
                if cfg.n_neighbors == 0 {
                    return bad("n_neighbors must be at least 1".to_string());
                }
            }
            ModelType::Svm(cfg) => {
                if !(cfg.c > 0.0) {
                    return bad(format!("SVM c must be > 0, got {}", cfg.c));
                }
                if let Some(gamma) = cfg.gamma {
                    if !(gamma > 0.0) {
                        return bad(format!("SVM gamma must be > 0, got {}", gamma));
                    }
                }
                if cfg.degree == 0 {
                    return bad("SVM degree must be at least 1".to_string());
                }
                if !(cfg.eps > 0.0) {
                    return bad(format!("SVM eps must be > 0, got {}", cfg.eps));
                }
            }
            ModelType::LogisticRegression(cfg) => {
                if !(cfg.c > 0.0) {
                    return bad(format!("logistic regression c must be > 0, got {}", cfg.c));
                }
                if cfg.max_iterations == 0 {
                    return bad("max_iterations must be at least 1".to_string());
                }
            }
            ModelType::Mlp(cfg) => {
                if cfg.hidden_layer_sizes.iter().any(|&h| h == 0) {
                    return bad("hidden layer sizes must be non-zero".to_string());
                }
                if !(cfg.learning_rate > 0.0) {
                    return bad(format!("learning_rate must be > 0, got {}", cfg.learning_rate));
                }
                if cfg.alpha < 0.0 {
                    return bad(format!("alpha must be >= 0, got {}", cfg.alpha));
                }
                if cfg.max_epochs == 0 || cfg.batch_size == 0 {
                    return bad("max_epochs and batch_size must be at least 1".to_string());
                }
            }
        }
        Ok(())
    }

    /// Override one hyperparameter by name.
    pub fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let model = self.name();
        match self {
            ModelType::Knn(cfg) => match name {
                "n_neighbors" => {
                    cfg.n_neighbors = value.as_usize().ok_or_else(|| invalid_value(name, value))?
                }
                "weights" => {
                    cfg.weights = value.as_str().ok_or_else(|| invalid_value(name, value))?.parse()?
                }
                "algorithm" => {
                    cfg.algorithm = value.as_str().ok_or_else(|| invalid_value(name, value))?.parse()?
                }
                _ => return Err(unknown_param(model, name)),
            },
            ModelType::Svm(cfg) => match name {
                "c" => cfg.c = value.as_f64().ok_or_else(|| invalid_value(name, value))?,
                "kernel" => {
                    cfg.kernel = value.as_str().ok_or_else(|| invalid_value(name, value))?.parse()?
                }
                "gamma" => {
                    cfg.gamma = match value {
                        ParamValue::Text(s) if s == "scale" => None,
                        _ => Some(value.as_f64().ok_or_else(|| invalid_value(name, value))?),
                    }
                }
                "degree" => {
                    cfg.degree = value.as_usize().ok_or_else(|| invalid_value(name, value))? as u32
                }
                "coef0" => cfg.coef0 = value.as_f64().ok_or_else(|| invalid_value(name, value))?,
                "eps" => cfg.eps = value.as_f64().ok_or_else(|| invalid_value(name, value))?,
                _ => return Err(unknown_param(model, name)),
            },
            ModelType::LogisticRegression(cfg) => match name {
                "c" => cfg.c = value.as_f64().ok_or_else(|| invalid_value(name, value))?,
                "max_iterations" => {
                    cfg.max_iterations =
                        value.as_usize().ok_or_else(|| invalid_value(name, value))? as u64
                }
                "gradient_tolerance" => {
                    cfg.gradient_tolerance =
                        value.as_f64().ok_or_else(|| invalid_value(name, value))?
                }
                _ => return Err(unknown_param(model, name)),
            },
            ModelType::Mlp(cfg) => match name {
                "hidden_layer_sizes" => {
                    cfg.hidden_layer_sizes = match value {
                        ParamValue::Layers(layers) => layers.clone(),
                        _ => vec![value.as_usize().ok_or_else(|| invalid_value(name, value))?],
                    }
                }
                "activation" => {
                    cfg.activation =
                        value.as_str().ok_or_else(|| invalid_value(name, value))?.parse()?
                }
                "alpha" => cfg.alpha = value.as_f64().ok_or_else(|| invalid_value(name, value))?,
                "learning_rate" => {
                    cfg.learning_rate = value.as_f64().ok_or_else(|| invalid_value(name, value))?
                }
                "max_epochs" => {
                    cfg.max_epochs = value.as_usize().ok_or_else(|| invalid_value(name, value))?
                }
                "batch_size" => {
                    cfg.batch_size = value.as_usize().ok_or_else(|| invalid_value(name, value))?
                }
                "tolerance" => {
                    cfg.tolerance = value.as_f64().ok_or_else(|| invalid_value(name, value))?
                }
                "n_iter_no_change" => {
                    cfg.n_iter_no_change =
                        value.as_usize().ok_or_else(|| invalid_value(name, value))?
                }
                "seed" => {
                    cfg.seed = value.as_usize().ok_or_else(|| invalid_value(name, value))? as u64
                }
                _ => return Err(unknown_param(model, name)),
            },
        }
        Ok(())
    }

    /// Return a copy with every parameter in `params` applied.
    pub fn with_params(&self, params: &ParamSet) -> Result<ModelType> {
        let mut model = self.clone();
        for (name, value) in params {
            model.set_param(name, value)?;
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_type_from_str() {
        assert_eq!("KNN".parse::<ModelType>().unwrap().name(), "knn");
        assert_eq!("logreg".parse::<ModelType>().unwrap().name(), "logistic");
        assert!("gbdt".parse::<ModelType>().is_err());
    }

    #[test]
    fn set_param_coerces_numeric_values() {
        let mut model = ModelType::Svm(SvmConfig::default());
        model.set_param("c", &ParamValue::Int(10)).unwrap();
        model.set_param("gamma", &ParamValue::Float(0.01)).unwrap();
        model.set_param("kernel", &ParamValue::Text("linear".into())).unwrap();
        match model {
            ModelType::Svm(cfg) => {
                assert_eq!(cfg.c, 10.0);
                assert_eq!(cfg.gamma, Some(0.01));
                assert_eq!(cfg.kernel, SvmKernel::Linear);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn set_param_rejects_unknown_and_ill_typed() {
        let mut model = ModelType::default();
        assert!(matches!(
            model.set_param("depth", &ParamValue::Int(3)),
            Err(PipelineError::Configuration(_))
        ));
        assert!(matches!(
            model.set_param("n_neighbors", &ParamValue::Text("five".into())),
            Err(PipelineError::Configuration(_))
        ));
        assert!(matches!(
            model.set_param("n_neighbors", &ParamValue::Int(-1)),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_neighbours() {
        let model = ModelType::Knn(KnnConfig {
            n_neighbors: 0,
            ..KnnConfig::default()
        });
        assert!(model.validate().is_err());
    }

    #[test]
    fn gamma_scale_in_json_matches_set_param() {
        let from_json: ModelType = serde_json::from_str(r#"{"model": "svm", "gamma": "scale"}"#).unwrap();
        let mut from_param = ModelType::Svm(SvmConfig {
            gamma: Some(0.5),
            ..SvmConfig::default()
        });
        from_param.set_param("gamma", &ParamValue::Text("scale".into())).unwrap();
        assert_eq!(from_json, from_param);

        let numeric: ModelType = serde_json::from_str(r#"{"model": "svm", "gamma": 2}"#).unwrap();
        match numeric {
            ModelType::Svm(cfg) => assert_eq!(cfg.gamma, Some(2.0)),
            _ => panic!("expected an SVM config"),
        }
        let null: SvmConfig = serde_json::from_str(r#"{"gamma": null}"#).unwrap();
        assert_eq!(null.gamma, None);
        assert!(serde_json::from_str::<SvmConfig>(r#"{"gamma": "auto"}"#).is_err());
    }

    #[test]
    fn model_type_is_internally_tagged() {
        let json = r#"{"model": "mlp", "hidden_layer_sizes": [16, 8], "activation": "tanh"}"#;
        let model: ModelType = serde_json::from_str(json).unwrap();
        match model {
            ModelType::Mlp(cfg) => {
                assert_eq!(cfg.hidden_layer_sizes, vec![16, 8]);
                assert_eq!(cfg.activation, Activation::Tanh);
                assert_eq!(cfg.max_epochs, MlpConfig::default().max_epochs);
            }
            _ => panic!("expected an MLP config"),
        }
    }
}
