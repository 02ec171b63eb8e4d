//! End-to-end run: load, encode, split, optional search, fit and evaluate.
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::{format_params, ModelType};
use crate::data_handling::Dataset;
use crate::error::Result;
use crate::io::{read_delimited_with_config, LoaderConfig};
use crate::metrics::{accuracy, score, ClassificationReport};
use crate::models::{ClassifierModel, ScaledClassifier};
use crate::preprocessing::{encode_labels, name_degenerate, DegeneratePolicy};
use crate::search::{GridSearch, ParamDistribution, ParamGrid, RandomizedSearch, SearchResult};
use crate::split::{train_test_split, KFold, TrainTestSplit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    Grid,
    Randomized,
}

/// Hyperparameter search settings of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub method: SearchMethod,
    /// Candidate lists for grid search.
    pub grid: ParamGrid,
    /// Sampling space for randomized search.
    pub distributions: BTreeMap<String, ParamDistribution>,
    pub n_iter: usize,
    pub seed: u64,
    pub cv: KFold,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            method: SearchMethod::Grid,
            grid: ParamGrid::new(),
            distributions: BTreeMap::new(),
            n_iter: 10,
            seed: 0,
            cv: KFold::default(),
        }
    }
}

impl SearchConfig {
    /// Run the configured search for `base` on a training partition.
    pub fn run(
        &self,
        base: &ModelType,
        x: &ndarray::Array2<f64>,
        y: &ndarray::Array1<usize>,
        policy: DegeneratePolicy,
    ) -> Result<SearchResult> {
        match self.method {
            SearchMethod::Grid => GridSearch::new(base.clone(), self.grid.clone())
                .with_cv(self.cv.clone())
                .with_policy(policy)
                .fit(x, y),
            SearchMethod::Randomized => RandomizedSearch::new(
                base.clone(),
                self.distributions.clone(),
                self.n_iter,
                self.seed,
            )
            .with_cv(self.cv.clone())
            .with_policy(policy)
            .fit(x, y),
        }
    }
}

/// Configuration of a full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub loader: LoaderConfig,
    pub model: ModelType,
    pub test_fraction: f64,
    pub seed: u64,
    pub degenerate_policy: DegeneratePolicy,
    /// Restrict training to these feature columns.
    pub features: Option<Vec<String>>,
    pub search: Option<SearchConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            loader: LoaderConfig::default(),
            model: ModelType::default(),
            test_fraction: 0.25,
            seed: 42,
            degenerate_policy: DegeneratePolicy::Error,
            features: None,
            search: None,
        }
    }
}

/// Everything a run produces, ready to print or serialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// Final configuration, with searched parameters applied.
    pub model: ModelType,
    pub classes: Vec<String>,
    pub feature_names: Vec<String>,
    pub n_train: usize,
    pub n_test: usize,
    pub train_accuracy: f64,
    pub report: ClassificationReport,
    pub search: Option<SearchResult>,
    pub test_ids: Vec<String>,
    pub test_labels: Vec<String>,
    pub test_predictions: Vec<String>,
}

/// Load `path` and run the pipeline on it.
pub fn run<P: AsRef<Path>>(path: P, config: &PipelineConfig) -> Result<PipelineOutcome> {
    let dataset = read_delimited_with_config(path, &config.loader)?;
    run_dataset(&dataset, config)
}

/// Run the pipeline on an already loaded dataset.
pub fn run_dataset(dataset: &Dataset, config: &PipelineConfig) -> Result<PipelineOutcome> {
    let start = Instant::now();
    let dataset = match &config.features {
        Some(names) => dataset.select_features(names)?,
        None => dataset.clone(),
    };
    dataset.log_input_data_summary();

    let (y, encoder) = encode_labels(&dataset.labels)?;
    log::info!("Encoded {} classes: {}", encoder.n_classes(), encoder.classes().join(", "));

    let split = train_test_split(&dataset.x, &y, config.test_fraction, config.seed)?;
    log::info!(
        "Split into {} training and {} test samples (test_fraction = {}, seed = {})",
        split.train_indices.len(),
        split.test_indices.len(),
        config.test_fraction,
        config.seed
    );

    let policy = config.degenerate_policy;
    let search = match &config.search {
        Some(search_config) => Some(
            search_config
                .run(&config.model, &split.x_train, &split.y_train, policy)
                .map_err(|e| name_degenerate(e, &dataset.feature_names))?,
        ),
        None => None,
    };
    let (model_type, model, train_accuracy) = match &search {
        Some(result) => {
            let best = result.best_candidate();
            log::info!(
                "Adopting searched parameters: {} (mean CV accuracy {:.4} +/- {:.4})",
                format_params(&best.params),
                best.mean_score,
                best.std_score
            );
            let model = result
                .refit_best(&split.x_train, &split.y_train)
                .map_err(|e| name_degenerate(e, &dataset.feature_names))?;
            let train_accuracy = accuracy(&split.y_train, &model.predict(&split.x_train)?)?;
            (result.best_model.clone(), model, train_accuracy)
        }
        None => {
            let (model, train_accuracy) = fit_model(&config.model, &split, policy)
                .map_err(|e| name_degenerate(e, &dataset.feature_names))?;
            (config.model.clone(), model, train_accuracy)
        }
    };
    let predictions = model.predict(&split.x_test)?;
    let report = score(&split.y_test, &predictions, encoder.classes())?;

    log::info!(
        "{} test accuracy: {:.4} (train {:.4})",
        model_type.name(),
        report.accuracy,
        train_accuracy
    );
    log::info!("Pipeline finished in {:?}", start.elapsed());

    Ok(PipelineOutcome {
        model: model_type,
        classes: encoder.classes().to_vec(),
        feature_names: dataset.feature_names.clone(),
        n_train: split.train_indices.len(),
        n_test: split.test_indices.len(),
        train_accuracy,
        report,
        search,
        test_ids: split.test_indices.iter().map(|&i| dataset.ids[i].clone()).collect(),
        test_labels: encoder.inverse_transform(&split.y_test)?,
        test_predictions: encoder.inverse_transform(&predictions)?,
    })
}

/// Fit `model_type` on the training partition, scaling with training
/// statistics only. Returns the fitted model and its training accuracy.
pub fn fit_model(
    model_type: &ModelType,
    split: &TrainTestSplit,
    policy: DegeneratePolicy,
) -> Result<(ScaledClassifier, f64)> {
    log::info!("Fitting {} on {} training samples", model_type.name(), split.x_train.nrows());
    let mut model = ScaledClassifier::from_model_type(model_type, policy)?;
    model.fit(&split.x_train, &split.y_train)?;
    let train_accuracy = accuracy(&split.y_train, &model.predict(&split.x_train)?)?;
    Ok((model, train_accuracy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KnnConfig, ParamValue};
    use crate::error::PipelineError;
    use ndarray::Array2;

    fn dataset() -> Dataset {
        let n = 40;
        let x = Array2::from_shape_fn((n, 3), |(r, c)| {
            let offset = if r % 2 == 0 { 0.0 } else { 4.0 };
            offset + ((r * 5 + c * 7) % 13) as f64 * 0.1
        });
        Dataset::new(
            (0..n).map(|i| format!("s{}", i)).collect(),
            vec!["f1".into(), "f2".into(), "f3".into()],
            x,
            (0..n).map(|i| if i % 2 == 0 { "B".to_string() } else { "M".to_string() }).collect(),
        )
        .unwrap()
    }

    #[test]
    fn default_run_scores_separable_data() {
        let outcome = run_dataset(&dataset(), &PipelineConfig::default()).unwrap();
        assert_eq!(outcome.n_train + outcome.n_test, 40);
        assert_eq!(outcome.n_test, 10);
        assert_eq!(outcome.classes, vec!["B".to_string(), "M".to_string()]);
        assert_eq!(outcome.report.accuracy, 1.0);
        assert_eq!(outcome.test_predictions, outcome.test_labels);
    }

    #[test]
    fn grid_search_result_is_adopted() {
        let mut grid = ParamGrid::new();
        grid.insert(
            "n_neighbors".to_string(),
            vec![ParamValue::Int(1), ParamValue::Int(3), ParamValue::Int(5)],
        );
        let config = PipelineConfig {
            model: ModelType::Knn(KnnConfig::default()),
            search: Some(SearchConfig {
                grid,
                cv: KFold::new(3, 0),
                ..SearchConfig::default()
            }),
            ..PipelineConfig::default()
        };
        let outcome = run_dataset(&dataset(), &config).unwrap();
        let search = outcome.search.as_ref().unwrap();
        assert_eq!(search.n_evaluations, 3);
        // every k separates the classes, so the first candidate wins
        assert_eq!(search.best_index, 0);
        assert_eq!(outcome.model, ModelType::Knn(KnnConfig { n_neighbors: 1, ..KnnConfig::default() }));
        // the refitted winner is what gets scored
        assert_eq!(outcome.train_accuracy, 1.0);
        assert_eq!(outcome.report.accuracy, 1.0);
    }

    #[test]
    fn degenerate_feature_is_named() {
        let mut ds = dataset();
        ds.x.column_mut(2).fill(1.0);
        match run_dataset(&ds, &PipelineConfig::default()) {
            Err(PipelineError::DegenerateFeature { column, name }) => {
                assert_eq!(column, 2);
                assert_eq!(name, "f3");
            }
            other => panic!("expected a degenerate feature error, got {:?}", other.map(|o| o.model)),
        }

        let lenient = PipelineConfig {
            degenerate_policy: DegeneratePolicy::Zero,
            ..PipelineConfig::default()
        };
        assert!(run_dataset(&ds, &lenient).is_ok());
    }
}
