//! Cross-validated hyperparameter search.
//!
//! `GridSearch` evaluates the full Cartesian product of per-parameter
//! candidate lists; `RandomizedSearch` evaluates `n_iter` sampled
//! configurations. Both score each configuration by k-fold cross-validation
//! on the training data and keep the per-candidate table. Candidates are
//! evaluated in parallel but reported in enumeration order, and the best
//! configuration is the first one reaching the highest mean accuracy.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Exp, Uniform};

use crate::config::{format_params, ModelType, ParamSet, ParamValue};
use crate::cross_validation::cross_val_score;
use crate::error::{PipelineError, Result};
use crate::models::{ClassifierModel, ScaledClassifier};
use crate::preprocessing::DegeneratePolicy;
use crate::split::KFold;

/// Candidate values per parameter name.
pub type ParamGrid = BTreeMap<String, Vec<ParamValue>>;

/// Number of combinations in `grid`.
pub fn grid_size(grid: &ParamGrid) -> usize {
    grid.values().map(|v| v.len()).product()
}

/// Enumerate every combination of `grid`. Parameter names are visited in
/// sorted order and the last name varies fastest.
pub fn expand_grid(grid: &ParamGrid) -> Result<Vec<ParamSet>> {
    if grid.is_empty() {
        return Err(PipelineError::Configuration("parameter grid is empty".to_string()));
    }
    if let Some((name, _)) = grid.iter().find(|(_, values)| values.is_empty()) {
        return Err(PipelineError::Configuration(format!(
            "parameter '{}' has no candidate values",
            name
        )));
    }
    Ok((0..grid_size(grid)).map(|i| grid_point(grid, i)).collect())
}

/// The `index`-th combination in `expand_grid` order.
fn grid_point(grid: &ParamGrid, mut index: usize) -> ParamSet {
    let mut params = ParamSet::new();
    for (name, values) in grid.iter().rev() {
        params.insert(name.clone(), values[index % values.len()].clone());
        index /= values.len();
    }
    params
}

/// Sampling distribution for one parameter of a randomized search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamDistribution {
    /// Uniform choice among discrete values.
    Choice { values: Vec<ParamValue> },
    /// Continuous uniform on `[low, high)`.
    Uniform { low: f64, high: f64 },
    /// `exp(U(ln low, ln high))`, for scale parameters such as `c` or `gamma`.
    LogUniform { low: f64, high: f64 },
    /// Integer uniform on `[low, high]`.
    IntUniform { low: i64, high: i64 },
    /// Exponential with the given rate.
    Exponential { rate: f64 },
}

fn bad_distribution<E: std::fmt::Display>(name: &str, e: E) -> PipelineError {
    PipelineError::Configuration(format!("invalid distribution for '{}': {}", name, e))
}

impl ParamDistribution {
    fn is_discrete(&self) -> bool {
        matches!(self, ParamDistribution::Choice { .. })
    }

    fn validate(&self, name: &str) -> Result<()> {
        match self {
            ParamDistribution::Choice { values } if values.is_empty() => Err(
                PipelineError::Configuration(format!("parameter '{}' has no candidate values", name)),
            ),
            ParamDistribution::Uniform { low, high } => {
                Uniform::new(*low, *high).map_err(|e| bad_distribution(name, e))?;
                Ok(())
            }
            ParamDistribution::LogUniform { low, high } if !(*low > 0.0 && high > low) => {
                Err(bad_distribution(name, "log-uniform bounds must satisfy 0 < low < high"))
            }
            ParamDistribution::IntUniform { low, high } if high < low => {
                Err(bad_distribution(name, "integer bounds must satisfy low <= high"))
            }
            ParamDistribution::Exponential { rate } => {
                Exp::new(*rate).map_err(|e| bad_distribution(name, e))?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn sample<R: Rng>(&self, name: &str, rng: &mut R) -> Result<ParamValue> {
        let value = match self {
            ParamDistribution::Choice { values } => values
                .choose(rng)
                .cloned()
                .ok_or_else(|| bad_distribution(name, "no candidate values"))?,
            ParamDistribution::Uniform { low, high } => {
                let dist = Uniform::new(*low, *high).map_err(|e| bad_distribution(name, e))?;
                ParamValue::Float(dist.sample(rng))
            }
            ParamDistribution::LogUniform { low, high } => {
                let dist =
                    Uniform::new(low.ln(), high.ln()).map_err(|e| bad_distribution(name, e))?;
                ParamValue::Float(dist.sample(rng).exp())
            }
            ParamDistribution::IntUniform { low, high } => ParamValue::Int(rng.gen_range(*low..=*high)),
            ParamDistribution::Exponential { rate } => {
                let dist = Exp::new(*rate).map_err(|e| bad_distribution(name, e))?;
                ParamValue::Float(dist.sample(rng))
            }
        };
        Ok(value)
    }
}

/// One evaluated configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub params: ParamSet,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    /// 1 for the best mean score; equal means share a rank.
    pub rank: usize,
}

/// Outcome of a grid or randomized search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub strategy: String,
    pub model: String,
    pub n_splits: usize,
    pub candidates: Vec<CandidateResult>,
    pub best_index: usize,
    pub best_params: ParamSet,
    pub best_score: f64,
    /// The base configuration with `best_params` applied.
    pub best_model: ModelType,
    pub n_evaluations: usize,
    pub policy: DegeneratePolicy,
}

impl SearchResult {
    pub fn best_candidate(&self) -> &CandidateResult {
        &self.candidates[self.best_index]
    }

    /// Candidates ordered by rank, best first.
    pub fn ranked(&self) -> Vec<&CandidateResult> {
        let mut ranked: Vec<&CandidateResult> = self.candidates.iter().collect();
        ranked.sort_by_key(|c| c.rank);
        ranked
    }

    /// Fit the winning configuration on the whole training set.
    pub fn refit_best(&self, x: &Array2<f64>, y: &Array1<usize>) -> Result<ScaledClassifier> {
        let mut model = ScaledClassifier::from_model_type(&self.best_model, self.policy)?;
        model.fit(x, y)?;
        Ok(model)
    }
}

/// Resolve every parameter set against `base` before any training starts,
/// so unknown names and ill-typed values fail fast.
fn resolve_candidates(base: &ModelType, param_sets: Vec<ParamSet>) -> Result<Vec<(ParamSet, ModelType)>> {
    param_sets
        .into_iter()
        .map(|params| {
            let model = base.with_params(&params)?;
            model.validate()?;
            Ok((params, model))
        })
        .collect()
}

fn evaluate(
    strategy: &str,
    base: &ModelType,
    candidates: Vec<(ParamSet, ModelType)>,
    x: &Array2<f64>,
    y: &Array1<usize>,
    cv: &KFold,
    policy: DegeneratePolicy,
) -> Result<SearchResult> {
    let folds = cv.split(y)?;
    log::info!(
        "{} search over {} {} configurations with {}-fold cross-validation",
        strategy,
        candidates.len(),
        base.name(),
        folds.len()
    );

    let mut scored: Vec<CandidateResult> = candidates
        .par_iter()
        .map(|(params, model)| {
            let cv_result = cross_val_score(model, x, y, &folds, policy)?;
            log::debug!(
                "{}: mean accuracy {:.4} (+/- {:.4})",
                format_params(params),
                cv_result.mean_score,
                cv_result.std_score
            );
            Ok(CandidateResult {
                params: params.clone(),
                fold_scores: cv_result.fold_scores(),
                mean_score: cv_result.mean_score,
                std_score: cv_result.std_score,
                rank: 0,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let means: Vec<f64> = scored.iter().map(|c| c.mean_score).collect();
    for candidate in scored.iter_mut() {
        candidate.rank = 1 + means.iter().filter(|&&m| m > candidate.mean_score).count();
    }

    let mut best_index = 0;
    for (i, candidate) in scored.iter().enumerate() {
        if candidate.mean_score > scored[best_index].mean_score {
            best_index = i;
        }
    }
    let best_params = scored[best_index].params.clone();
    let best_score = scored[best_index].mean_score;
    let best_model = candidates[best_index].1.clone();

    log::info!(
        "Best {} configuration: {} (mean accuracy {:.4})",
        base.name(),
        format_params(&best_params),
        best_score
    );

    Ok(SearchResult {
        strategy: strategy.to_string(),
        model: base.name().to_string(),
        n_splits: folds.len(),
        n_evaluations: scored.len(),
        candidates: scored,
        best_index,
        best_params,
        best_score,
        best_model,
        policy,
    })
}

/// Exhaustive search over a parameter grid.
#[derive(Debug, Clone)]
pub struct GridSearch {
    pub base: ModelType,
    pub grid: ParamGrid,
    pub cv: KFold,
    pub policy: DegeneratePolicy,
}

impl GridSearch {
    pub fn new(base: ModelType, grid: ParamGrid) -> Self {
        GridSearch {
            base,
            grid,
            cv: KFold::default(),
            policy: DegeneratePolicy::default(),
        }
    }

    pub fn with_cv(mut self, cv: KFold) -> Self {
        self.cv = cv;
        self
    }

    pub fn with_policy(mut self, policy: DegeneratePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Evaluate every grid point. Performs exactly `grid_size` evaluations.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<usize>) -> Result<SearchResult> {
        let candidates = resolve_candidates(&self.base, expand_grid(&self.grid)?)?;
        evaluate("grid", &self.base, candidates, x, y, &self.cv, self.policy)
    }
}

/// Randomized search over discrete lists and continuous distributions.
#[derive(Debug, Clone)]
pub struct RandomizedSearch {
    pub base: ModelType,
    pub space: BTreeMap<String, ParamDistribution>,
    pub n_iter: usize,
    pub seed: u64,
    pub cv: KFold,
    pub policy: DegeneratePolicy,
}

impl RandomizedSearch {
    pub fn new(base: ModelType, space: BTreeMap<String, ParamDistribution>, n_iter: usize, seed: u64) -> Self {
        RandomizedSearch {
            base,
            space,
            n_iter,
            seed,
            cv: KFold::default(),
            policy: DegeneratePolicy::default(),
        }
    }

    pub fn with_cv(mut self, cv: KFold) -> Self {
        self.cv = cv;
        self
    }

    pub fn with_policy(mut self, policy: DegeneratePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Draw `n_iter` parameter sets.
    ///
    /// When every parameter is a discrete choice, grid points are sampled
    /// without replacement. Otherwise each parameter is drawn independently.
    pub fn sample_params(&self) -> Result<Vec<ParamSet>> {
        if self.space.is_empty() {
            return Err(PipelineError::Configuration("search space is empty".to_string()));
        }
        if self.n_iter == 0 {
            return Err(PipelineError::Configuration("n_iter must be at least 1".to_string()));
        }
        for (name, dist) in &self.space {
            dist.validate(name)?;
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        if self.space.values().all(ParamDistribution::is_discrete) {
            let grid: ParamGrid = self
                .space
                .iter()
                .filter_map(|(name, dist)| match dist {
                    ParamDistribution::Choice { values } => Some((name.clone(), values.clone())),
                    _ => None,
                })
                .collect();
            let size = grid_size(&grid);
            if self.n_iter > size {
                return Err(PipelineError::Configuration(format!(
                    "n_iter ({}) exceeds the {} distinct configurations of a discrete search space",
                    self.n_iter, size
                )));
            }
            let picks = rand::seq::index::sample(&mut rng, size, self.n_iter);
            return Ok(picks.into_iter().map(|i| grid_point(&grid, i)).collect());
        }

        (0..self.n_iter)
            .map(|_| {
                self.space
                    .iter()
                    .map(|(name, dist)| Ok((name.clone(), dist.sample(name, &mut rng)?)))
                    .collect::<Result<ParamSet>>()
            })
            .collect()
    }

    /// Evaluate `n_iter` sampled configurations.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<usize>) -> Result<SearchResult> {
        let candidates = resolve_candidates(&self.base, self.sample_params()?)?;
        evaluate("randomized", &self.base, candidates, x, y, &self.cv, self.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KnnConfig, SvmConfig};

    fn grid(entries: &[(&str, Vec<ParamValue>)]) -> ParamGrid {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn ints(values: &[i64]) -> Vec<ParamValue> {
        values.iter().map(|&v| ParamValue::Int(v)).collect()
    }

    fn texts(values: &[&str]) -> Vec<ParamValue> {
        values.iter().map(|v| ParamValue::Text(v.to_string())).collect()
    }

    #[test]
    fn expansion_order_last_name_fastest() {
        let g = grid(&[("weights", texts(&["uniform", "distance"])), ("n_neighbors", ints(&[1, 3]))]);
        let points = expand_grid(&g).unwrap();
        assert_eq!(points.len(), 4);
        let rendered: Vec<String> = points.iter().map(format_params).collect();
        assert_eq!(
            rendered,
            vec![
                "n_neighbors=1, weights=uniform",
                "n_neighbors=1, weights=distance",
                "n_neighbors=3, weights=uniform",
                "n_neighbors=3, weights=distance",
            ]
        );
    }

    #[test]
    fn empty_grids_are_configuration_errors() {
        assert!(matches!(expand_grid(&ParamGrid::new()), Err(PipelineError::Configuration(_))));
        let g = grid(&[("n_neighbors", vec![])]);
        assert!(matches!(expand_grid(&g), Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn unknown_parameter_fails_before_training() {
        let g = grid(&[("depth", ints(&[1, 2]))]);
        let candidates = expand_grid(&g).unwrap();
        assert!(matches!(
            resolve_candidates(&ModelType::Knn(KnnConfig::default()), candidates),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn discrete_randomized_search_samples_without_replacement() {
        let mut space = BTreeMap::new();
        space.insert("n_neighbors".to_string(), ParamDistribution::Choice { values: ints(&[1, 3, 5, 7]) });
        let search = RandomizedSearch::new(ModelType::default(), space.clone(), 4, 9);
        let mut drawn: Vec<String> = search.sample_params().unwrap().iter().map(format_params).collect();
        drawn.sort();
        drawn.dedup();
        assert_eq!(drawn.len(), 4);

        let too_many = RandomizedSearch::new(ModelType::default(), space, 5, 9);
        assert!(matches!(too_many.sample_params(), Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn continuous_sampling_respects_bounds_and_seed() {
        let mut space = BTreeMap::new();
        space.insert("c".to_string(), ParamDistribution::LogUniform { low: 0.01, high: 100.0 });
        space.insert("kernel".to_string(), ParamDistribution::Choice { values: texts(&["linear", "rbf"]) });
        space.insert("degree".to_string(), ParamDistribution::IntUniform { low: 2, high: 4 });
        let search = RandomizedSearch::new(ModelType::Svm(SvmConfig::default()), space, 25, 3);
        let a = search.sample_params().unwrap();
        assert_eq!(a.len(), 25);
        for params in &a {
            let c = params["c"].as_f64().unwrap();
            assert!((0.01..100.0).contains(&c));
            let degree = params["degree"].as_usize().unwrap();
            assert!((2..=4).contains(&degree));
        }
        assert_eq!(a, search.sample_params().unwrap());
    }

    #[test]
    fn refit_best_predicts_training_rows() {
        let x = Array2::from_shape_fn((24, 2), |(r, c)| {
            let offset = if r % 2 == 0 { 0.0 } else { 6.0 };
            offset + ((r * 3 + c * 5) % 7) as f64 * 0.1
        });
        let y: Array1<usize> = (0..24).map(|r| r % 2).collect();
        let g = grid(&[("n_neighbors", ints(&[1, 3]))]);
        let result = GridSearch::new(ModelType::Knn(KnnConfig::default()), g)
            .with_cv(KFold::new(3, 2))
            .fit(&x, &y)
            .unwrap();

        assert_eq!(result.best_candidate().params, result.best_params);
        assert_eq!(result.best_candidate().rank, 1);
        let model = result.refit_best(&x, &y).unwrap();
        assert!(model.scaler().is_some());
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut space = BTreeMap::new();
        space.insert("n_neighbors".to_string(), ParamDistribution::Choice { values: ints(&[1]) });
        let search = RandomizedSearch::new(ModelType::default(), space, 0, 0);
        assert!(search.sample_params().is_err());
    }

    #[test]
    fn invalid_distributions_rejected() {
        let mut space = BTreeMap::new();
        space.insert("c".to_string(), ParamDistribution::LogUniform { low: 0.0, high: 1.0 });
        let search = RandomizedSearch::new(ModelType::Svm(SvmConfig::default()), space, 1, 0);
        assert!(matches!(search.sample_params(), Err(PipelineError::Configuration(_))));
    }
}
