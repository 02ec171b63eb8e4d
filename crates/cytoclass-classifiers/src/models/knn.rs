use std::collections::BTreeMap;

use linfa_nn::distance::{Distance, L2Dist};
use linfa_nn::{CommonNearestNeighbour, NearestNeighbour};
use ndarray::{Array1, Array2};

use crate::config::{KnnAlgorithm, KnnConfig, KnnWeights};
use crate::error::{PipelineError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::utils::{check_query, check_training_data, not_fitted};

/// k-nearest-neighbour majority vote over a `linfa-nn` spatial index.
///
/// Equal vote weights are resolved in favour of the lowest label code. With
/// distance weighting, neighbours at distance zero outvote everything else.
pub struct KnnClassifier {
    config: KnnConfig,
    train: Option<(Array2<f64>, Array1<usize>)>,
}

impl KnnClassifier {
    pub fn new(config: KnnConfig) -> Self {
        KnnClassifier { config, train: None }
    }

    fn index_kind(&self) -> CommonNearestNeighbour {
        match self.config.algorithm {
            KnnAlgorithm::KdTree => CommonNearestNeighbour::KdTree,
            KnnAlgorithm::Brute => CommonNearestNeighbour::LinearSearch,
        }
    }
}

/// Pick the winning code from per-code vote weights.
fn vote(votes: &BTreeMap<usize, f64>) -> usize {
    let mut winner: Option<(usize, f64)> = None;
    for (&code, &weight) in votes {
        match winner {
            Some((_, best)) if weight <= best => {}
            _ => winner = Some((code, weight)),
        }
    }
    winner.map(|(code, _)| code).unwrap_or(0)
}

impl ClassifierModel for KnnClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
        check_training_data(x, y)?;
        log::trace!(
            "KNN storing {} training rows (k = {}, {:?})",
            x.nrows(),
            self.config.n_neighbors,
            self.config.algorithm
        );
        self.train = Some((x.to_owned(), y.to_owned()));
        Ok(())
    }

    /// The index borrows the training matrix, so it is rebuilt here on every
    /// call rather than stored alongside it. Predict large batches in one call.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let (x_train, y_train) = self.train.as_ref().ok_or_else(|| not_fitted(self.name()))?;
        check_query(x, x_train.ncols())?;

        let index = self
            .index_kind()
            .from_batch(x_train, L2Dist)
            .map_err(|e| PipelineError::Model(format!("failed to build KNN index: {}", e)))?;
        let k = self.config.n_neighbors.min(x_train.nrows());

        let mut predictions = Array1::zeros(x.nrows());
        for (row, query) in x.outer_iter().enumerate() {
            let neighbours = index
                .k_nearest(query.view(), k)
                .map_err(|e| PipelineError::Model(format!("KNN query failed: {}", e)))?;

            let mut votes: BTreeMap<usize, f64> = BTreeMap::new();
            match self.config.weights {
                KnnWeights::Uniform => {
                    for (_, idx) in &neighbours {
                        *votes.entry(y_train[*idx]).or_insert(0.0) += 1.0;
                    }
                }
                KnnWeights::Distance => {
                    let distances: Vec<(f64, usize)> = neighbours
                        .iter()
                        .map(|(point, idx)| (L2Dist.distance(query.view(), point.view()), *idx))
                        .collect();
                    let exact = distances.iter().any(|(d, _)| *d == 0.0);
                    for (d, idx) in distances {
                        let weight = match (exact, d == 0.0) {
                            (true, true) => 1.0,
                            (true, false) => continue,
                            (false, _) => 1.0 / d,
                        };
                        *votes.entry(y_train[idx]).or_insert(0.0) += weight;
                    }
                }
            }
            predictions[row] = vote(&votes);
        }
        Ok(predictions)
    }

    fn name(&self) -> &str {
        "knn"
    }
}
