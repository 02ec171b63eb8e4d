//! cytoclass-classifiers: classical classifiers for tabular cytology data.
//!
//! The crate walks a headerless `id, label, feature_1 … feature_n` table
//! through label encoding, train-only feature scaling, seeded train/test
//! splitting, four classifier families (k-nearest-neighbours, support vector
//! machines, logistic regression and a multilayer perceptron), evaluation,
//! cross-validated grid and randomized hyperparameter search, and plotly/HTML
//! reporting.
//!
//! Classifier internals come from `linfa`, `linfa-svm`, `linfa-logistic` and
//! `linfa-nn`; the perceptron is a small `ndarray` implementation behind the
//! same `ClassifierModel` trait.
pub mod config;
pub mod cross_validation;
pub mod curve;
pub mod data_handling;
pub mod error;
pub mod io;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod report;
pub mod search;
pub mod split;
pub mod stats;

pub use error::{PipelineError, Result};
