//! End-to-end runs over a sample file written to a temporary directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cytoclass_classifiers::config::{KnnConfig, ModelType, ParamValue};
use cytoclass_classifiers::io::read_delimited;
use cytoclass_classifiers::pipeline::{self, PipelineConfig, SearchConfig, SearchMethod};
use cytoclass_classifiers::preprocessing::encode_labels;
use cytoclass_classifiers::search::{ParamDistribution, ParamGrid};
use cytoclass_classifiers::split::{train_test_split, KFold};
use cytoclass_classifiers::PipelineError;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn write_samples(dir: &Path, n: usize) -> PathBuf {
    let mut content = String::new();
    for r in 0..n {
        let (label, offset) = if r % 3 == 0 { ("M", 3.0) } else { ("B", 0.0) };
        let features: Vec<String> = (0..4usize)
            .map(|c| format!("{:.3}", offset + ((r * 7 + c * 3) % 17) as f64 * 0.05))
            .collect();
        content.push_str(&format!("{},{},{}\n", 84300 + r, label, features.join(",")));
    }
    let path = dir.join("samples.data");
    std::fs::write(&path, content).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Loading and splitting
// ---------------------------------------------------------------------------

#[test]
fn split_partitions_loaded_rows() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = read_delimited(write_samples(dir.path(), 60)).unwrap();
    assert_eq!(dataset.n_samples(), 60);
    assert_eq!(dataset.n_features(), 4);
    assert_eq!(dataset.ids[0], "84300");

    let (y, encoder) = encode_labels(&dataset.labels).unwrap();
    assert_eq!(encoder.classes(), &["B".to_string(), "M".to_string()]);
    assert_eq!(encoder.inverse_transform(&y).unwrap(), dataset.labels);

    let split = train_test_split(&dataset.x, &y, 0.2, 7).unwrap();
    assert_eq!(split.x_train.nrows() + split.x_test.nrows(), 60);
    let mut all: Vec<usize> = split.train_indices.iter().chain(split.test_indices.iter()).copied().collect();
    all.sort_unstable();
    assert_eq!(all, (0..60).collect::<Vec<_>>());

    let again = train_test_split(&dataset.x, &y, 0.2, 7).unwrap();
    assert_eq!(split.test_indices, again.test_indices);
}

// ---------------------------------------------------------------------------
// Pipeline runs
// ---------------------------------------------------------------------------

#[test]
fn default_pipeline_run_from_file() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = write_samples(dir.path(), 60);
    let outcome = pipeline::run(&path, &PipelineConfig::default()).unwrap();
    assert_eq!(outcome.n_train, 45);
    assert_eq!(outcome.n_test, 15);
    assert_eq!(outcome.test_ids.len(), 15);
    assert!((0.0..=1.0).contains(&outcome.report.accuracy));
    assert_eq!(outcome.report.accuracy, 1.0);

    let same = pipeline::run(&path, &PipelineConfig::default()).unwrap();
    assert_eq!(outcome.test_ids, same.test_ids);
    assert_eq!(outcome.test_predictions, same.test_predictions);
}

#[test]
fn grid_search_evaluates_every_combination() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = write_samples(dir.path(), 60);
    let mut grid = ParamGrid::new();
    grid.insert("n_neighbors".to_string(), vec![ParamValue::Int(1), ParamValue::Int(3)]);
    grid.insert(
        "weights".to_string(),
        vec![ParamValue::Text("uniform".to_string()), ParamValue::Text("distance".to_string())],
    );
    let config = PipelineConfig {
        model: ModelType::Knn(KnnConfig::default()),
        search: Some(SearchConfig {
            grid,
            cv: KFold::new(3, 1),
            ..SearchConfig::default()
        }),
        ..PipelineConfig::default()
    };

    let outcome = pipeline::run(&path, &config).unwrap();
    let search = outcome.search.unwrap();
    assert_eq!(search.n_evaluations, 4);
    assert_eq!(search.candidates.len(), 4);
    assert!(search.candidates.iter().all(|c| c.fold_scores.len() == 3));
    assert_eq!(outcome.model, search.best_model);
}

#[test]
fn randomized_search_evaluates_n_iter_candidates() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = write_samples(dir.path(), 60);
    let mut space = BTreeMap::new();
    space.insert(
        "c".to_string(),
        ParamDistribution::LogUniform { low: 0.01, high: 10.0 },
    );
    let config = PipelineConfig {
        model: "logistic".parse().unwrap(),
        search: Some(SearchConfig {
            method: SearchMethod::Randomized,
            distributions: space,
            n_iter: 5,
            seed: 3,
            cv: KFold::new(3, 0),
            ..SearchConfig::default()
        }),
        ..PipelineConfig::default()
    };

    let outcome = pipeline::run(&path, &config).unwrap();
    let search = outcome.search.unwrap();
    assert_eq!(search.n_evaluations, 5);
    for candidate in &search.candidates {
        let c = candidate.params["c"].as_f64().unwrap();
        assert!((0.01..10.0).contains(&c), "c = {} outside the sampled range", c);
    }
}

#[test]
fn missing_file_is_io_error() {
    let result = pipeline::run("/nonexistent/samples.data", &PipelineConfig::default());
    assert!(matches!(result, Err(PipelineError::Io(_))));
}

#[test]
fn ragged_rows_are_format_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ragged.data");
    std::fs::write(&path, "1,B,1.0,2.0\n2,M,3.0\n").unwrap();
    assert!(matches!(read_delimited(&path), Err(PipelineError::Format(_)) | Err(PipelineError::Csv(_))));
}
