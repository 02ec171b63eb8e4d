//! Integration tests for run configuration loading and helpers.

use cytoclass_classifiers::config::{ModelType, ParamValue};
use cytoclass_classifiers::pipeline::SearchMethod;
use cytoclass_cli::commands::parse_param_values;
use cytoclass_cli::config::{load_run_config, validate_data_file, write_json, RunConfig};

// ---------------------------------------------------------------------------
// validate_data_file
// ---------------------------------------------------------------------------

#[test]
fn validate_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wdbc.data");
    std::fs::File::create(&path).unwrap();
    assert!(validate_data_file(path.to_str().unwrap()).is_ok());
}

#[test]
fn validate_directory_errors() {
    let dir = tempfile::tempdir().unwrap();
    assert!(validate_data_file(dir.path().to_str().unwrap()).is_err());
}

#[test]
fn validate_nonexistent_file_errors() {
    assert!(validate_data_file("/nonexistent/path/wdbc.data").is_err());
}

// ---------------------------------------------------------------------------
// RunConfig defaults & serialization
// ---------------------------------------------------------------------------

#[test]
fn run_config_default_values() {
    let cfg = RunConfig::default();
    assert_eq!(cfg.pipeline.test_fraction, 0.25);
    assert_eq!(cfg.pipeline.seed, 42);
    assert!(cfg.pipeline.search.is_none());
    assert!(cfg.output_file.is_none());
    assert_eq!(cfg.pipeline.model.name(), "knn");
}

#[test]
fn run_config_round_trips_json() {
    let cfg = RunConfig::default();
    let json = serde_json::to_string(&cfg).unwrap();
    let cfg2: RunConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(cfg.data, cfg2.data);
    assert_eq!(cfg.pipeline.model, cfg2.pipeline.model);
}

#[test]
fn run_config_loads_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    std::fs::write(
        &path,
        r#"{
            "data": "cells.data",
            "pipeline": {
                "model": {"model": "svm", "kernel": "linear", "c": 2.0},
                "test_fraction": 0.3,
                "search": {"method": "randomized", "n_iter": 4,
                           "distributions": {"c": {"type": "log_uniform", "low": 0.01, "high": 10.0}}}
            }
        }"#,
    )
    .unwrap();

    let cfg = load_run_config(&path).unwrap();
    assert_eq!(cfg.data, "cells.data");
    assert_eq!(cfg.pipeline.test_fraction, 0.3);
    assert_eq!(cfg.pipeline.seed, 42);
    match &cfg.pipeline.model {
        ModelType::Svm(svm) => assert_eq!(svm.c, 2.0),
        other => panic!("expected svm, got {:?}", other),
    }
    let search = cfg.pipeline.search.as_ref().unwrap();
    assert_eq!(search.method, SearchMethod::Randomized);
    assert_eq!(search.n_iter, 4);
    assert_eq!(cfg.report_path("search").to_str(), Some("cytoclass_search_svm.html"));
}

#[test]
fn malformed_config_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(load_run_config(&path).is_err());
}

#[test]
fn write_json_creates_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cfg.json");
    write_json(&RunConfig::default(), &path).unwrap();
    assert!(load_run_config(&path).is_ok());
}

// ---------------------------------------------------------------------------
// parse_param_values
// ---------------------------------------------------------------------------

#[test]
fn parses_layer_lists() {
    let values = parse_param_values("[64],[64,32]").unwrap();
    assert_eq!(
        values,
        vec![ParamValue::Layers(vec![64]), ParamValue::Layers(vec![64, 32])]
    );
}
