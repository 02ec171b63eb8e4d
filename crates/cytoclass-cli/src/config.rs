use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use cytoclass_classifiers::config::ModelType;
use cytoclass_classifiers::pipeline::PipelineConfig;

/// A JSON run configuration: where the data lives, how the pipeline runs and
/// where its results go.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data: String,
    /// JSON file receiving the run outcome.
    pub output_file: Option<String>,
    /// HTML report path. Defaults to `cytoclass_<command>_<model>.html`.
    pub report_file: Option<String>,
    /// Two feature names to draw a decision boundary over.
    pub boundary_features: Option<Vec<String>>,
    /// Features drawn as per-class histograms in reports.
    pub histogram_features: Vec<String>,
    pub pipeline: PipelineConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            data: String::from("wdbc.data"),
            output_file: None,
            report_file: None,
            boundary_features: None,
            histogram_features: Vec::new(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load `config_path` and apply the `--data`, `--model` and `--output`
    /// overrides present in `matches`.
    pub fn from_arguments(config_path: &PathBuf, matches: &ArgMatches) -> Result<Self> {
        let mut config = load_run_config(config_path)?;

        if let Some(data) = matches.try_get_one::<String>("data").ok().flatten() {
            config.data = data.clone();
        }
        if let Some(model) = matches.try_get_one::<String>("model").ok().flatten() {
            config.pipeline.model = ModelType::from_str(model).map_err(anyhow::Error::msg)?;
        }
        if let Some(output_file) = matches.try_get_one::<String>("output_file").ok().flatten() {
            config.output_file = Some(output_file.clone());
        }

        validate_data_file(&config.data)?;
        Ok(config)
    }

    pub fn report_path(&self, command: &str) -> PathBuf {
        match &self.report_file {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(format!(
                "cytoclass_{}_{}.html",
                command,
                self.pipeline.model.name()
            )),
        }
    }
}

/// Load a run configuration from a JSON file.
pub fn load_run_config<P: AsRef<Path>>(path: P) -> Result<RunConfig> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: RunConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}

/// The data file must exist and be a regular file.
pub fn validate_data_file(path: &str) -> Result<()> {
    let pb = PathBuf::from(path);
    if !pb.is_file() {
        anyhow::bail!("Data file does not exist: {}", path);
    }
    Ok(())
}

/// Write `value` as pretty JSON, creating parent directories as needed.
pub fn write_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}
