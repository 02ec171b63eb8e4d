//! Headerless delimited reader (`id, label, feature_1 … feature_n`).
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::data_handling::{Dataset, WDBC_FEATURE_NAMES};
use crate::error::{PipelineError, Result};

/// Configuration for reading headerless delimited sample files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Field delimiter, a single ASCII character.
    pub delimiter: char,
    /// Column holding sample ids. `None` numbers the rows instead.
    pub id_column: Option<usize>,
    /// Column holding the categorical label.
    pub label_column: usize,
    /// First feature column; every column from here on is numeric.
    pub feature_offset: usize,
    /// Optional feature names. Defaults to the diagnostic names when the file
    /// has exactly 30 features, `feature_<i>` otherwise.
    pub feature_names: Option<Vec<String>>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            id_column: Some(0),
            label_column: 1,
            feature_offset: 2,
            feature_names: None,
        }
    }
}

/// Read a delimited file using the default layout.
pub fn read_delimited<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    read_delimited_with_config(path, &LoaderConfig::default())
}

/// Read a delimited file using a custom layout.
pub fn read_delimited_with_config<P: AsRef<Path>>(path: P, config: &LoaderConfig) -> Result<Dataset> {
    let file = std::fs::File::open(&path)?;
    log::debug!("Reading samples from {}", path.as_ref().display());
    read_from_reader(file, config)
}

/// Parse delimited text held in memory.
pub fn read_delimited_str(content: &str, config: &LoaderConfig) -> Result<Dataset> {
    read_from_reader(content.as_bytes(), config)
}

fn read_from_reader<R: Read>(rdr: R, config: &LoaderConfig) -> Result<Dataset> {
    if !config.delimiter.is_ascii() {
        return Err(PipelineError::Format(format!(
            "delimiter must be a single ASCII character, got '{}'",
            config.delimiter
        )));
    }
    if config.label_column >= config.feature_offset {
        return Err(PipelineError::Format(format!(
            "label column {} must precede the feature offset {}",
            config.label_column, config.feature_offset
        )));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(config.delimiter as u8)
        .from_reader(rdr);

    let mut n_columns: Option<usize> = None;
    let mut ids = Vec::new();
    let mut labels = Vec::new();
    let mut values = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        if is_blank(&record) {
            continue;
        }

        let expected = *n_columns.get_or_insert(record.len());
        if record.len() != expected {
            return Err(PipelineError::Format(format!(
                "row {} has {} columns, expected {}",
                row_idx + 1,
                record.len(),
                expected
            )));
        }
        if expected <= config.label_column {
            return Err(PipelineError::Format(format!(
                "label column {} is absent: row {} has only {} columns",
                config.label_column,
                row_idx + 1,
                expected
            )));
        }
        if expected <= config.feature_offset {
            return Err(PipelineError::Format(format!(
                "no feature columns after offset {} (row {} has {} columns)",
                config.feature_offset,
                row_idx + 1,
                expected
            )));
        }

        let label = &record[config.label_column];
        if label.is_empty() {
            return Err(PipelineError::Format(format!("empty label at row {}", row_idx + 1)));
        }
        labels.push(label.to_string());

        let id = match config.id_column {
            Some(col) => record
                .get(col)
                .ok_or_else(|| {
                    PipelineError::Format(format!("id column {} is absent at row {}", col, row_idx + 1))
                })?
                .to_string(),
            None => ids.len().to_string(),
        };
        ids.push(id);

        for (col, field) in record.iter().enumerate().skip(config.feature_offset) {
            let value = field.parse::<f64>().map_err(|_| {
                PipelineError::Format(format!(
                    "non-numeric value '{}' at row {}, column {}",
                    field,
                    row_idx + 1,
                    col
                ))
            })?;
            values.push(value);
        }
    }

    let Some(n_columns) = n_columns else {
        return Err(PipelineError::Format("input contains no rows".to_string()));
    };
    let n_features = n_columns - config.feature_offset;
    let n_samples = labels.len();

    let x = Array2::from_shape_vec((n_samples, n_features), values)
        .map_err(|e| PipelineError::Format(e.to_string()))?;

    let feature_names = match &config.feature_names {
        Some(names) => names.clone(),
        None if n_features == WDBC_FEATURE_NAMES.len() => {
            WDBC_FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
        }
        None => (0..n_features).map(|i| format!("feature_{}", i + 1)).collect(),
    };

    log::debug!("Parsed {} samples with {} features", n_samples, n_features);
    Dataset::new(ids, feature_names, x, labels)
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|f| f.is_empty())
}
