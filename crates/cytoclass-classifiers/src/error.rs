use thiserror::Error;

/// Errors raised by the loading, preprocessing, training and search stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed input rows, unparsable cells or mismatched shapes.
    #[error("format error: {0}")]
    Format(String),

    /// A feature column with zero variance under the `Error` scaling policy.
    #[error("feature column {column} ({name}) has zero variance")]
    DegenerateFeature { column: usize, name: String },

    /// Label value or code not covered by a fitted encoder.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Empty or ill-formed train/test or fold partitions.
    #[error("partition error: {0}")]
    Partition(String),

    /// Invalid model or search configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Failure inside a classifier backend, or a classifier used out of order.
    #[error("model error: {0}")]
    Model(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
