//! Error types for the microbiome-diversity library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum DiversityError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Sample '{sample_id}' has zero total abundance")]
    EmptySample { sample_id: String },

    #[error("Unknown metadata column '{0}'")]
    UnknownMetadataColumn(String),

    #[error("Insufficient group size: {0}")]
    InsufficientGroupSize(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DiversityError {
    /// Stable, machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DiversityError::Io(_) => "io",
            DiversityError::Csv(_) => "csv",
            DiversityError::MalformedInput(_) => "malformed_input",
            DiversityError::EmptySample { .. } => "empty_sample",
            DiversityError::UnknownMetadataColumn(_) => "unknown_metadata_column",
            DiversityError::InsufficientGroupSize(_) => "insufficient_group_size",
            DiversityError::InvalidParameter(_) => "invalid_parameter",
            DiversityError::Numerical(_) => "numeric_overflow_guard",
            DiversityError::Yaml(_) => "yaml",
            DiversityError::Json(_) => "json",
        }
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, DiversityError>;
