//! Common error types for me-pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for me-pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the me-pipeline crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error (runs manifest, sidecars)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Loaded value does not have the declared field type
    #[error("Type of '{field}' is '{found}' but should be '{expected}'")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    /// Field absent from input and schema declares no default
    #[error("Field '{field}' is missing and has no default value")]
    MissingField { field: String },

    /// Input names a field the schema does not declare
    #[error("Unknown field '{field}'")]
    UnknownField { field: String },

    /// Value has the right type but fails the field validator
    #[error("Invalid value: {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Params file line could not be parsed
    #[error("Params syntax error at line {line}: {reason}")]
    ParamsSyntax { line: usize, reason: String },

    /// Magnitude and phase override key sets differ
    #[error("Magnitude run IDs {mag:?} do not match phase run IDs {phase:?}")]
    RunMapMismatch { mag: Vec<u32>, phase: Vec<u32> },

    /// Override refers to a run the map does not know about
    #[error("Unknown run ID: {0}")]
    UnknownRun(u32),

    /// Run has no field-map signature outside MEDIC mode
    #[error("No field map found for run '{0}'")]
    MissingFieldMap(String),

    /// Field-map file referenced by a signature is absent or empty
    #[error("Field map {path}: {reason}")]
    FieldMap { path: PathBuf, reason: String },

    /// Manifest references a study directory that does not exist
    #[error("Study directory not found: {0}")]
    StudyNotFound(PathBuf),

    /// Study directory has no file to inspect
    #[error("Study directory is empty: {0}")]
    EmptyStudy(PathBuf),

    /// Acquisition header could not be read
    #[error("Failed to read header {path}: {reason}")]
    Header { path: PathBuf, reason: String },

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}
