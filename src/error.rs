use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Top-level error type for everything that can stop a run
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Schema(#[from] SchemaLoadError),

    #[error(transparent)]
    ReferenceData(#[from] ReferenceDataError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while loading the schema document. Raised at engine construction.
#[derive(Error, Debug)]
pub enum SchemaLoadError {
    #[error("Schema file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to read schema file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema parsing error: {details}")]
    Parse { details: String },
}

impl SchemaLoadError {
    pub fn parse(details: impl Into<String>) -> Self {
        SchemaLoadError::Parse {
            details: details.into(),
        }
    }
}

/// Failures while loading role or boundary lookup tables
#[derive(Error, Debug)]
pub enum ReferenceDataError {
    #[error("Reference data file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to read reference data {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid reference data in {path}: {details}")]
    Parse { path: PathBuf, details: String },

    #[error("Reference data {path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },
}

/// Failures while reading or writing tables
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Input file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Table is missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("Invalid value in column '{column}' at row {row}: {details}")]
    InvalidCell {
        column: String,
        row: usize,
        details: String,
    },
}

/// Network-level failures of the ingestion endpoint
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timeout: {url} after {timeout_seconds} seconds")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("Failed to build request payload: {0}")]
    Payload(String),
}

/// A single rule violation found while validating one field of one record.
///
/// Violations are accumulated, never raised. The `Display` output is the
/// exact message stored in a record's error list.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldViolation {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{message}")]
    PatternMismatch { field: String, message: String },

    #[error("{field} must be one of: {allowed}")]
    EnumMismatch { field: String, allowed: String },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be a number")]
    NotANumber { field: String },

    #[error("{field} must be an integer")]
    NotAnInteger { field: String },

    #[error("{field} must be a boolean")]
    NotABoolean { field: String },

    #[error("{field} must be at least {minimum}")]
    BelowMinimum { field: String, minimum: f64 },

    #[error("{field} must be at most {maximum}")]
    AboveMaximum { field: String, maximum: f64 },

    #[error("Duplicate {field}: {value}")]
    Duplicate { field: String, value: String },

    #[error("roles cannot be empty")]
    EmptyRoles,

    #[error("Invalid roles: {roles}")]
    InvalidRoles { roles: String },

    #[error("{field} must be in DD/MM/YYYY or DD-MM-YYYY format")]
    InvalidDateFormat { field: String },

    #[error("Invalid {field}")]
    InvalidDate { field: String },

    #[error("Invalid boundary_code: {code}")]
    InvalidBoundaryCode { code: String },

    #[error("Invalid administrative_area: {area}")]
    InvalidAdministrativeArea { area: String },

    #[error("administrative_area '{area}' does not match boundary '{expected}' for code '{code}'")]
    BoundaryMismatch {
        area: String,
        expected: String,
        code: String,
    },
}

/// Result type alias for whole-run operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Schema loading result type alias
pub type SchemaResult<T> = std::result::Result<T, SchemaLoadError>;

/// Reference data result type alias
pub type ReferenceResult<T> = std::result::Result<T, ReferenceDataError>;

/// Table I/O result type alias
pub type TableResult<T> = std::result::Result<T, TableError>;

/// Ingestion result type alias
pub type IngestResult<T> = std::result::Result<T, IngestError>;
