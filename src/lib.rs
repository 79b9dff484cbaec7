//! # user-ingest Library
//!
//! Schema-driven validation of tabular user records, followed by row-by-row
//! submission of the accepted records to an ingestion endpoint.
//!
//! The validation core is synchronous: a [`ValidationEngine`] owns a
//! [`Schema`], the [`ReferenceData`] and a [`HookRegistry`] of custom field
//! validators, and turns a [`Table`] into a [`ValidatedTable`] plus a
//! [`RunSummary`]. Uploading is async and lives in [`ingestion`].

pub mod cli;
pub mod config;
pub mod error;
pub mod field_validator;
pub mod hooks;
pub mod http_client;
pub mod ingestion;
pub mod output;
pub mod reference;
pub mod schema;
pub mod table;
pub mod uniqueness;
pub mod user_hooks;
pub mod validator;

pub use cli::{Cli, Command, OutputFormat, VerbosityLevel};
pub use config::{Config, ConfigError, ConfigManager, EnvProvider, SystemEnvProvider};
pub use error::{
    AppError, FieldViolation, IngestError, ReferenceDataError, SchemaLoadError, TableError,
};
pub use field_validator::{FieldValidator, present_value};
pub use hooks::{CustomValidator, HookOutcome, HookRegistry};
pub use http_client::{ApiResponse, IngestionClient, IngestionClientConfig, is_success_response};
pub use ingestion::{
    ApiStatus, IngestedRow, IngestionReport, IngestionRunner, IngestionSummary, SubmissionOutcome,
    Submitter,
};
pub use output::Output;
pub use reference::{ReferenceData, ReferenceTable};
pub use schema::{FieldRule, PrimitiveType, Schema};
pub use table::{Record, Table};
pub use uniqueness::{DuplicateIndex, find_duplicates};
pub use user_hooks::{BoundaryValidator, DateOfJoiningValidator, RoleValidator, default_registry};
pub use validator::{
    HeaderCheck, RunSummary, ValidatedTable, ValidationEngine, ValidationResult, Verdict,
};
