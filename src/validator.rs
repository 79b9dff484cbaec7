//! Table validation engine
//!
//! The engine owns a loaded [`Schema`], the reference data and the custom
//! validator registry. A run over a [`Table`] has three phases:
//!
//! 1. **Header reconciliation**: the table's column set against the schema's
//! 2. **Duplicate precomputation**: one table-wide pass per unique field
//! 3. **Row pass**: schema rules, then the field's custom validator, then the
//!    duplicate lookup, for every declared column of every record
//!
//! A header mismatch is reported alongside the row results; it never stops
//! the row pass. Rule violations are accumulated per record and never abort
//! the run.

use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{FieldViolation, Result, TableError, TableResult};
use crate::field_validator::{FieldValidator, present_value};
use crate::hooks::HookRegistry;
use crate::reference::ReferenceData;
use crate::schema::Schema;
use crate::table::{Record, Table, cell_text};
use crate::uniqueness::DuplicateIndex;
use crate::user_hooks::default_registry;

/// Column appended to validated output holding the verdict
pub const STATUS_COLUMN: &str = "validation_status";

/// Column appended to validated output holding the JSON list of errors
pub const ERRORS_COLUMN: &str = "validation_errors";

/// Message reported when the table columns equal the schema columns
pub const HEADERS_MATCH_MESSAGE: &str = "Headers match. No issues.";

/// Outcome of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// No violations
    Correct,
    /// At least one violation
    Error,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Correct => "CORRECT",
            Verdict::Error => "ERROR",
        }
    }

    pub fn is_correct(&self) -> bool {
        matches!(self, Verdict::Correct)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "CORRECT" => Ok(Verdict::Correct),
            "ERROR" => Ok(Verdict::Error),
            other => Err(format!("unknown validation status '{other}'")),
        }
    }
}

/// Validation outcome of a single record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    /// Original cell values, in table-column order
    record: Record,
    /// `Error` exactly when `errors` is non-empty
    status: Verdict,
    /// Violation messages in field order, then check order
    errors: Vec<String>,
}

impl ValidationResult {
    pub fn new(record: Record, errors: Vec<String>) -> Self {
        let status = if errors.is_empty() {
            Verdict::Correct
        } else {
            Verdict::Error
        };
        Self {
            record,
            status,
            errors,
        }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn status(&self) -> Verdict {
        self.status
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn is_correct(&self) -> bool {
        self.status.is_correct()
    }
}

/// Result of comparing the table columns with the schema columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderCheck {
    pub status: Verdict,
    pub message: String,
    /// Schema columns absent from the table, in schema order
    pub missing: Vec<String>,
    /// Table columns the schema does not declare, in table order
    pub extra: Vec<String>,
}

/// Aggregate outcome of one table validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub header_status: Verdict,
    pub header_message: String,
    pub total_rows: usize,
    pub correct_rows: usize,
    pub error_rows: usize,
}

impl RunSummary {
    /// Count verdicts of `results` under the given header outcome
    pub fn aggregate(header: &HeaderCheck, results: &[ValidationResult]) -> Self {
        let correct_rows = results.iter().filter(|r| r.is_correct()).count();
        Self {
            header_status: header.status,
            header_message: header.message.clone(),
            total_rows: results.len(),
            correct_rows,
            error_rows: results.len() - correct_rows,
        }
    }

    /// True when the headers matched and every row passed
    pub fn all_correct(&self) -> bool {
        self.header_status.is_correct() && self.error_rows == 0
    }
}

/// `columns` followed by the status and errors columns
pub fn output_columns(columns: &[String]) -> Vec<String> {
    let mut output = columns.to_vec();
    output.push(STATUS_COLUMN.to_string());
    output.push(ERRORS_COLUMN.to_string());
    output
}

/// Output row for one result: original cells, status, JSON error list
pub fn output_row(columns: &[String], result: &ValidationResult) -> Vec<String> {
    let mut row: Vec<String> = columns
        .iter()
        .map(|column| cell_text(&result.record, column))
        .collect();
    row.push(result.status.to_string());
    row.push(Value::from(result.errors.clone()).to_string());
    row
}

/// Original columns plus one [`ValidationResult`] per record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedTable {
    columns: Vec<String>,
    results: Vec<ValidationResult>,
}

impl ValidatedTable {
    pub fn new(columns: Vec<String>, results: Vec<ValidationResult>) -> Self {
        Self { columns, results }
    }

    /// The input table's columns
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Input columns followed by the status and errors columns
    pub fn output_columns(&self) -> Vec<String> {
        output_columns(&self.columns)
    }

    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    pub fn correct_results(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| r.is_correct())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> TableResult<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.output_columns())?;
        for result in &self.results {
            csv_writer.write_record(output_row(&self.columns, result))?;
        }
        csv_writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn write_csv_path(&self, path: &Path) -> TableResult<()> {
        let file = std::fs::File::create(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.write_csv(file)
    }

    pub fn to_csv_string(&self) -> TableResult<String> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Read a validated CSV previously written by [`ValidatedTable::write_csv`]
    pub fn from_csv_path(path: &Path) -> TableResult<Self> {
        let table = Table::from_csv_path(path)?;
        Self::from_table(table)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> TableResult<Self> {
        Self::from_table(Table::from_reader(reader)?)
    }

    fn from_table(table: Table) -> TableResult<Self> {
        for required in [STATUS_COLUMN, ERRORS_COLUMN] {
            if !table.has_column(required) {
                return Err(TableError::MissingColumn {
                    column: required.to_string(),
                });
            }
        }

        let columns: Vec<String> = table
            .columns()
            .iter()
            .filter(|column| *column != STATUS_COLUMN && *column != ERRORS_COLUMN)
            .cloned()
            .collect();

        let mut results = Vec::with_capacity(table.len());
        for (index, record) in table.records().iter().enumerate() {
            let row = index + 1;
            let invalid = |column: &str, details: String| TableError::InvalidCell {
                column: column.to_string(),
                row,
                details,
            };

            let status: Verdict = record
                .get(STATUS_COLUMN)
                .unwrap_or_default()
                .parse()
                .map_err(|details| invalid(STATUS_COLUMN, details))?;

            let raw_errors = record.get(ERRORS_COLUMN).unwrap_or_default().trim();
            let errors: Vec<String> = if raw_errors.is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(raw_errors)
                    .map_err(|e| invalid(ERRORS_COLUMN, e.to_string()))?
            };

            if status.is_correct() != errors.is_empty() {
                return Err(invalid(
                    STATUS_COLUMN,
                    format!("status {status} disagrees with {} error(s)", errors.len()),
                ));
            }

            let original: Record = columns
                .iter()
                .map(|column| {
                    (
                        column.clone(),
                        record.get(column).map(str::to_string),
                    )
                })
                .collect();
            results.push(ValidationResult::new(original, errors));
        }

        Ok(Self { columns, results })
    }
}

/// Compare the table's column set with the schema's expected columns
pub fn reconcile_headers(schema: &Schema, columns: &[String]) -> HeaderCheck {
    let missing: Vec<String> = schema
        .expected_columns()
        .filter(|expected| !columns.iter().any(|column| column == expected))
        .map(str::to_string)
        .collect();
    let extra: Vec<String> = columns
        .iter()
        .filter(|column| !schema.declares(column))
        .cloned()
        .collect();

    if missing.is_empty() && extra.is_empty() {
        return HeaderCheck {
            status: Verdict::Correct,
            message: HEADERS_MATCH_MESSAGE.to_string(),
            missing,
            extra,
        };
    }

    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("Missing columns: {}.", missing.join(", ")));
    }
    if !extra.is_empty() {
        parts.push(format!("Extra columns: {}.", extra.join(", ")));
    }

    HeaderCheck {
        status: Verdict::Error,
        message: parts.join(" "),
        missing,
        extra,
    }
}

/// Schema-driven validator for user tables
#[derive(Debug)]
pub struct ValidationEngine {
    schema: Schema,
    reference: ReferenceData,
    hooks: HookRegistry,
}

impl ValidationEngine {
    pub fn new(schema: Schema, reference: ReferenceData, hooks: HookRegistry) -> Self {
        Self {
            schema,
            reference,
            hooks,
        }
    }

    /// Load the schema and reference tables from disk and register the
    /// user-ingestion custom validators
    pub fn from_paths(
        schema_path: &Path,
        roles_path: Option<&Path>,
        boundaries_path: Option<&Path>,
    ) -> Result<Self> {
        let schema = Schema::from_path(schema_path)?;
        let reference = ReferenceData::load(roles_path, boundaries_path)?;
        info!(
            schema = %schema_path.display(),
            fields = schema.len(),
            "Loaded validation schema"
        );
        Ok(Self::new(schema, reference, default_registry()))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn reconcile_headers(&self, table: &Table) -> HeaderCheck {
        reconcile_headers(&self.schema, table.columns())
    }

    /// Validate one record against precomputed duplicate sets
    pub fn validate_record(&self, record: &Record, duplicates: &DuplicateIndex) -> ValidationResult {
        let field_validator = FieldValidator::new(&self.schema);
        let mut errors = Vec::new();

        for (field, raw) in record.iter() {
            if !self.schema.declares(field) {
                continue;
            }

            let mut field_errors = field_validator.validate_field(field, raw);

            if let Some(hook) = self.hooks.get(field) {
                let outcome = hook.validate(raw.unwrap_or_default(), record, &self.reference);
                field_errors.extend(outcome.into_errors());
            }

            if self.schema.is_unique(field)
                && let Some(value) = present_value(raw)
                && duplicates.is_duplicate(field, value)
            {
                let violation = FieldViolation::Duplicate {
                    field: field.to_string(),
                    value: value.to_string(),
                };
                field_errors.push(violation.to_string());
            }

            errors.extend(field_errors);
        }

        ValidationResult::new(record.clone(), errors)
    }

    /// Run header reconciliation, duplicate precomputation and the row pass
    pub fn validate(&self, table: &Table) -> (ValidatedTable, RunSummary) {
        let start = Instant::now();
        info!(rows = table.len(), columns = table.columns().len(), "Validating table");

        let header = self.reconcile_headers(table);
        if !header.status.is_correct() {
            warn!(message = %header.message, "Header mismatch");
        }

        let duplicates = DuplicateIndex::build(table, &self.schema);

        let results: Vec<ValidationResult> = table
            .records()
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let result = self.validate_record(record, &duplicates);
                if !result.is_correct() {
                    debug!(row = index + 1, errors = ?result.errors(), "Row failed validation");
                }
                result
            })
            .collect();

        let summary = RunSummary::aggregate(&header, &results);
        info!(
            total = summary.total_rows,
            correct = summary.correct_rows,
            error = summary.error_rows,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Validation complete"
        );

        (ValidatedTable::new(table.columns().to_vec(), results), summary)
    }
}
