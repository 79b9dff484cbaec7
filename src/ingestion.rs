//! Row-by-row submission of validated records
//!
//! Only rows whose verdict is `CORRECT` are ever handed to a [`Submitter`];
//! every other row is marked `SKIPPED` without any network traffic. Rows are
//! submitted strictly in order, one at a time, with a fixed pause between
//! submissions.

use std::fmt;
use std::future::Future;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{IngestError, TableError, TableResult};
use crate::http_client::IngestionClient;
use crate::validator::{ValidatedTable, ValidationResult, output_columns, output_row};

/// Columns appended to the upload report
pub const API_STATUS_COLUMN: &str = "api_status";
pub const API_STATUS_CODE_COLUMN: &str = "api_status_code";
pub const API_MESSAGE_COLUMN: &str = "api_message";

/// Message recorded for rows that were not submitted
pub const SKIPPED_MESSAGE: &str = "Validation failed";

/// Per-row upload status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApiStatus {
    Success,
    Error,
    Skipped,
}

impl fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApiStatus::Success => "SUCCESS",
            ApiStatus::Error => "ERROR",
            ApiStatus::Skipped => "SKIPPED",
        })
    }
}

/// What happened to one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionOutcome {
    pub status: ApiStatus,
    /// HTTP status, or a synthetic one for transport failures; `None` when skipped
    pub status_code: Option<u16>,
    pub message: String,
}

impl SubmissionOutcome {
    pub fn success(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status: ApiStatus::Success,
            status_code: Some(status_code),
            message: message.into(),
        }
    }

    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status: ApiStatus::Error,
            status_code: Some(status_code),
            message: message.into(),
        }
    }

    pub fn skipped() -> Self {
        Self {
            status: ApiStatus::Skipped,
            status_code: None,
            message: SKIPPED_MESSAGE.to_string(),
        }
    }

    /// Status code as written to the report; `N/A` for skipped rows
    pub fn status_code_text(&self) -> String {
        self.status_code
            .map_or_else(|| "N/A".to_string(), |code| code.to_string())
    }
}

/// Sends one validated row to the ingestion endpoint
pub trait Submitter {
    fn submit(
        &self,
        columns: &[String],
        result: &ValidationResult,
    ) -> impl Future<Output = SubmissionOutcome> + Send;
}

/// The single-row CSV document uploaded for one record
pub fn single_row_csv(columns: &[String], result: &ValidationResult) -> TableResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(output_columns(columns))?;
    writer.write_record(output_row(columns, result))?;
    writer.flush().map_err(csv::Error::from)?;
    writer
        .into_inner()
        .map_err(|e| TableError::from(csv::Error::from(io::Error::other(e.to_string()))))
}

impl Submitter for IngestionClient {
    async fn submit(&self, columns: &[String], result: &ValidationResult) -> SubmissionOutcome {
        let csv = match single_row_csv(columns, result) {
            Ok(csv) => csv,
            Err(e) => return SubmissionOutcome::error(500, format!("Unexpected error: {e}")),
        };

        match self.upload_csv(&csv).await {
            Ok(response) if response.is_success() => {
                SubmissionOutcome::success(response.status, response.body)
            }
            Ok(response) => SubmissionOutcome::error(response.status, response.body),
            Err(IngestError::Timeout { .. }) => SubmissionOutcome::error(408, "Request timeout"),
            Err(IngestError::Http(e)) if e.is_timeout() => {
                SubmissionOutcome::error(408, "Request timeout")
            }
            Err(e) => SubmissionOutcome::error(500, e.to_string()),
        }
    }
}

/// Counts for one upload run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestionSummary {
    pub total_rows: usize,
    pub success: usize,
    pub error: usize,
    pub skipped: usize,
}

impl IngestionSummary {
    fn record(&mut self, outcome: &SubmissionOutcome) {
        self.total_rows += 1;
        match outcome.status {
            ApiStatus::Success => self.success += 1,
            ApiStatus::Error => self.error += 1,
            ApiStatus::Skipped => self.skipped += 1,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.error > 0
    }
}

/// A validated row and its upload outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestedRow {
    pub result: ValidationResult,
    pub outcome: SubmissionOutcome,
}

/// Upload outcomes for a whole validated table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    columns: Vec<String>,
    rows: Vec<IngestedRow>,
    summary: IngestionSummary,
}

impl IngestionReport {
    pub fn rows(&self) -> &[IngestedRow] {
        &self.rows
    }

    pub fn summary(&self) -> &IngestionSummary {
        &self.summary
    }

    /// Validated columns followed by the three API columns
    pub fn output_columns(&self) -> Vec<String> {
        let mut columns = output_columns(&self.columns);
        columns.extend(
            [API_STATUS_COLUMN, API_STATUS_CODE_COLUMN, API_MESSAGE_COLUMN].map(str::to_string),
        );
        columns
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> TableResult<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.output_columns())?;
        for row in &self.rows {
            let mut record = output_row(&self.columns, &row.result);
            record.push(row.outcome.status.to_string());
            record.push(row.outcome.status_code_text());
            record.push(row.outcome.message.clone());
            csv_writer.write_record(record)?;
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
}

/// Drives a [`Submitter`] over a validated table
#[derive(Debug, Clone, Copy)]
pub struct IngestionRunner {
    delay: Duration,
}

impl IngestionRunner {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub async fn run<S: Submitter>(&self, table: &ValidatedTable, submitter: &S) -> IngestionReport {
        let total = table.len();
        let mut rows = Vec::with_capacity(total);
        let mut summary = IngestionSummary::default();
        let mut submitted_any = false;

        for (index, result) in table.results().iter().enumerate() {
            let outcome = if result.is_correct() {
                if submitted_any && !self.delay.is_zero() {
                    sleep(self.delay).await;
                }
                submitted_any = true;

                info!(
                    row = index + 1,
                    total,
                    username = result.record().get("username").unwrap_or("N/A"),
                    "Uploading row"
                );
                let outcome = submitter.submit(table.columns(), result).await;
                if outcome.status != ApiStatus::Success {
                    warn!(
                        row = index + 1,
                        status_code = %outcome.status_code_text(),
                        message = %outcome.message,
                        "Upload rejected"
                    );
                }
                outcome
            } else {
                SubmissionOutcome::skipped()
            };

            summary.record(&outcome);
            rows.push(IngestedRow {
                result: result.clone(),
                outcome,
            });
        }

        info!(
            total = summary.total_rows,
            success = summary.success,
            error = summary.error,
            skipped = summary.skipped,
            "Upload complete"
        );

        IngestionReport {
            columns: table.columns().to_vec(),
            rows,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Record;
    use std::sync::Mutex;

    /// Accepts every row and remembers which usernames it saw
    #[derive(Default)]
    struct RecordingSubmitter {
        seen: Mutex<Vec<String>>,
    }

    impl Submitter for RecordingSubmitter {
        async fn submit(&self, _columns: &[String], result: &ValidationResult) -> SubmissionOutcome {
            let username = result.record().get("username").unwrap_or_default().to_string();
            let accepted = username != "carol";
            self.seen.lock().unwrap().push(username);
            if accepted {
                SubmissionOutcome::success(200, "ok")
            } else {
                SubmissionOutcome::error(400, "rejected")
            }
        }
    }

    fn validated() -> ValidatedTable {
        let row = |name: &str| Record::new().with("username", name);
        ValidatedTable::new(
            vec!["username".to_string()],
            vec![
                ValidationResult::new(row("alice"), Vec::new()),
                ValidationResult::new(row("bob"), vec!["mobile_number is required".to_string()]),
                ValidationResult::new(row("carol"), Vec::new()),
            ],
        )
    }

    #[tokio::test]
    async fn test_only_correct_rows_are_submitted() {
        let submitter = RecordingSubmitter::default();
        let report = IngestionRunner::new(Duration::ZERO)
            .run(&validated(), &submitter)
            .await;

        assert_eq!(*submitter.seen.lock().unwrap(), vec!["alice", "carol"]);
        assert_eq!(
            *report.summary(),
            IngestionSummary {
                total_rows: 3,
                success: 1,
                error: 1,
                skipped: 1,
            }
        );
        assert_eq!(report.rows()[1].outcome, SubmissionOutcome::skipped());
    }

    #[tokio::test]
    async fn test_report_csv_appends_api_columns() {
        let submitter = RecordingSubmitter::default();
        let report = IngestionRunner::new(Duration::ZERO)
            .run(&validated(), &submitter)
            .await;

        let mut buffer = Vec::new();
        report.write_csv(&mut buffer).unwrap();
        let csv = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "username,validation_status,validation_errors,api_status,api_status_code,api_message"
        );
        assert_eq!(lines[1], "alice,CORRECT,[],SUCCESS,200,ok");
        assert!(lines[2].ends_with(",SKIPPED,N/A,Validation failed"));
        assert_eq!(lines[3], "carol,CORRECT,[],ERROR,400,rejected");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_only_between_submissions() {
        let submitter = RecordingSubmitter::default();
        let start = tokio::time::Instant::now();
        IngestionRunner::new(Duration::from_secs(5))
            .run(&validated(), &submitter)
            .await;

        // Two submissions, one pause between them
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_secs(10));
    }

    #[test]
    fn test_single_row_csv() {
        let result = ValidationResult::new(Record::new().with("username", "alice"), Vec::new());
        let csv = single_row_csv(&["username".to_string()], &result).unwrap();
        assert_eq!(
            String::from_utf8(csv).unwrap(),
            "username,validation_status,validation_errors\nalice,CORRECT,[]\n"
        );
    }

    #[test]
    fn test_status_code_text() {
        assert_eq!(SubmissionOutcome::skipped().status_code_text(), "N/A");
        assert_eq!(SubmissionOutcome::error(408, "Request timeout").status_code_text(), "408");
    }
}
