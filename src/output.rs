//! Simple Output and Reporting
//!
//! Human-readable and JSON reports for validation and upload runs. Reports go
//! to stdout; diagnostics go through `tracing` to stderr.

use std::time::Duration;

use serde::Serialize;
use serde_json::json;

use crate::cli::{OutputFormat, VerbosityLevel};
use crate::ingestion::{ApiStatus, IngestionReport, IngestionSummary};
use crate::validator::{RunSummary, ValidatedTable};

/// Output formatter for run reports
pub struct Output {
    verbosity: VerbosityLevel,
    format: OutputFormat,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel, format: OutputFormat) -> Self {
        Self {
            verbosity,
            format,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    /// Disable ANSI colours regardless of the terminal
    pub fn without_colors(mut self) -> Self {
        self.show_colors = false;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    /// Report for a `validate` run
    pub fn format_validation(
        &self,
        table: &ValidatedTable,
        summary: &RunSummary,
        duration: Duration,
    ) -> String {
        if self.format == OutputFormat::Json {
            return to_json(&json!({ "validation": summary }));
        }

        let mut output = String::new();
        match self.verbosity {
            VerbosityLevel::Quiet => {
                if !summary.all_correct() {
                    output.push_str(&format!(
                        "Header: {} Error rows: {}\n",
                        summary.header_status, summary.error_rows
                    ));
                }
            }
            VerbosityLevel::Normal | VerbosityLevel::Verbose => {
                output.push_str(&self.format_summary(summary, duration));
                if self.verbosity == VerbosityLevel::Verbose {
                    output.push_str(&self.format_error_rows(table));
                }
            }
        }
        output
    }

    /// Report for an `upload` run
    pub fn format_ingestion(&self, report: &IngestionReport, duration: Duration) -> String {
        if self.format == OutputFormat::Json {
            return to_json(&json!({ "ingestion": report.summary() }));
        }

        let summary = report.summary();
        let mut output = String::new();
        match self.verbosity {
            VerbosityLevel::Quiet => {
                if summary.has_errors() {
                    output.push_str(&format!("Upload errors: {}\n", summary.error));
                }
            }
            VerbosityLevel::Normal | VerbosityLevel::Verbose => {
                output.push_str(&self.format_ingestion_summary(summary, duration));
                if self.verbosity == VerbosityLevel::Verbose {
                    for (index, row) in report.rows().iter().enumerate() {
                        if row.outcome.status == ApiStatus::Error {
                            output.push_str(&format!(
                                "  {} row {} ({}): {}\n",
                                self.colorize("✗", "31"),
                                index + 1,
                                row.outcome.status_code_text(),
                                row.outcome.message
                            ));
                        }
                    }
                }
            }
        }
        output
    }

    /// Report for a `run` (validate then upload)
    pub fn format_run(
        &self,
        table: &ValidatedTable,
        summary: &RunSummary,
        report: &IngestionReport,
        duration: Duration,
    ) -> String {
        if self.format == OutputFormat::Json {
            return to_json(&json!({
                "validation": summary,
                "ingestion": report.summary(),
            }));
        }

        let mut output = self.format_validation(table, summary, duration);
        if self.verbosity != VerbosityLevel::Quiet {
            output.push('\n');
        }
        output.push_str(&self.format_ingestion(report, duration));
        output
    }

    fn format_summary(&self, summary: &RunSummary, duration: Duration) -> String {
        let mut output = String::new();
        output.push_str("Validation Summary:\n");

        let header_label = if summary.header_status.is_correct() {
            self.colorize("Headers:", "32")
        } else {
            self.colorize("Headers:", "31")
        };
        output.push_str(&format!("  {} {}\n", header_label, summary.header_message));
        output.push_str(&format!("  Total rows: {}\n", summary.total_rows));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Correct:", "32"),
            summary.correct_rows
        ));
        if summary.error_rows > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Errors:", "31"),
                summary.error_rows
            ));
        }
        output.push_str(&format!("  Duration: {}\n", format_duration(duration)));
        output
    }

    fn format_error_rows(&self, table: &ValidatedTable) -> String {
        let mut output = String::new();
        for (index, result) in table.results().iter().enumerate() {
            if result.is_correct() {
                continue;
            }
            output.push_str(&format!("{}  row {}\n", self.colorize("✗ ERROR", "31"), index + 1));
            for error in result.errors() {
                output.push_str(&format!("    {}\n", error));
            }
        }
        output
    }

    fn format_ingestion_summary(&self, summary: &IngestionSummary, duration: Duration) -> String {
        let mut output = String::new();
        output.push_str("Ingestion Summary:\n");
        output.push_str(&format!("  Total rows: {}\n", summary.total_rows));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Success:", "32"),
            summary.success
        ));
        if summary.error > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Errors:", "31"),
                summary.error
            ));
        }
        if summary.skipped > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Skipped:", "36"),
                summary.skipped
            ));
        }
        output.push_str(&format!("  Duration: {}\n", format_duration(duration)));
        output
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    let mut text = serde_json::to_string_pretty(value).unwrap_or_default();
    text.push('\n');
    text
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}
