use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show critical errors
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Show per-row details
    Verbose,
}

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Human,
    /// Machine-readable JSON
    Json,
}

/// Validate user CSV files and submit accepted rows for ingestion
#[derive(Parser, Debug, Clone)]
#[command(name = "user-ingest")]
#[command(about = "Validate user CSV files against a schema and upload accepted rows")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Validation schema (JSON)
    #[arg(long = "schema", global = true)]
    pub schema: Option<PathBuf>,

    /// Role mapping (JSON)
    #[arg(long = "roles", global = true)]
    pub roles: Option<PathBuf>,

    /// Boundary table (CSV with id,name columns)
    #[arg(long = "boundaries", global = true)]
    pub boundaries: Option<PathBuf>,

    /// Ingestion endpoint URL
    #[arg(long = "api-url", global = true)]
    pub api_url: Option<String>,

    /// Tenant the users are ingested into
    #[arg(long = "tenant-id", global = true)]
    pub tenant_id: Option<String>,

    /// Seconds to wait between uploads
    #[arg(long = "delay", global = true)]
    pub delay: Option<u64>,

    /// HTTP request timeout in seconds
    #[arg(long = "timeout", global = true)]
    pub timeout: Option<u64>,

    /// Number of retry attempts for failed uploads
    #[arg(long = "retry-attempts", global = true)]
    pub retry_attempts: Option<u32>,

    /// Report format
    #[arg(long = "format", value_enum, global = true)]
    pub output_format: Option<OutputFormat>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Quiet mode",
        conflicts_with = "verbose",
        global = true
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Validate a user CSV and write it back with validation columns
    Validate {
        /// Input CSV
        input: PathBuf,
        /// Validated CSV to write (default: <input>_validated.csv)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
    /// Upload the CORRECT rows of a validated CSV
    Upload {
        /// Validated CSV produced by `validate`
        input: PathBuf,
        /// Results CSV to write (default: <input>_results.csv)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
    /// Validate and then upload in one step
    Run {
        /// Input CSV
        input: PathBuf,
        /// Results CSV to write (default: <input>_results.csv)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
}

impl Command {
    pub fn input(&self) -> &Path {
        match self {
            Command::Validate { input, .. }
            | Command::Upload { input, .. }
            | Command::Run { input, .. } => input,
        }
    }

    /// Explicit output path, or one derived from the input file name
    pub fn output_path(&self) -> PathBuf {
        match self {
            Command::Validate { input, output } => output
                .clone()
                .unwrap_or_else(|| sibling_with_suffix(input, "validated")),
            Command::Upload { input, output } | Command::Run { input, output } => output
                .clone()
                .unwrap_or_else(|| sibling_with_suffix(input, "results")),
        }
    }

    /// Whether the command talks to the ingestion endpoint
    pub fn uploads(&self) -> bool {
        !matches!(self, Command::Validate { .. })
    }
}

fn sibling_with_suffix(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "users".to_string());
    input.with_file_name(format!("{stem}_{suffix}.csv"))
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        let input = self.command.input();
        if !input.exists() {
            return Err(format!("Input file does not exist: {}", input.display()));
        }
        if let Some(timeout) = self.timeout
            && timeout == 0
        {
            return Err("Timeout must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}
