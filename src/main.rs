use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use user_ingest::cli::{Cli, Command, VerbosityLevel};
use user_ingest::config::{Config, ConfigManager};
use user_ingest::http_client::IngestionClient;
use user_ingest::ingestion::{IngestionReport, IngestionRunner};
use user_ingest::output::Output;
use user_ingest::table::Table;
use user_ingest::validator::{RunSummary, ValidatedTable, ValidationEngine};

/// Some rows failed validation or upload
const EXIT_ROW_FAILURES: u8 = 1;
/// The run could not complete
const EXIT_FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logging(cli.verbosity());

    match run(cli).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn init_logging(verbosity: VerbosityLevel) {
    let default_filter = match verbosity {
        VerbosityLevel::Quiet => "user_ingest=warn",
        VerbosityLevel::Normal => "user_ingest=info",
        VerbosityLevel::Verbose => "user_ingest=debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    cli.validate().map_err(anyhow::Error::msg)?;

    let config = ConfigManager::load_config(&cli)
        .await
        .context("Failed to load configuration")?;
    let output = Output::new(verbosity(&config), config.output.format.into());
    let output_path = cli.command.output_path();
    let started = Instant::now();

    let failed = match &cli.command {
        Command::Validate { input, .. } => {
            let (validated, summary) = validate(&config, input)?;
            validated
                .write_csv_path(&output_path)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
            info!(path = %output_path.display(), "Wrote validated CSV");

            print!(
                "{}",
                output.format_validation(&validated, &summary, started.elapsed())
            );
            !summary.all_correct()
        }
        Command::Upload { input, .. } => {
            let client = ingestion_client(&config)?;
            let validated = ValidatedTable::from_csv_path(input)
                .with_context(|| format!("Failed to read validated CSV {}", input.display()))?;

            let report = upload(&config, &client, &validated, &output_path).await?;
            print!("{}", output.format_ingestion(&report, started.elapsed()));
            report.summary().has_errors()
        }
        Command::Run { input, .. } => {
            let client = ingestion_client(&config)?;
            let (validated, summary) = validate(&config, input)?;

            let report = upload(&config, &client, &validated, &output_path).await?;
            print!(
                "{}",
                output.format_run(&validated, &summary, &report, started.elapsed())
            );
            !summary.all_correct() || report.summary().has_errors()
        }
    };

    Ok(if failed {
        ExitCode::from(EXIT_ROW_FAILURES)
    } else {
        ExitCode::SUCCESS
    })
}

fn verbosity(config: &Config) -> VerbosityLevel {
    if config.output.quiet {
        VerbosityLevel::Quiet
    } else if config.output.verbose {
        VerbosityLevel::Verbose
    } else {
        VerbosityLevel::Normal
    }
}

fn validate(config: &Config, input: &Path) -> Result<(ValidatedTable, RunSummary)> {
    let engine = ValidationEngine::from_paths(
        &config.paths.schema,
        config.paths.roles.as_deref(),
        config.paths.boundaries.as_deref(),
    )
    .context("Failed to initialise validator")?;

    let table = Table::from_csv_path(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    Ok(engine.validate(&table))
}

fn ingestion_client(config: &Config) -> Result<IngestionClient> {
    let client_config = ConfigManager::get_client_config(config)?;
    IngestionClient::new(client_config).context("Failed to create HTTP client")
}

async fn upload(
    config: &Config,
    client: &IngestionClient,
    validated: &ValidatedTable,
    output_path: &Path,
) -> Result<IngestionReport> {
    let runner = IngestionRunner::new(ConfigManager::get_delay_duration(config));
    let report = runner.run(validated, client).await;

    report
        .write_csv_path(output_path)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    info!(path = %output_path.display(), "Wrote ingestion results");

    Ok(report)
}
