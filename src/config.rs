use crate::cli::{Cli, OutputFormat};
use crate::http_client::IngestionClientConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "USER_INGEST_";

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub ingestion: IngestionConfig,
    pub output: OutputConfig,
}

/// Locations of the schema and reference data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    /// Validation schema (JSON)
    pub schema: PathBuf,
    /// Role mapping (JSON); role checks are off without it
    pub roles: Option<PathBuf>,
    /// Boundary table (CSV); boundary checks are off without it
    pub boundaries: Option<PathBuf>,
}

/// Ingestion endpoint and pacing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestionConfig {
    /// Endpoint URL; required by `upload` and `run`
    pub api_url: Option<String>,
    pub tenant_id: String,
    pub auth_token: Option<String>,
    /// Pause after each submitted row, in seconds
    pub delay_seconds: u64,
    /// HTTP request timeout in seconds
    pub timeout_seconds: u64,
    /// Number of retry attempts for failed uploads
    pub retry_attempts: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Backoff cap in milliseconds
    pub max_retry_delay_ms: u64,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format
    pub format: OutputFormatConfig,
    /// Verbose output
    pub verbose: bool,
    /// Quiet mode (errors only)
    pub quiet: bool,
}

/// Output format configuration (serializable version of CLI OutputFormat)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatConfig {
    Human,
    Json,
}

impl From<OutputFormat> for OutputFormatConfig {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputFormatConfig::Human,
            OutputFormat::Json => OutputFormatConfig::Json,
        }
    }
}

impl From<OutputFormatConfig> for OutputFormat {
    fn from(format: OutputFormatConfig) -> Self {
        match format {
            OutputFormatConfig::Human => OutputFormat::Human,
            OutputFormatConfig::Json => OutputFormat::Json,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            schema: PathBuf::from("config/validation_schema.json"),
            roles: None,
            boundaries: None,
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            tenant_id: "bi".to_string(),
            auth_token: None,
            delay_seconds: 5,
            timeout_seconds: 60,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 30000,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormatConfig::Human,
            verbose: false,
            quiet: false,
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(&SystemEnvProvider, cli).await
    }

    /// [`ConfigManager::load_config`] with a custom environment provider
    pub async fn load_config_with(env: &impl EnvProvider, cli: &Cli) -> Result<Config> {
        let mut config = Config::default();

        if let Some(config_path) = &cli.config {
            config = Self::load_from_file(config_path).await?;
        } else if let Some(found_config) = Self::find_config_file().await? {
            config = found_config;
        }

        config = Self::apply_environment_overrides_with(env, config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => {
                let config: Config = toml::from_str(&content)?;
                Ok(config)
            }
            Some("json") => {
                let config: Config = serde_json::from_str(&content)?;
                Ok(config)
            }
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    let config: Config = serde_json::from_str(&content)?;
                    Ok(config)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub async fn find_config_file() -> Result<Option<Config>> {
        let config_names = [
            "user-ingest.toml",
            "user-ingest.json",
            ".user-ingest.toml",
            ".user-ingest.json",
        ];

        // Check current directory first
        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("user-ingest");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        let var = |name: &str| env.get(&format!("{ENV_PREFIX}{name}"));

        // Paths
        if let Some(schema) = var("SCHEMA") {
            config.paths.schema = PathBuf::from(schema);
        }
        if let Some(roles) = var("ROLES") {
            config.paths.roles = Some(PathBuf::from(roles));
        }
        if let Some(boundaries) = var("BOUNDARIES") {
            config.paths.boundaries = Some(PathBuf::from(boundaries));
        }

        // Ingestion settings
        if let Some(api_url) = var("API_URL") {
            config.ingestion.api_url = Some(api_url);
        }
        if let Some(tenant_id) = var("TENANT_ID") {
            config.ingestion.tenant_id = tenant_id;
        }
        if let Some(auth_token) = var("AUTH_TOKEN") {
            config.ingestion.auth_token = Some(auth_token);
        }
        if let Some(delay) = var("DELAY") {
            config.ingestion.delay_seconds = parse_env("DELAY", &delay)?;
        }
        if let Some(timeout) = var("TIMEOUT") {
            config.ingestion.timeout_seconds = parse_env("TIMEOUT", &timeout)?;
        }
        if let Some(retry_attempts) = var("RETRY_ATTEMPTS") {
            config.ingestion.retry_attempts = parse_env("RETRY_ATTEMPTS", &retry_attempts)?;
        }

        // Output settings
        if let Some(verbose) = var("VERBOSE") {
            config.output.verbose = parse_env("VERBOSE", &verbose)?;
        }
        if let Some(quiet) = var("QUIET") {
            config.output.quiet = parse_env("QUIET", &quiet)?;
        }
        if let Some(format) = var("FORMAT") {
            config.output.format = match format.to_lowercase().as_str() {
                "human" => OutputFormatConfig::Human,
                "json" => OutputFormatConfig::Json,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid {ENV_PREFIX}FORMAT value: {format}"
                    )));
                }
            };
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if let Some(schema) = &cli.schema {
            config.paths.schema = schema.clone();
        }
        if let Some(roles) = &cli.roles {
            config.paths.roles = Some(roles.clone());
        }
        if let Some(boundaries) = &cli.boundaries {
            config.paths.boundaries = Some(boundaries.clone());
        }

        if let Some(api_url) = &cli.api_url {
            config.ingestion.api_url = Some(api_url.clone());
        }
        if let Some(tenant_id) = &cli.tenant_id {
            config.ingestion.tenant_id = tenant_id.clone();
        }
        if let Some(delay) = cli.delay {
            config.ingestion.delay_seconds = delay;
        }
        if let Some(timeout) = cli.timeout {
            config.ingestion.timeout_seconds = timeout;
        }
        if let Some(retry_attempts) = cli.retry_attempts {
            config.ingestion.retry_attempts = retry_attempts;
        }

        if let Some(format) = cli.output_format {
            config.output.format = format.into();
        }
        if cli.verbose {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }

        config
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.ingestion.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if config.ingestion.retry_attempts > 10 {
            return Err(ConfigError::Validation(
                "Retry attempts cannot exceed 10".to_string(),
            ));
        }

        if config.ingestion.tenant_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Tenant id cannot be empty".to_string(),
            ));
        }

        if let Some(api_url) = &config.ingestion.api_url
            && !(api_url.starts_with("http://") || api_url.starts_with("https://"))
        {
            return Err(ConfigError::Validation(format!(
                "API URL must start with http:// or https://: {api_url}"
            )));
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        Ok(())
    }

    /// HTTP client settings; fails when no endpoint is configured
    pub fn get_client_config(config: &Config) -> Result<IngestionClientConfig> {
        let api_url = config.ingestion.api_url.clone().ok_or_else(|| {
            ConfigError::Validation(
                "API URL is required for uploads (--api-url or USER_INGEST_API_URL)".to_string(),
            )
        })?;

        Ok(IngestionClientConfig {
            api_url,
            tenant_id: config.ingestion.tenant_id.clone(),
            auth_token: config.ingestion.auth_token.clone(),
            timeout_seconds: config.ingestion.timeout_seconds,
            retry_attempts: config.ingestion.retry_attempts,
            retry_delay_ms: config.ingestion.retry_delay_ms,
            max_retry_delay_ms: config.ingestion.max_retry_delay_ms,
            ..Default::default()
        })
    }

    /// Pause between uploads
    pub fn get_delay_duration(config: &Config) -> Duration {
        Duration::from_secs(config.ingestion.delay_seconds)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        ConfigError::Environment(format!("Invalid {ENV_PREFIX}{name} value: {value}"))
    })
}
