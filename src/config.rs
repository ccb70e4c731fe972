use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use validator::{Validate, ValidationError};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";

/// Application configuration, layered from coded defaults, optional config
/// files, and `APP__`-prefixed environment variables.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection string, e.g. `postgres://...` or
    /// `sqlite://stockflow.db?mode=rwc`.
    pub database_url: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable lines.
    #[serde(default)]
    pub log_json: bool,

    /// Apply embedded migrations during pool creation.
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1, message = "db_max_connections must be at least 1"))]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    /// Buffer size of the in-process domain event channel.
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1, message = "event_channel_capacity must be at least 1"))]
    pub event_channel_capacity: usize,
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_db_connect_timeout_secs() -> u64 {
    10
}

fn default_db_acquire_timeout_secs() -> u64 {
    10
}

fn default_db_idle_timeout_secs() -> u64 {
    300
}

fn default_event_channel_capacity() -> usize {
    256
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new("invalid log level")),
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("I/O error while loading configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl AppConfig {
    /// Construct a configuration directly, mainly for tests and embedding.
    /// Remaining knobs take their defaults.
    pub fn new(
        database_url: impl Into<String>,
        environment: impl Into<String>,
        log_level: impl Into<String>,
        log_json: bool,
        auto_migrate: bool,
        db_max_connections: u32,
    ) -> Self {
        Self {
            database_url: database_url.into(),
            environment: environment.into(),
            log_level: log_level.into(),
            log_json,
            auto_migrate,
            db_max_connections,
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Load configuration for the current run environment.
///
/// Layering, later sources winning: coded defaults, `config/default`,
/// `config/{RUN_ENV}`, then `APP__`-prefixed environment variables with
/// `__` as the nesting separator (e.g. `APP__DATABASE_URL`).
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = std::env::var("RUN_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let config = Config::builder()
        .set_default("environment", run_env.clone())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;

    Ok(app_config)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies, with
/// sqlx query logging capped at `warn`.
pub fn init_tracing(config: &AppConfig) {
    let default_directive = format!("{},sqlx=warn", config.log_level);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new("sqlite::memory:", "test", "info", false, true, 5)
    }

    #[test]
    fn base_config_passes_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn bogus_log_level_fails_validation() {
        let mut config = base_config();
        config.log_level = "shouty".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_pool_size_fails_validation() {
        let mut config = base_config();
        config.db_max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unset_knobs_take_defaults() {
        let config = base_config();
        assert_eq!(config.db_min_connections, 1);
        assert_eq!(config.db_connect_timeout_secs, 10);
        assert_eq!(config.db_idle_timeout_secs, 300);
        assert_eq!(config.event_channel_capacity, 256);
        assert!(!config.log_json);
        assert!(!config.is_production());
    }
}
