use crate::config::AppConfig;
use crate::errors::ServiceError;
use anyhow::Context;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::{error, info};

/// Shared connection pool handle used by every service and command.
pub type DbPool = DatabaseConnection;

/// Database pool tuning parameters.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(10),
            acquire_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            url: config.database_url.clone(),
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            connect_timeout: Duration::from_secs(config.db_connect_timeout_secs),
            acquire_timeout: Duration::from_secs(config.db_acquire_timeout_secs),
            idle_timeout: Duration::from_secs(config.db_idle_timeout_secs),
        }
    }
}

/// Establish a connection pool with explicit tuning.
pub async fn establish_connection_with_config(db_config: DbConfig) -> Result<DbPool, ServiceError> {
    let mut options = ConnectOptions::new(db_config.url);
    options
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .connect_timeout(db_config.connect_timeout)
        .acquire_timeout(db_config.acquire_timeout)
        .idle_timeout(db_config.idle_timeout)
        .sqlx_logging(true);

    let pool = Database::connect(options)
        .await
        .map_err(ServiceError::DatabaseError)
        .context("Database connection establishment failed")?;

    info!("Database connection established");
    Ok(pool)
}

/// Establish a pool from application configuration.
pub async fn establish_connection_from_app_config(
    config: &AppConfig,
) -> Result<DbPool, ServiceError> {
    establish_connection_with_config(DbConfig::from(config)).await
}

/// Convenience for binaries: load configuration, connect, and apply
/// migrations when `auto_migrate` is set.
pub async fn create_db_pool() -> Result<DbPool, ServiceError> {
    let config = crate::config::load_config().map_err(|e| ServiceError::Other(e.into()))?;
    let pool = establish_connection_from_app_config(&config).await?;

    if config.auto_migrate {
        run_migrations(&pool).await?;
    }

    Ok(pool)
}

/// Apply every embedded migration.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    crate::migrator::Migrator::up(pool, None).await.map_err(|e| {
        error!("Database migration failed: {}", e);
        ServiceError::DatabaseError(e)
    })?;
    info!("Database migrations completed");
    Ok(())
}

/// Cheap connectivity probe.
pub async fn check_connection(pool: &DbPool) -> Result<(), DbErr> {
    pool.ping().await
}

/// Close the pool gracefully.
pub async fn close_pool(pool: DbPool) -> Result<(), DbErr> {
    pool.close().await
}
