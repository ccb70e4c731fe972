//! Standalone migration runner.
//!
//! Applies all pending migrations against `DATABASE_URL` and exits. Useful
//! for deploy pipelines where the schema is rolled forward before the
//! service itself starts with `auto_migrate` off.

use std::env;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::{info, Level};

use stockflow::migrator::Migrator;

#[tokio::main]
async fn main() -> Result<(), DbErr> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());

    info!("Connecting to database");

    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(5)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(true);

    let db = Database::connect(options).await?;

    info!("Running migrations");
    Migrator::up(&db, None).await?;
    info!("Migrations applied");

    Ok(())
}
