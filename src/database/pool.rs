use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config;

/// Errors from the storage layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

// Process-wide pool, created once. OnceCell::get_or_try_init coalesces
// concurrent first requests into a single connection attempt.
static POOL: OnceCell<PgPool> = OnceCell::const_new();

/// Get the shared connection pool, establishing it on first use.
pub async fn db_pool() -> Result<&'static PgPool, DatabaseError> {
    POOL.get_or_try_init(connect).await
}

async fn connect() -> Result<PgPool, DatabaseError> {
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| DatabaseError::ConfigMissing("DATABASE_URL"))?;

    // Validate the URL up front so a typo fails with a clear error
    // instead of a connect timeout.
    url::Url::parse(&database_url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;

    let db_config = &config::config().database;
    let pool = PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .acquire_timeout(Duration::from_secs(db_config.connect_timeout_secs))
        .connect(&database_url)
        .await?;

    info!("Connected to database");
    Ok(pool)
}

/// Pings the pool to ensure connectivity
pub async fn health_check() -> Result<(), DatabaseError> {
    let pool = db_pool().await?;
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
