//! CLI subcommand implementations.

pub mod migrate;
pub mod user;

use sqlx::SqlitePool;
use stockroom_server::config::{ConfigError, ServerConfig};
use stockroom_server::db;
use thiserror::Error;

/// Errors shared by every command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Open the database named by `DATABASE_URL`.
pub async fn connect() -> Result<SqlitePool, CommandError> {
    let config = ServerConfig::from_env()?;
    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&config.database_url).await?)
}
