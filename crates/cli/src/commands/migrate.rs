//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! stockroom migrate
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `SQLite` connection string (default `sqlite://inventory.db?mode=rwc`)
//!
//! Migrations live in `crates/server/migrations/` and are embedded in the
//! server library.

use stockroom_server::db::MIGRATOR;
use thiserror::Error;

use super::CommandError;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply pending migrations.
pub async fn run() -> Result<(), MigrationError> {
    let pool = super::connect().await?;

    tracing::info!("Running migrations...");
    MIGRATOR.run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
