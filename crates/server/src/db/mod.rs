//! Database operations for the inventory `SQLite` database.
//!
//! ## Tables
//!
//! - `location` - Normalized storage location names
//! - `item` - Item catalog
//! - `stock_cell` - Positive quantity per (item, location)
//! - `movement` - Append-only transfer history
//! - `disposed_item` - Append-only disposal history
//! - `app_user` - User accounts
//! - `login_attempt` - Login audit trail used for lockout
//! - `tower_sessions` - Session storage (created by the session store)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and embedded in
//! [`MIGRATOR`]. Run them via:
//! ```bash
//! cargo run -p stockroom-cli -- migrate
//! ```
//!
//! Functions that issue a single statement are generic over the executor so
//! they accept a pool or an open transaction. Functions that issue several
//! statements take a `&mut SqliteConnection`.

pub mod disposals;
pub mod items;
pub mod locations;
pub mod login_attempts;
pub mod movements;
pub mod stock;
pub mod users;

use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;

pub use users::UserRepository;

/// Embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique username).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Convert a sqlx error, mapping unique violations to [`Self::Conflict`].
    pub(crate) fn from_unique(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(e)
    }
}

/// Create a `SQLite` connection pool.
///
/// The database file is created if missing. Foreign keys are enforced.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the database cannot be opened.
pub async fn create_pool(database_url: &SecretString) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url.expose_secret())?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}

/// Build a `LIKE` pattern matching `needle` anywhere, escaping wildcards.
///
/// Use with `LIKE ? ESCAPE '\'`. `SQLite`'s `LIKE` is case-insensitive for
/// ASCII.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
