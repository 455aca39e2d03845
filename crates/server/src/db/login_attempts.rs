//! Login attempt audit trail.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};
use tracing::instrument;

use super::RepositoryError;

/// Record one login attempt.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
#[instrument(skip(executor))]
pub async fn record<'e, E>(
    executor: E,
    username: &str,
    ip_address: Option<&str>,
    successful: bool,
    attempted_at: DateTime<Utc>,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r"
        INSERT INTO login_attempt (username, attempted_at, ip_address, successful)
        VALUES (?, ?, ?, ?)
        ",
    )
    .bind(username)
    .bind(attempted_at)
    .bind(ip_address)
    .bind(successful)
    .execute(executor)
    .await?;
    Ok(())
}

/// Timestamps of the most recent failed attempts for a username, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn recent_failures<'e, E>(
    executor: E,
    username: &str,
    limit: i64,
) -> Result<Vec<DateTime<Utc>>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<(DateTime<Utc>,)> = sqlx::query_as(
        r"
        SELECT attempted_at FROM login_attempt
        WHERE username = ? AND successful = 0
        ORDER BY id DESC
        LIMIT ?
        ",
    )
    .bind(username)
    .bind(limit)
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().map(|(at,)| at).collect())
}

/// Delete failed attempts for one username, or for everyone when `None`.
/// Returns the number of rows removed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
#[instrument(skip(executor))]
pub async fn reset_failures<'e, E>(
    executor: E,
    username: Option<&str>,
) -> Result<u64, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = match username {
        Some(name) => {
            sqlx::query("DELETE FROM login_attempt WHERE successful = 0 AND username = ?")
                .bind(name)
                .execute(executor)
                .await?
        }
        None => {
            sqlx::query("DELETE FROM login_attempt WHERE successful = 0")
                .execute(executor)
                .await?
        }
    };
    Ok(result.rows_affected())
}
