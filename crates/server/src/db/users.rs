//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use stockroom_core::UserId;

use super::RepositoryError;
use crate::models::User;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    username: String,
    is_admin: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            is_admin: row.is_admin,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a user by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, is_admin, created_at FROM app_user WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Get a user together with their stored password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithHashRow>(
            "SELECT id, username, is_admin, created_at, password_hash FROM app_user WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(|r| (User::from(r.user), r.password_hash)))
    }

    /// Create a user with an already-hashed password.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO app_user (username, password_hash, is_admin, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, username, is_admin, created_at
            ",
        )
        .bind(username)
        .bind(password_hash)
        .bind(is_admin)
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "username"))?;

        Ok(row.into())
    }

    /// List every user ordered by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, is_admin, created_at FROM app_user ORDER BY username",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}
