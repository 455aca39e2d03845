//! Authentication service.
//!
//! Password login with per-username lockout, plus user registration.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::instrument;

use crate::db::login_attempts;
use crate::db::{RepositoryError, UserRepository};
use crate::models::{CurrentUser, User};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Failed attempts inside the window that lock a username.
pub const MAX_FAILED_ATTEMPTS: usize = 5;

/// Trailing window for counting failed attempts.
pub const LOCKOUT_WINDOW_HOURS: i64 = 12;

/// Authentication service.
pub struct AuthService<'a> {
    pool: &'a SqlitePool,
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self {
            pool,
            users: UserRepository::new(pool),
        }
    }

    /// Check a username and password.
    ///
    /// A locked-out username is rejected before the password is checked.
    /// Every attempt that reaches the password check is recorded.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::LockedOut` after too many recent failures.
    /// Returns `AuthError::InvalidCredentials` if the username/password is wrong.
    #[instrument(skip(self, password, ip_address))]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        ip_address: Option<&str>,
    ) -> Result<CurrentUser, AuthError> {
        let username = username.trim();
        let now = Utc::now();

        #[allow(clippy::cast_possible_wrap)]
        let failures =
            login_attempts::recent_failures(self.pool, username, MAX_FAILED_ATTEMPTS as i64)
                .await?;
        if is_locked_out(&failures, now) {
            tracing::warn!(username, "Login rejected: account locked");
            return Err(AuthError::LockedOut);
        }

        let result = match self.users.get_password_hash(username).await? {
            Some((user, hash)) => verify_password(password, &hash).map(|()| user),
            None => Err(AuthError::InvalidCredentials),
        };

        login_attempts::record(self.pool, username, ip_address, result.is_ok(), now).await?;

        match result {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "User logged in");
                Ok(CurrentUser::from(&user))
            }
            Err(e) => {
                tracing::info!(username, "Failed login attempt");
                Err(e)
            }
        }
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername` for an empty username.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::PasswordMismatch` if the confirmation differs.
    /// Returns `AuthError::UserAlreadyExists` if the username is taken.
    #[instrument(skip(self, password, confirm))]
    pub async fn register_user(
        &self,
        username: &str,
        password: &str,
        confirm: &str,
        is_admin: bool,
    ) -> Result<User, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::InvalidUsername);
        }
        validate_password(password)?;
        if password != confirm {
            return Err(AuthError::PasswordMismatch);
        }

        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(username, &password_hash, is_admin)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, is_admin, "User registered");
        Ok(user)
    }

    /// Clear failed attempts for one username, or everyone when `None`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    pub async fn reset_attempts(&self, username: Option<&str>) -> Result<u64, AuthError> {
        Ok(login_attempts::reset_failures(self.pool, username).await?)
    }
}

/// Whether the given failure timestamps lock the username at `now`.
#[must_use]
pub fn is_locked_out(failures: &[DateTime<Utc>], now: DateTime<Utc>) -> bool {
    let window_start = now - Duration::hours(LOCKOUT_WINDOW_HOURS);
    failures.iter().filter(|&&at| at > window_start).count() >= MAX_FAILED_ATTEMPTS
}

/// Validate password strength.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_lockout_needs_five_recent_failures() {
        let now = Utc::now();
        let four: Vec<_> = (1..=4).map(|m| now - Duration::minutes(m)).collect();
        assert!(!is_locked_out(&four, now));

        let five: Vec<_> = (1..=5).map(|m| now - Duration::minutes(m)).collect();
        assert!(is_locked_out(&five, now));
    }

    #[test]
    fn test_lockout_window_slides() {
        let now = Utc::now();
        let mut failures: Vec<_> = (1..=4).map(|m| now - Duration::minutes(m)).collect();
        failures.push(now - Duration::hours(13));
        assert!(!is_locked_out(&failures, now));
    }

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough").is_ok());
    }
}
