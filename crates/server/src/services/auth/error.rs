//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid credentials (wrong password or user not found).
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Too many recent failed attempts for this username.
    #[error("too many failed login attempts, try again later")]
    LockedOut,

    /// User already exists.
    #[error("username already exists")]
    UserAlreadyExists,

    /// Username empty or otherwise unusable.
    #[error("username is required")]
    InvalidUsername,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
