//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create the first administrator
//! STOCKROOM_PASSWORD=... stockroom user create -u alice --admin
//!
//! # List users
//! stockroom user list
//!
//! # Lift a lockout
//! stockroom user reset-login-attempts -u alice
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `SQLite` connection string
//! - `STOCKROOM_PASSWORD` - Password for `user create` when `--password` is omitted

use secrecy::{ExposeSecret, SecretString};
use stockroom_server::db::UserRepository;
use stockroom_server::services::auth::{AuthError, AuthService};
use thiserror::Error;

use super::CommandError;

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("{0}")]
    Auth(#[from] AuthError),
}

/// Create a user.
///
/// # Returns
///
/// The ID of the created user.
pub async fn create(
    username: &str,
    password: &SecretString,
    is_admin: bool,
) -> Result<i64, UserError> {
    let pool = super::connect().await?;
    let auth = AuthService::new(&pool);

    let secret = password.expose_secret();
    let user = auth.register_user(username, secret, secret, is_admin).await?;

    tracing::info!(
        "User created successfully! ID: {}, Username: {}, Admin: {}",
        user.id,
        user.username,
        user.is_admin
    );
    Ok(user.id.as_i64())
}

/// Log every user.
pub async fn list() -> Result<(), UserError> {
    let pool = super::connect().await?;
    let users = UserRepository::new(&pool)
        .list_all()
        .await
        .map_err(AuthError::from)?;

    if users.is_empty() {
        tracing::info!("No users");
    }
    for user in users {
        tracing::info!(
            "{:>4}  {:<24} {}  created {}",
            user.id.as_i64(),
            user.username,
            if user.is_admin { "admin" } else { "user " },
            user.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

/// Clear failed login attempts for one username, or for everyone.
pub async fn reset_login_attempts(username: Option<&str>) -> Result<(), UserError> {
    let pool = super::connect().await?;
    let cleared = AuthService::new(&pool).reset_attempts(username).await?;

    match username {
        Some(name) => tracing::info!("Cleared {} failed login attempt(s) for {}", cleared, name),
        None => tracing::info!("Cleared {} failed login attempt(s)", cleared),
    }
    Ok(())
}
