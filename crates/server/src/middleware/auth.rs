//! Authentication extractors.
//!
//! Handlers receive the acting user from the session through these
//! extractors and pass it on to the services.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentUser, session_keys};

/// Login page path.
pub const LOGIN_PATH: &str = "/auth/login";

/// Extractor that requires a logged-in user.
///
/// Redirects to the login page when nobody is logged in.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Error returned when authentication is required.
pub enum AuthRejection {
    /// Redirect to login page.
    RedirectToLogin,
    /// Session layer missing from the router.
    NoSession,
    /// Logged in, but not an admin.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
            Self::NoSession => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "Only administrators can access this page",
            )
                .into_response(),
        }
    }
}

async fn current_user(parts: &Parts) -> Result<CurrentUser, AuthRejection> {
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AuthRejection::NoSession)?;

    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
        .ok_or(AuthRejection::RedirectToLogin)
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(parts).await.map(Self)
    }
}

/// Extractor that requires an admin.
///
/// Redirects to login when nobody is logged in; 403 for non-admins.
pub struct RequireAdmin(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = current_user(parts).await?;
        if !user.is_admin {
            tracing::warn!(user = %user.username, path = %parts.uri.path(), "Admin page denied");
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self(user))
    }
}

/// Extractor that optionally gets the current user.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_user(parts).await.ok()))
    }
}

/// Store the logged-in user in the session.
///
/// Cycles the session ID first so a pre-login ID cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Remove the logged-in user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

/// Best-effort client address for the login audit trail.
///
/// Uses the first `X-Forwarded-For` entry, then the socket peer address when
/// the server was started with connect info.
pub struct ClientIp(pub Option<String>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty());

        let peer = || {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        };

        Ok(Self(forwarded.or_else(peer)))
    }
}
