//! Authentication route handlers.
//!
//! Password login with lockout, logout, and admin-only user registration.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::middleware::auth::LOGIN_PATH;
use crate::middleware::{
    ClientIp, OptionalAuth, RequireAdmin, clear_current_user, set_current_user,
};
use crate::models::CurrentUser;
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

use super::{Flash, MessageQuery, redirect_error, redirect_success};

const REGISTER_PATH: &str = "/auth/register";

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// User registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub password_confirm: String,
    /// Checkbox; present when ticked.
    pub is_admin: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub flash: Flash,
}

/// User registration page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub user: CurrentUser,
    pub flash: Flash,
}

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(LOGIN_PATH, get(login_page).post(login))
        .route("/auth/logout", post(logout))
        .route(REGISTER_PATH, get(register_page).post(register))
}

// =============================================================================
// Login / Logout
// =============================================================================

/// Display the login page.
///
/// GET /auth/login
async fn login_page(
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<MessageQuery>,
) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    LoginTemplate {
        flash: query.into(),
    }
    .into_response()
}

/// Handle login form submission.
///
/// POST /auth/login
#[instrument(skip(state, session, form, ip), fields(username = %form.username))]
async fn login(
    State(state): State<AppState>,
    session: Session,
    ClientIp(ip): ClientIp,
    Form(form): Form<LoginForm>,
) -> Response {
    let auth = AuthService::new(state.pool());

    match auth
        .authenticate(&form.username, &form.password, ip.as_deref())
        .await
    {
        Ok(user) => {
            if let Err(e) = set_current_user(&session, &user).await {
                tracing::error!("Failed to set session: {}", e);
                return redirect_error(LOGIN_PATH, "Could not start a session, please try again")
                    .into_response();
            }
            set_sentry_user(&user);
            Redirect::to("/").into_response()
        }
        Err(e @ (AuthError::InvalidCredentials | AuthError::LockedOut)) => {
            redirect_error(LOGIN_PATH, &e.to_string()).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Login failed");
            redirect_error(LOGIN_PATH, "Login failed, please try again").into_response()
        }
    }
}

/// Logout and clear session.
///
/// POST /auth/logout
async fn logout(session: Session) -> impl IntoResponse {
    if let Err(e) = clear_current_user(&session).await {
        tracing::warn!("Failed to clear session: {}", e);
    }
    clear_sentry_user();
    redirect_success(LOGIN_PATH, "You have been logged out")
}

// =============================================================================
// Registration
// =============================================================================

/// Display the user registration page.
///
/// GET /auth/register
async fn register_page(
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<MessageQuery>,
) -> impl IntoResponse {
    RegisterTemplate {
        user,
        flash: query.into(),
    }
}

/// Handle user registration.
///
/// POST /auth/register
#[instrument(skip(state, admin, form), fields(admin = %admin.username, username = %form.username))]
async fn register(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Form(form): Form<RegisterForm>,
) -> Response {
    let auth = AuthService::new(state.pool());
    let is_admin = form.is_admin.is_some();

    match auth
        .register_user(&form.username, &form.password, &form.password_confirm, is_admin)
        .await
    {
        Ok(user) => redirect_success(
            REGISTER_PATH,
            &format!("User '{}' created", user.username),
        )
        .into_response(),
        Err(AuthError::Repository(e)) => {
            tracing::error!(error = %e, "User registration failed");
            redirect_error(REGISTER_PATH, "Registration failed, please try again").into_response()
        }
        Err(e) => redirect_error(REGISTER_PATH, &e.to_string()).into_response(),
    }
}
