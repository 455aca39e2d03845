//! HTTP middleware for the server.
//!
//! - `auth` - extractors requiring a logged-in user or an admin
//! - `session` - tower-sessions layer backed by `SQLite`

pub mod auth;
pub mod session;

pub use auth::{
    ClientIp, OptionalAuth, RequireAdmin, RequireAuth, clear_current_user, set_current_user,
};
pub use session::create_session_layer;
