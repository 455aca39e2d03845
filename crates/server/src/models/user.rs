//! User and session identity types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::UserId;

/// A user account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Session-stored identity of the logged-in user.
///
/// Handlers pass this to ledger operations as the acting user; it stamps
/// `responsible_person` and `disposed_by` and gates admin-only mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub is_admin: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}
