//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! GET  /auth/login             - Login page
//! POST /auth/login             - Password login
//! POST /auth/logout            - Logout
//! GET  /auth/register          - Create user form (admin)
//! POST /auth/register          - Create user (admin)
//!
//! # Inventory
//! GET  /                       - Items with stock, paginated
//! GET  /search?q=              - Search items with stock
//! GET  /items/new              - Add stock form
//! POST /items/new              - Add stock
//! GET  /items/{id}             - Item detail
//! GET  /locations/{id}         - Location detail
//!
//! # Admin edits
//! GET  /items/edit?q=          - Edit listing (admin)
//! GET  /items/{id}/edit        - Edit form (admin)
//! POST /items/{id}/edit        - Save edit (admin)
//! GET  /items/delete?q=        - Delete listing (admin)
//! GET  /items/{id}/delete      - Delete confirmation (admin)
//! POST /items/{id}/delete      - Delete item (admin)
//!
//! # Stock movements
//! GET  /items/{id}/dispose     - Dispose form
//! POST /items/{id}/dispose     - Dispose stock
//! GET  /transfer?item_id=      - Transfer form
//! POST /transfer               - Transfer stock
//!
//! # History
//! GET  /movements?q=&page=     - Movement log
//! GET  /disposals?q=&page=     - Disposal log
//!
//! # CSV
//! POST /csv/import             - Multipart upload
//! GET  /csv/export?type=       - Download export
//! GET  /csv/template?type=     - Download import template
//! ```

pub mod auth;
pub mod csv;
pub mod delete;
pub mod dispose;
pub mod edit;
pub mod history;
pub mod inventory;
pub mod transfer;

use axum::Router;
use axum::response::Redirect;
use serde::Deserialize;

use crate::state::AppState;

/// Build the application router (without state or layers).
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(inventory::router())
        .merge(edit::router())
        .merge(delete::router())
        .merge(dispose::router())
        .merge(transfer::router())
        .merge(history::router())
        .merge(csv::router())
}

// =============================================================================
// Shared Query Types
// =============================================================================

/// Query parameters for error/success display.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Query parameters for searchable, paginated lists.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub error: Option<String>,
    pub success: Option<String>,
}

impl ListQuery {
    /// Trimmed search text, `None` when blank.
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    /// Flash messages carried by the query string.
    #[must_use]
    pub fn flash(&self) -> Flash {
        Flash {
            error: self.error.clone(),
            success: self.success.clone(),
        }
    }
}

/// One-shot messages shown at the top of a page.
#[derive(Debug, Clone, Default)]
pub struct Flash {
    pub error: Option<String>,
    pub success: Option<String>,
}

impl From<MessageQuery> for Flash {
    fn from(query: MessageQuery) -> Self {
        Self {
            error: query.error,
            success: query.success,
        }
    }
}

// =============================================================================
// Redirect Helpers
// =============================================================================

/// Redirect to `path` with an error message.
#[must_use]
pub fn redirect_error(path: &str, message: &str) -> Redirect {
    Redirect::to(&with_message(path, "error", message))
}

/// Redirect to `path` with a success message.
#[must_use]
pub fn redirect_success(path: &str, message: &str) -> Redirect {
    Redirect::to(&with_message(path, "success", message))
}

fn with_message(path: &str, key: &str, message: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}{key}={}", urlencoding::encode(message))
}

/// Treat an empty form field as absent.
#[must_use]
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_message_encodes_and_appends() {
        assert_eq!(
            with_message("/transfer", "error", "not enough stock: 5 > 2"),
            "/transfer?error=not%20enough%20stock%3A%205%20%3E%202"
        );
        assert_eq!(
            with_message("/transfer?item_id=3", "success", "ok"),
            "/transfer?item_id=3&success=ok"
        );
    }

    #[test]
    fn test_list_query_search_ignores_blank() {
        let query = ListQuery {
            q: Some("   ".to_owned()),
            ..ListQuery::default()
        };
        assert_eq!(query.search(), None);

        let query = ListQuery {
            q: Some(" candle ".to_owned()),
            ..ListQuery::default()
        };
        assert_eq!(query.search(), Some("candle"));
    }
}
