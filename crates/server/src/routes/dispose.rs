//! Stock disposal.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::instrument;

use stockroom_core::{DATE_FORMAT, ItemId, LocationId, Quantity, parse_optional_date};

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{CurrentUser, ItemStock};
use crate::services::ledger::{Dispose, Ledger, LedgerError};
use crate::state::AppState;

use super::inventory::load_item_stock;
use super::{Flash, MessageQuery, redirect_error, redirect_success};

/// Disposal form data.
#[derive(Debug, Deserialize)]
pub struct DisposeForm {
    pub location_id: i64,
    pub quantity: String,
    #[serde(default)]
    pub reason: String,
    /// `YYYY-MM-DD`; today when blank.
    pub disposed_date: Option<String>,
    pub notes: Option<String>,
}

impl DisposeForm {
    fn into_request(self, item_id: ItemId, today: NaiveDate) -> Result<Dispose, LedgerError> {
        let date = parse_optional_date(self.disposed_date.as_deref().unwrap_or_default())?;
        Ok(Dispose {
            item_id,
            location_id: LocationId::new(self.location_id),
            quantity: Quantity::parse(&self.quantity)?,
            reason: self.reason,
            date: date.unwrap_or(today),
            notes: self.notes,
        })
    }
}

/// Disposal form.
#[derive(Template, WebTemplate)]
#[template(path = "items/dispose.html")]
pub struct DisposeTemplate {
    pub user: CurrentUser,
    pub flash: Flash,
    pub stock: ItemStock,
    pub today: String,
}

/// Build the disposal router.
pub fn router() -> Router<AppState> {
    Router::new().route("/items/{id}/dispose", get(dispose_page).post(dispose))
}

/// Disposal form for an item's stock lines.
///
/// GET /items/{id}/dispose
#[instrument(skip(state, user, query))]
async fn dispose_page(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
    Query(query): Query<MessageQuery>,
) -> Result<Response, AppError> {
    let stock = load_item_stock(state.pool(), ItemId::new(id)).await?;

    if stock.lines.is_empty() {
        return Ok(redirect_error(
            &format!("/items/{id}"),
            &format!("'{}' has no stock to dispose of", stock.item.name),
        )
        .into_response());
    }

    Ok(DisposeTemplate {
        user,
        flash: query.into(),
        stock,
        today: Utc::now().date_naive().format(DATE_FORMAT).to_string(),
    }
    .into_response())
}

/// Dispose of stock at one location.
///
/// POST /items/{id}/dispose
#[instrument(skip(state, user, form), fields(user = %user.username))]
async fn dispose(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
    Form(form): Form<DisposeForm>,
) -> Result<Response, AppError> {
    let item_id = ItemId::new(id);

    let result = match form.into_request(item_id, Utc::now().date_naive()) {
        Ok(request) => Ledger::new(state.pool()).dispose(&user, request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => Ok(redirect_success(
            &format!("/items/{item_id}"),
            &format!(
                "Disposed of {} x '{}' from {}",
                outcome.quantity, outcome.item.name, outcome.location.name
            ),
        )
        .into_response()),
        Err(e) if e.is_missing_item() => Err(e.into()),
        Err(
            e @ (LedgerError::InvalidArgument(_)
            | LedgerError::NotFound { .. }
            | LedgerError::InsufficientStock { .. }),
        ) => {
            let form_path = format!("/items/{item_id}/dispose");
            Ok(redirect_error(&form_path, &e.to_string()).into_response())
        }
        Err(e) => Err(e.into()),
    }
}
