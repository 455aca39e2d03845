//! Admin item deletion.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use stockroom_core::ItemId;

use crate::db::{disposals, items, movements};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{CurrentUser, ItemStock, Page, Pagination};
use crate::services::ledger::{Ledger, LedgerError};
use crate::state::AppState;

use super::inventory::{load_item_stock, with_stock};
use super::{Flash, ListQuery, MessageQuery, redirect_error, redirect_success};

/// Delete confirmation form data.
#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    /// Checkbox; present when ticked.
    pub confirm: Option<String>,
}

/// Catalog listing with delete links.
#[derive(Template, WebTemplate)]
#[template(path = "items/delete_list.html")]
pub struct DeleteListTemplate {
    pub user: CurrentUser,
    pub flash: Flash,
    pub query: String,
    pub page: Page<ItemStock>,
}

/// Delete confirmation page showing what will be removed.
#[derive(Template, WebTemplate)]
#[template(path = "items/delete.html")]
pub struct DeleteItemTemplate {
    pub user: CurrentUser,
    pub flash: Flash,
    pub stock: ItemStock,
    pub movement_count: i64,
    pub disposal_count: i64,
}

/// Build the delete router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/items/delete", get(delete_list))
        .route("/items/{id}/delete", get(delete_page).post(delete_item))
}

/// Every catalog item, including those without stock.
///
/// GET /items/delete?q=
#[instrument(skip(state, user, query))]
async fn delete_list(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let pagination = Pagination::new(query.page, state.per_page());
    let page = items::list_catalog(state.pool(), query.search(), pagination).await?;

    Ok(DeleteListTemplate {
        user,
        flash: query.flash(),
        query: query.search().unwrap_or_default().to_owned(),
        page: with_stock(state.pool(), page).await?,
    })
}

/// Delete confirmation page.
///
/// GET /items/{id}/delete
#[instrument(skip(state, user, query))]
async fn delete_page(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let id = ItemId::new(id);
    let stock = load_item_stock(state.pool(), id).await?;

    Ok(DeleteItemTemplate {
        user,
        flash: query.into(),
        movement_count: movements::count_for_item(state.pool(), id).await?,
        disposal_count: disposals::count_for_item(state.pool(), id).await?,
        stock,
    })
}

/// Delete an item and everything recorded against it.
///
/// POST /items/{id}/delete
#[instrument(skip(state, user, form), fields(user = %user.username))]
async fn delete_item(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
    Form(form): Form<DeleteForm>,
) -> Result<Response, AppError> {
    let item_id = ItemId::new(id);

    match Ledger::new(state.pool())
        .delete_item(&user, item_id, form.confirm.is_some())
        .await
    {
        Ok(deleted) => Ok(redirect_success(
            "/items/delete",
            &format!(
                "Deleted '{}' with {} stock line(s), {} movement(s) and {} disposal(s)",
                deleted.name, deleted.stock_cells, deleted.movements, deleted.disposals
            ),
        )
        .into_response()),
        Err(e @ LedgerError::InvalidArgument(_)) => Ok(redirect_error(
            &format!("/items/{item_id}/delete"),
            &e.to_string(),
        )
        .into_response()),
        Err(e) => Err(e.into()),
    }
}
