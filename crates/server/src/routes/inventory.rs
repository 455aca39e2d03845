//! Inventory browsing and stock intake.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::instrument;

use stockroom_core::{ItemId, LocationId, Quantity, UnitPrice, parse_optional_date};

use crate::db::{items, locations, movements, stock};
use crate::error::AppError;
use crate::models::{
    CurrentUser, Item, ItemDetails, ItemStock, Location, LocationStockLine, Movement, Page,
    Pagination,
};
use crate::middleware::RequireAuth;
use crate::services::ledger::{AddStock, Ledger, LedgerError};
use crate::state::AppState;

use super::{Flash, ListQuery, MessageQuery, non_empty, redirect_error, redirect_success};

const NEW_ITEM_PATH: &str = "/items/new";

/// Movements shown on the item detail page.
const RECENT_MOVEMENTS: usize = 10;

// =============================================================================
// Form Types
// =============================================================================

/// Add stock form data.
#[derive(Debug, Deserialize)]
pub struct AddItemForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub condition: String,
    pub location: String,
    pub quantity: String,
    pub date_acquired: Option<String>,
    pub price_per_item: Option<String>,
}

impl AddItemForm {
    fn into_request(self) -> Result<AddStock, LedgerError> {
        let quantity = Quantity::parse(&self.quantity)?;
        let date_acquired = parse_optional_date(self.date_acquired.as_deref().unwrap_or_default())?;
        let price_per_item = non_empty(self.price_per_item)
            .map(|p| UnitPrice::parse(&p))
            .transpose()?;

        let mut details = ItemDetails::named(self.name)
            .with_description(self.description)
            .with_category(&self.category)
            .with_condition(&self.condition);
        details.date_acquired = date_acquired;
        details.price_per_item = price_per_item;

        Ok(AddStock {
            details,
            location: self.location,
            quantity,
        })
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Items-with-stock listing (index and search).
#[derive(Template, WebTemplate)]
#[template(path = "items/index.html")]
pub struct IndexTemplate {
    pub user: CurrentUser,
    pub flash: Flash,
    pub query: String,
    pub page: Page<ItemStock>,
}

/// Add stock form.
#[derive(Template, WebTemplate)]
#[template(path = "items/new.html")]
pub struct NewItemTemplate {
    pub user: CurrentUser,
    pub flash: Flash,
    pub categories: Vec<String>,
    pub conditions: Vec<String>,
    pub locations: Vec<Location>,
}

/// Item detail page.
#[derive(Template, WebTemplate)]
#[template(path = "items/detail.html")]
pub struct ItemDetailTemplate {
    pub user: CurrentUser,
    pub flash: Flash,
    pub stock: ItemStock,
    pub movements: Vec<Movement>,
}

/// Location detail page.
#[derive(Template, WebTemplate)]
#[template(path = "locations/detail.html")]
pub struct LocationDetailTemplate {
    pub user: CurrentUser,
    pub flash: Flash,
    pub location: Location,
    pub lines: Vec<LocationStockLine>,
}

impl LocationDetailTemplate {
    fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// Build the inventory router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/search", get(search))
        .route(NEW_ITEM_PATH, get(new_item_page).post(add_item))
        .route("/items/{id}", get(item_detail))
        .route("/locations/{id}", get(location_detail))
}

// =============================================================================
// Shared Loading
// =============================================================================

/// Attach stock lines to a page of items with one batch query.
pub(crate) async fn with_stock(
    pool: &SqlitePool,
    page: Page<Item>,
) -> Result<Page<ItemStock>, AppError> {
    let ids: Vec<ItemId> = page.items.iter().map(|item| item.id).collect();
    let mut lines = stock::lines_for_items(pool, &ids).await?;
    Ok(page.map(|item| ItemStock {
        lines: lines.remove(&item.id).unwrap_or_default(),
        item,
    }))
}

/// Load an item and its stock lines, or 404.
pub(crate) async fn load_item_stock(pool: &SqlitePool, id: ItemId) -> Result<ItemStock, AppError> {
    let item = items::get(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("item {id}")))?;
    let lines = stock::lines_for_item(pool, id).await?;
    Ok(ItemStock { item, lines })
}

// =============================================================================
// Listing
// =============================================================================

/// Items with stock, paginated.
///
/// GET /
#[instrument(skip(state, user, query))]
async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    render_listing(&state, user, &query).await
}

/// Search items with stock by name or description.
///
/// GET /search?q=
#[instrument(skip(state, user, query), fields(q = ?query.q))]
async fn search(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    render_listing(&state, user, &query).await
}

async fn render_listing(
    state: &AppState,
    user: CurrentUser,
    query: &ListQuery,
) -> Result<IndexTemplate, AppError> {
    let pagination = Pagination::new(query.page, state.per_page());
    let page = items::list_in_stock(state.pool(), query.search(), pagination).await?;

    Ok(IndexTemplate {
        user,
        flash: query.flash(),
        query: query.search().unwrap_or_default().to_owned(),
        page: with_stock(state.pool(), page).await?,
    })
}

// =============================================================================
// Add Stock
// =============================================================================

/// Add stock form.
///
/// GET /items/new
async fn new_item_page(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, AppError> {
    Ok(NewItemTemplate {
        user,
        flash: query.into(),
        categories: items::distinct_categories(state.pool()).await?,
        conditions: items::distinct_conditions(state.pool()).await?,
        locations: locations::list_all(state.pool()).await?,
    })
}

/// Add stock, creating the item and location as needed.
///
/// POST /items/new
#[instrument(skip(state, user, form), fields(user = %user.username))]
async fn add_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<AddItemForm>,
) -> Result<Response, AppError> {
    let result = match form.into_request() {
        Ok(request) => Ledger::new(state.pool()).add_stock(&user, request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => Ok(redirect_success("/", &outcome.message()).into_response()),
        Err(e @ (LedgerError::InvalidArgument(_) | LedgerError::NotFound { .. })) => {
            Ok(redirect_error(NEW_ITEM_PATH, &e.to_string()).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Detail Pages
// =============================================================================

/// Item detail: metadata, stock lines and recent movements.
///
/// GET /items/{id}
#[instrument(skip(state, user, query))]
async fn item_detail(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let id = ItemId::new(id);
    let stock = load_item_stock(state.pool(), id).await?;
    let mut movements = movements::list_for_item(state.pool(), id).await?;
    movements.truncate(RECENT_MOVEMENTS);

    Ok(ItemDetailTemplate {
        user,
        flash: query.into(),
        stock,
        movements,
    })
}

/// Location detail: the stock held there.
///
/// GET /locations/{id}
#[instrument(skip(state, user, query))]
async fn location_detail(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let id = LocationId::new(id);
    let location = locations::get(state.pool(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("location {id}")))?;
    let lines = stock::lines_for_location(state.pool(), id).await?;

    Ok(LocationDetailTemplate {
        user,
        flash: query.into(),
        location,
        lines,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(quantity: &str, price: Option<&str>) -> AddItemForm {
        AddItemForm {
            name: "Altar Candle".to_owned(),
            description: String::new(),
            category: String::new(),
            condition: "New".to_owned(),
            location: "sacristy".to_owned(),
            quantity: quantity.to_owned(),
            date_acquired: Some(String::new()),
            price_per_item: price.map(str::to_owned),
        }
    }

    #[test]
    fn test_add_form_parses_into_request() {
        let request = form("10", Some("2.50")).into_request().unwrap();
        assert_eq!(request.quantity.get(), 10);
        assert_eq!(request.details.category, "Uncategorized");
        assert_eq!(request.details.condition, "New");
        assert!(request.details.date_acquired.is_none());
        assert_eq!(request.details.price_per_item.unwrap().display(), "2.50");
    }

    #[test]
    fn test_add_form_rejects_bad_numbers() {
        assert!(matches!(
            form("0", None).into_request(),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            form("ten", None).into_request(),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            form("1", Some("-3")).into_request(),
            Err(LedgerError::InvalidArgument(_))
        ));
    }
}
