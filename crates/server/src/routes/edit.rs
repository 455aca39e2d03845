//! Admin item editing.
//!
//! The edit form posts one location/quantity pair per stock line, keyed by
//! the line's cell id (`line-{id}-location`, `line-{id}-quantity`), plus an
//! optional `new_location`/`new_quantity` pair for opening a new line.

use std::collections::{BTreeMap, HashMap};

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::instrument;

use stockroom_core::{ItemId, Quantity, StockCellId, UnitPrice, parse_optional_date};

use crate::db::{items, locations};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{CurrentUser, ItemDetails, ItemStock, Location, Page, Pagination};
use crate::services::ledger::{EditItem, Ledger, LedgerError, LineEdit};
use crate::state::AppState;

use super::inventory::{load_item_stock, with_stock};
use super::{Flash, ListQuery, MessageQuery, redirect_error, redirect_success};

// =============================================================================
// Templates
// =============================================================================

/// Catalog listing with edit links.
#[derive(Template, WebTemplate)]
#[template(path = "items/edit_list.html")]
pub struct EditListTemplate {
    pub user: CurrentUser,
    pub flash: Flash,
    pub query: String,
    pub page: Page<ItemStock>,
}

/// Item edit form.
#[derive(Template, WebTemplate)]
#[template(path = "items/edit.html")]
pub struct EditItemTemplate {
    pub user: CurrentUser,
    pub flash: Flash,
    pub stock: ItemStock,
    pub categories: Vec<String>,
    pub conditions: Vec<String>,
    pub locations: Vec<Location>,
}

/// Build the edit router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/items/edit", get(edit_list))
        .route("/items/{id}/edit", get(edit_page).post(save_edit))
}

// =============================================================================
// Form Parsing
// =============================================================================

#[derive(Default)]
struct LineFields {
    location: String,
    quantity: Option<String>,
}

/// Parse the posted edit form into a ledger request.
fn parse_edit_form(item_id: ItemId, fields: Vec<(String, String)>) -> Result<EditItem, LedgerError> {
    let mut scalars: HashMap<String, String> = HashMap::new();
    let mut lines: BTreeMap<i64, LineFields> = BTreeMap::new();

    for (key, value) in fields {
        if let Some((id, field)) = parse_line_key(&key) {
            let line = lines.entry(id).or_default();
            match field {
                "location" => line.location = value,
                _ => line.quantity = Some(value),
            }
        } else {
            scalars.insert(key, value);
        }
    }

    let field = |name: &str| scalars.get(name).map_or("", String::as_str);

    let mut details = ItemDetails::named(field("name"))
        .with_description(field("description").trim())
        .with_category(field("category"))
        .with_condition(field("condition"));
    details.date_acquired = parse_optional_date(field("date_acquired"))?;
    details.price_per_item = match field("price_per_item").trim() {
        "" => None,
        price => Some(UnitPrice::parse(price)?),
    };

    let lines = lines
        .into_iter()
        .map(|(id, line)| {
            Ok(LineEdit {
                cell_id: StockCellId::new(id),
                quantity: Quantity::parse_or_zero(line.quantity.as_deref().unwrap_or_default())?,
                location: line.location,
            })
        })
        .collect::<Result<Vec<_>, LedgerError>>()?;

    let new_location = field("new_location").trim();
    let new_line = if new_location.is_empty() {
        None
    } else {
        Some((new_location.to_owned(), Quantity::parse(field("new_quantity"))?))
    };

    Ok(EditItem {
        item_id,
        details,
        lines,
        new_line,
    })
}

/// Split `line-{id}-{field}` into its id and field name.
fn parse_line_key(key: &str) -> Option<(i64, &str)> {
    let rest = key.strip_prefix("line-")?;
    let (id, field) = rest.split_once('-')?;
    let id = id.parse().ok()?;
    matches!(field, "location" | "quantity").then_some((id, field))
}

// =============================================================================
// Handlers
// =============================================================================

/// Every catalog item, including those without stock.
///
/// GET /items/edit?q=
#[instrument(skip(state, user, query))]
async fn edit_list(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let pagination = Pagination::new(query.page, state.per_page());
    let page = items::list_catalog(state.pool(), query.search(), pagination).await?;

    Ok(EditListTemplate {
        user,
        flash: query.flash(),
        query: query.search().unwrap_or_default().to_owned(),
        page: with_stock(state.pool(), page).await?,
    })
}

/// Item edit form.
///
/// GET /items/{id}/edit
#[instrument(skip(state, user, query))]
async fn edit_page(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let stock = load_item_stock(state.pool(), ItemId::new(id)).await?;

    Ok(EditItemTemplate {
        user,
        flash: query.into(),
        stock,
        categories: items::distinct_categories(state.pool()).await?,
        conditions: items::distinct_conditions(state.pool()).await?,
        locations: locations::list_all(state.pool()).await?,
    })
}

/// Save item metadata and stock lines.
///
/// POST /items/{id}/edit
#[instrument(skip(state, user, fields), fields(user = %user.username))]
async fn save_edit(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let item_id = ItemId::new(id);
    let form_path = format!("/items/{item_id}/edit");

    let result = match parse_edit_form(item_id, fields) {
        Ok(request) => Ledger::new(state.pool()).edit_item(&user, request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(item) => Ok(redirect_success(
            &format!("/items/{item_id}"),
            &format!("Updated '{}'", item.name),
        )
        .into_response()),
        Err(e) if e.is_missing_item() => Err(e.into()),
        Err(
            e @ (LedgerError::InvalidArgument(_)
            | LedgerError::NotFound { .. }
            | LedgerError::InsufficientStock { .. }),
        ) => Ok(redirect_error(&form_path, &e.to_string()).into_response()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pairs(fields: &[(&str, &str)]) -> Vec<(String, String)> {
        fields
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_parse_line_key() {
        assert_eq!(parse_line_key("line-12-location"), Some((12, "location")));
        assert_eq!(parse_line_key("line-3-quantity"), Some((3, "quantity")));
        assert_eq!(parse_line_key("line-x-quantity"), None);
        assert_eq!(parse_line_key("line-3-colour"), None);
        assert_eq!(parse_line_key("name"), None);
    }

    #[test]
    fn test_parse_edit_form_collects_lines() {
        let request = parse_edit_form(
            ItemId::new(1),
            pairs(&[
                ("name", "Altar Candle"),
                ("category", ""),
                ("condition", "New"),
                ("date_acquired", "2024-02-01"),
                ("price_per_item", ""),
                ("line-4-location", "Sacristy"),
                ("line-4-quantity", "6"),
                ("line-2-location", "Hall"),
                ("line-2-quantity", "0"),
                ("new_location", ""),
                ("new_quantity", ""),
            ]),
        )
        .unwrap();

        assert_eq!(request.details.name, "Altar Candle");
        assert_eq!(request.details.category, "Uncategorized");
        assert!(request.details.date_acquired.is_some());
        assert!(request.new_line.is_none());
        assert_eq!(request.lines.len(), 2);
        assert_eq!(request.lines[0].cell_id, StockCellId::new(2));
        assert_eq!(request.lines[0].quantity, None);
        assert_eq!(request.lines[1].location, "Sacristy");
        assert_eq!(request.lines[1].quantity.map(Quantity::get), Some(6));
    }

    #[test]
    fn test_parse_edit_form_new_line() {
        let request = parse_edit_form(
            ItemId::new(1),
            pairs(&[
                ("name", "Chair"),
                ("new_location", " Hall "),
                ("new_quantity", "3"),
            ]),
        )
        .unwrap();
        assert_eq!(
            request.new_line,
            Some(("Hall".to_owned(), Quantity::new(3).unwrap()))
        );
    }

    #[test]
    fn test_parse_edit_form_rejects_zero_new_line() {
        let result = parse_edit_form(
            ItemId::new(1),
            pairs(&[("name", "Chair"), ("new_location", "Hall"), ("new_quantity", "0")]),
        );
        assert!(matches!(result, Err(LedgerError::InvalidArgument(_))));
    }

    #[test]
    fn test_parse_edit_form_rejects_negative_line() {
        let result = parse_edit_form(
            ItemId::new(1),
            pairs(&[
                ("name", "Chair"),
                ("line-1-location", "Hall"),
                ("line-1-quantity", "-1"),
            ]),
        );
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "quantity cannot be negative");
    }

    #[test]
    fn test_parse_edit_form_rejects_non_numeric_quantity() {
        let result = parse_edit_form(
            ItemId::new(1),
            pairs(&[
                ("name", "Chair"),
                ("line-1-location", "Hall"),
                ("line-1-quantity", "lots"),
            ]),
        );
        assert!(matches!(result, Err(LedgerError::InvalidArgument(_))));
    }
}
