//! Stock transfers between locations.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use stockroom_core::{ItemId, LocationId, Quantity};

use crate::db::{items, locations};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{CurrentUser, Item, ItemStock, Location};
use crate::services::ledger::{Destination, Ledger, LedgerError, Transfer};
use crate::state::AppState;

use super::inventory::load_item_stock;
use super::{Flash, non_empty, redirect_error, redirect_success};

const TRANSFER_PATH: &str = "/transfer";

/// Query parameters for the transfer page.
#[derive(Debug, Default, Deserialize)]
pub struct TransferQuery {
    pub item_id: Option<i64>,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Transfer form data.
///
/// The destination is either an existing location id or a new location
/// name; a non-blank name wins. Ids arrive as text so an empty select
/// reaches the handler instead of failing extraction.
#[derive(Debug, Deserialize)]
pub struct TransferForm {
    pub item_id: Option<String>,
    pub from_location_id: Option<String>,
    pub to_location_id: Option<String>,
    pub new_location: Option<String>,
    pub quantity: String,
    pub responsible_person: Option<String>,
    pub notes: Option<String>,
}

fn required_id(value: Option<String>) -> Result<i64, LedgerError> {
    let value = non_empty(value)
        .ok_or_else(|| LedgerError::InvalidArgument("All fields are required".to_owned()))?;
    value
        .parse()
        .map_err(|_| LedgerError::InvalidArgument(format!("invalid id: '{value}'")))
}

impl TransferForm {
    /// Item id for redirecting back to the form, when one was chosen.
    fn chosen_item(&self) -> Option<i64> {
        self.item_id.as_deref().and_then(|id| id.trim().parse().ok())
    }

    fn into_request(self) -> Result<Transfer, LedgerError> {
        let item_id = required_id(self.item_id)?;
        let from = required_id(self.from_location_id)?;

        let to = if let Some(name) = non_empty(self.new_location) {
            Destination::Named(name)
        } else {
            let id = non_empty(self.to_location_id).ok_or_else(|| {
                LedgerError::InvalidArgument("choose a destination location".to_owned())
            })?;
            let id = id.parse().map_err(|_| {
                LedgerError::InvalidArgument(format!("invalid destination location: '{id}'"))
            })?;
            Destination::Existing(LocationId::new(id))
        };

        Ok(Transfer {
            item_id: ItemId::new(item_id),
            from: LocationId::new(from),
            to,
            quantity: Quantity::parse(&self.quantity)?,
            responsible: self.responsible_person,
            notes: self.notes,
        })
    }
}

/// Transfer form. Without a selected item it lists items to choose from.
#[derive(Template, WebTemplate)]
#[template(path = "transfer.html")]
pub struct TransferTemplate {
    pub user: CurrentUser,
    pub flash: Flash,
    pub items: Vec<Item>,
    pub selected: Option<ItemStock>,
    pub locations: Vec<Location>,
}

/// Build the transfer router.
pub fn router() -> Router<AppState> {
    Router::new().route(TRANSFER_PATH, get(transfer_page).post(transfer))
}

/// Transfer form.
///
/// GET /transfer?item_id=
#[instrument(skip(state, user, query), fields(item_id = ?query.item_id))]
async fn transfer_page(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<TransferQuery>,
) -> Result<impl IntoResponse, AppError> {
    let selected = match query.item_id {
        Some(id) => Some(load_item_stock(state.pool(), ItemId::new(id)).await?),
        None => None,
    };

    Ok(TransferTemplate {
        user,
        flash: Flash {
            error: query.error,
            success: query.success,
        },
        items: items::list_all_in_stock(state.pool()).await?,
        selected,
        locations: locations::list_all(state.pool()).await?,
    })
}

/// Move stock between locations and record the movement.
///
/// POST /transfer
#[instrument(skip(state, user, form), fields(user = %user.username, item_id = ?form.item_id))]
async fn transfer(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<TransferForm>,
) -> Result<Response, AppError> {
    let form_path = match form.chosen_item() {
        Some(id) => format!("{TRANSFER_PATH}?item_id={id}"),
        None => TRANSFER_PATH.to_owned(),
    };

    let result = match form.into_request() {
        Ok(request) => Ledger::new(state.pool()).transfer(&user, request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => Ok(redirect_success(
            &format!("/items/{}", outcome.item.id),
            &format!(
                "Moved {} x '{}' from {} to {}",
                outcome.quantity, outcome.item.name, outcome.from.name, outcome.to.name
            ),
        )
        .into_response()),
        Err(
            e @ (LedgerError::InvalidArgument(_)
            | LedgerError::NotFound { .. }
            | LedgerError::InsufficientStock { .. }),
        ) => Ok(redirect_error(&form_path, &e.to_string()).into_response()),
        Err(e) => Err(e.into()),
    }
}
