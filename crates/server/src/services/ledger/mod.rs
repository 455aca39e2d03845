//! Stock ledger service.
//!
//! Every mutation of stock quantities goes through [`Ledger`]. Each operation
//! runs in one transaction: it reads the current cells, validates, writes
//! cells and history rows, and commits. Any error drops the transaction,
//! which rolls it back.
//!
//! The acting user is passed explicitly to every operation. It stamps
//! movement and disposal records and gates the admin-only operations.

mod error;
pub mod plan;

pub use error::{LedgerError, NotFoundKind};

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::instrument;

use stockroom_core::{
    DisposalId, ItemId, LocationId, LocationName, MovementId, Quantity, StockCellId,
};

use crate::db::stock::{Decrement, Increment};
use crate::db::{disposals, items, locations, movements, stock};
use crate::models::{CurrentUser, Item, ItemDetails, Location, NewDisposal, NewMovement, StockCell};
use plan::{CellOp, ResolvedLine};

// =============================================================================
// Inputs and Outcomes
// =============================================================================

/// Request to add stock of an item at a location.
#[derive(Debug, Clone)]
pub struct AddStock {
    /// Item metadata; name and description identify an existing item.
    pub details: ItemDetails,
    /// Location name, normalized before lookup.
    pub location: String,
    pub quantity: Quantity,
}

/// What [`Ledger::add_stock`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddStockKind {
    /// The item did not exist and was created.
    NewItem,
    /// The item already had stock at the location.
    AddedToExisting,
    /// The item existed but not at this location.
    NewLocation,
}

/// Result of [`Ledger::add_stock`].
#[derive(Debug, Clone)]
pub struct AddStockOutcome {
    pub kind: AddStockKind,
    pub item: Item,
    pub location: Location,
    pub cell: StockCell,
}

impl AddStockOutcome {
    /// User-facing summary.
    #[must_use]
    pub fn message(&self) -> String {
        match self.kind {
            AddStockKind::NewItem => format!(
                "Added new item '{}' with {} at {}",
                self.item.name, self.cell.quantity, self.location.name
            ),
            AddStockKind::AddedToExisting => format!(
                "Added to existing stock of '{}' at {} (now {})",
                self.item.name, self.location.name, self.cell.quantity
            ),
            AddStockKind::NewLocation => format!(
                "Added '{}' to new location {} with {}",
                self.item.name, self.location.name, self.cell.quantity
            ),
        }
    }
}

/// Where transferred stock goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A known location.
    Existing(LocationId),
    /// A location name, created if absent.
    Named(String),
}

/// Request to move stock between two locations.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub item_id: ItemId,
    pub from: LocationId,
    pub to: Destination,
    pub quantity: Quantity,
    /// Defaults to the acting user's username.
    pub responsible: Option<String>,
    pub notes: Option<String>,
}

/// Result of [`Ledger::transfer`].
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub movement_id: MovementId,
    pub item: Item,
    pub from: Location,
    pub to: Location,
    pub quantity: Quantity,
}

/// Request to remove stock from a location.
#[derive(Debug, Clone)]
pub struct Dispose {
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub quantity: Quantity,
    pub reason: String,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

/// Result of [`Ledger::dispose`].
#[derive(Debug, Clone)]
pub struct DisposeOutcome {
    pub disposal_id: DisposalId,
    pub item: Item,
    pub location: Location,
    pub quantity: Quantity,
}

/// One submitted stock line of an edit.
#[derive(Debug, Clone)]
pub struct LineEdit {
    pub cell_id: StockCellId,
    /// Target location name; renaming moves or merges the line.
    pub location: String,
    /// `None` removes the line.
    pub quantity: Option<Quantity>,
}

/// Request to edit an item's metadata and stock lines together.
#[derive(Debug, Clone)]
pub struct EditItem {
    pub item_id: ItemId,
    pub details: ItemDetails,
    pub lines: Vec<LineEdit>,
    /// Extra (location, quantity) line, merged into an existing cell if present.
    pub new_line: Option<(String, Quantity)>,
}

/// Counts of what [`Ledger::delete_item`] removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedItem {
    pub name: String,
    pub stock_cells: u64,
    pub movements: u64,
    pub disposals: u64,
}

// =============================================================================
// Ledger
// =============================================================================

/// Transactional stock operations.
pub struct Ledger<'a> {
    pool: &'a SqlitePool,
}

impl<'a> Ledger<'a> {
    /// Create a ledger over a connection pool.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Add stock, creating the item and location as needed.
    ///
    /// The item is matched by exact name and description.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty item name or location
    /// - `Repository` if the database fails
    #[instrument(skip(self, actor, request), fields(user = %actor.username, item = %request.details.name))]
    pub async fn add_stock(
        &self,
        actor: &CurrentUser,
        request: AddStock,
    ) -> Result<AddStockOutcome, LedgerError> {
        let details = normalize_details(request.details)?;
        let location_name = LocationName::parse(&request.location)?;

        let mut tx = self.pool.begin().await?;

        let location = locations::get_or_create(&mut tx, &location_name).await?;
        let existing =
            items::find_by_name_and_description(&mut *tx, &details.name, &details.description)
                .await?;

        let (item, created) = match existing {
            Some(item) => (item, false),
            None => (items::insert(&mut *tx, &details).await?, true),
        };

        let increment = stock::increment(&mut tx, item.id, location.id, request.quantity).await?;
        tx.commit().await?;

        let kind = match (created, increment) {
            (true, _) => AddStockKind::NewItem,
            (false, Increment::Incremented(_)) => AddStockKind::AddedToExisting,
            (false, Increment::Opened(_)) => AddStockKind::NewLocation,
        };

        tracing::info!(
            item_id = %item.id,
            location = %location.name,
            quantity = %request.quantity,
            kind = ?kind,
            "Stock added"
        );

        Ok(AddStockOutcome {
            kind,
            cell: *increment.cell(),
            item,
            location,
        })
    }

    /// Move stock from one location to another and record the movement.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the item or a referenced location does not exist
    /// - `InvalidArgument` if source and destination are the same location
    /// - `InsufficientStock` if the source holds less than requested
    #[instrument(skip(self, actor, request), fields(user = %actor.username, item_id = %request.item_id))]
    pub async fn transfer(
        &self,
        actor: &CurrentUser,
        request: Transfer,
    ) -> Result<TransferOutcome, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let item = require_item(&mut tx, request.item_id).await?;
        let from = require_location(&mut tx, request.from).await?;
        let to = match &request.to {
            Destination::Existing(id) => require_location(&mut tx, *id).await?,
            Destination::Named(name) => {
                let name = LocationName::parse(name)?;
                locations::get_or_create(&mut tx, &name).await?
            }
        };

        if from.id == to.id {
            return Err(LedgerError::InvalidArgument(
                "source and destination locations must differ".to_owned(),
            ));
        }

        take_stock(&mut tx, item.id, from.id, request.quantity).await?;
        stock::increment(&mut tx, item.id, to.id, request.quantity).await?;

        let responsible = non_empty(request.responsible).unwrap_or_else(|| actor.username.clone());
        let movement_id = movements::insert(
            &mut *tx,
            &NewMovement {
                item_id: item.id,
                quantity: request.quantity,
                from_location_id: Some(from.id),
                to_location_id: Some(to.id),
                movement_date: Utc::now(),
                responsible_person: responsible,
                notes: non_empty(request.notes).unwrap_or_default(),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            item_id = %item.id,
            from = %from.name,
            to = %to.name,
            quantity = %request.quantity,
            "Stock transferred"
        );

        Ok(TransferOutcome {
            movement_id,
            item,
            from,
            to,
            quantity: request.quantity,
        })
    }

    /// Remove stock from a location and record the disposal.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty reason
    /// - `NotFound` if the item or location does not exist
    /// - `InsufficientStock` if the location holds less than requested
    #[instrument(skip(self, actor, request), fields(user = %actor.username, item_id = %request.item_id))]
    pub async fn dispose(
        &self,
        actor: &CurrentUser,
        request: Dispose,
    ) -> Result<DisposeOutcome, LedgerError> {
        let reason = request.reason.trim().to_owned();
        if reason.is_empty() {
            return Err(LedgerError::InvalidArgument(
                "a reason for disposal is required".to_owned(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let item = require_item(&mut tx, request.item_id).await?;
        let location = require_location(&mut tx, request.location_id).await?;

        take_stock(&mut tx, item.id, location.id, request.quantity).await?;

        let disposal_id = disposals::insert(
            &mut *tx,
            &NewDisposal {
                item_id: item.id,
                location_id: location.id,
                quantity: request.quantity,
                reason,
                disposed_date: request.date,
                disposed_by: actor.username.clone(),
                notes: non_empty(request.notes).unwrap_or_default(),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            item_id = %item.id,
            location = %location.name,
            quantity = %request.quantity,
            "Stock disposed"
        );

        Ok(DisposeOutcome {
            disposal_id,
            item,
            location,
            quantity: request.quantity,
        })
    }

    /// Update an item's metadata and stock lines in one transaction.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the actor is an admin
    /// - `NotFound` if the item does not exist or a line is not the item's
    /// - `InvalidArgument` for an empty name or location, a line submitted
    ///   twice, or lines whose combined quantity at a location overflows
    #[instrument(skip(self, actor, request), fields(user = %actor.username, item_id = %request.item_id))]
    pub async fn edit_item(
        &self,
        actor: &CurrentUser,
        request: EditItem,
    ) -> Result<Item, LedgerError> {
        require_admin(actor, "edit items")?;

        let details = normalize_details(request.details)?;
        let new_line = request
            .new_line
            .filter(|(name, _)| !name.trim().is_empty())
            .map(|(name, quantity)| {
                Ok::<_, LedgerError>((LocationName::parse(&name)?, quantity))
            })
            .transpose()?;

        let mut tx = self.pool.begin().await?;

        require_item(&mut tx, request.item_id).await?;
        let cells = stock::cells_for_item(&mut *tx, request.item_id).await?;

        let submitted: Vec<_> = request.lines.iter().map(|l| l.cell_id).collect();
        plan::validate_lines(&cells, &submitted)?;

        let mut resolved = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let Some(cell) = cells.iter().find(|c| c.id == line.cell_id) else {
                return Err(LedgerError::not_found(
                    NotFoundKind::StockLine,
                    line.cell_id.as_i64(),
                ));
            };
            // Removed lines keep their location; the submitted name is ignored
            let location_id = match line.quantity {
                None => cell.location_id,
                Some(_) => {
                    let name = LocationName::parse(&line.location)?;
                    locations::get_or_create(&mut tx, &name).await?.id
                }
            };
            resolved.push(ResolvedLine {
                cell_id: line.cell_id,
                location_id,
                quantity: line.quantity,
            });
        }

        let new_line = match new_line {
            Some((name, quantity)) => {
                Some((locations::get_or_create(&mut tx, &name).await?.id, quantity))
            }
            None => None,
        };

        let desired = plan::desired_quantities(&cells, &resolved, new_line)?;
        let ops = plan::reconcile(&cells, &desired);
        apply_ops(&mut tx, request.item_id, &ops).await?;

        items::update(&mut *tx, request.item_id, &details).await?;
        let item = require_item(&mut tx, request.item_id).await?;

        tx.commit().await?;

        tracing::info!(item_id = %item.id, writes = ops.len(), "Item edited");
        Ok(item)
    }

    /// Delete an item with all of its stock, movements and disposals.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the actor is an admin
    /// - `InvalidArgument` without confirmation
    /// - `NotFound` if the item does not exist
    #[instrument(skip(self, actor), fields(user = %actor.username))]
    pub async fn delete_item(
        &self,
        actor: &CurrentUser,
        item_id: ItemId,
        confirmed: bool,
    ) -> Result<DeletedItem, LedgerError> {
        require_admin(actor, "delete items")?;
        if !confirmed {
            return Err(LedgerError::InvalidArgument(
                "deletion must be confirmed".to_owned(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let item = require_item(&mut tx, item_id).await?;
        let disposals = disposals::delete_for_item(&mut *tx, item_id).await?;
        let movements = movements::delete_for_item(&mut *tx, item_id).await?;
        let stock_cells = stock::delete_for_item(&mut *tx, item_id).await?;
        items::delete(&mut *tx, item_id).await?;

        tx.commit().await?;

        tracing::warn!(
            item_id = %item_id,
            name = %item.name,
            stock_cells,
            movements,
            disposals,
            "Item deleted"
        );

        Ok(DeletedItem {
            name: item.name,
            stock_cells,
            movements,
            disposals,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn require_admin(actor: &CurrentUser, action: &str) -> Result<(), LedgerError> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(LedgerError::Forbidden(format!(
            "only administrators can {action}"
        )))
    }
}

fn normalize_details(mut details: ItemDetails) -> Result<ItemDetails, LedgerError> {
    details.name = details.name.trim().to_owned();
    if details.name.is_empty() {
        return Err(LedgerError::InvalidArgument(
            "item name is required".to_owned(),
        ));
    }
    details.description = details.description.trim().to_owned();
    Ok(details)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

async fn require_item(conn: &mut SqliteConnection, id: ItemId) -> Result<Item, LedgerError> {
    items::get(&mut *conn, id)
        .await?
        .ok_or_else(|| LedgerError::not_found(NotFoundKind::Item, id.as_i64()))
}

async fn require_location(
    conn: &mut SqliteConnection,
    id: LocationId,
) -> Result<Location, LedgerError> {
    locations::get(&mut *conn, id)
        .await?
        .ok_or_else(|| LedgerError::not_found(NotFoundKind::Location, id.as_i64()))
}

async fn take_stock(
    conn: &mut SqliteConnection,
    item_id: ItemId,
    location_id: LocationId,
    quantity: Quantity,
) -> Result<(), LedgerError> {
    match stock::decrement(conn, item_id, location_id, quantity).await? {
        Decrement::Reduced | Decrement::Emptied => Ok(()),
        Decrement::Insufficient { available } => Err(LedgerError::InsufficientStock {
            requested: quantity.get(),
            available,
        }),
    }
}

async fn apply_ops(
    conn: &mut SqliteConnection,
    item_id: ItemId,
    ops: &[CellOp],
) -> Result<(), LedgerError> {
    for op in ops {
        match *op {
            CellOp::Delete { cell_id } => stock::delete_cell(&mut *conn, cell_id).await?,
            CellOp::Update {
                cell_id,
                location_id,
                quantity,
            } => stock::update_cell(&mut *conn, cell_id, location_id, quantity).await?,
            CellOp::Insert {
                location_id,
                quantity,
            } => {
                stock::insert(&mut *conn, item_id, location_id, quantity).await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stockroom_core::UserId;

    use super::*;

    fn user(is_admin: bool) -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            username: "clerk".to_owned(),
            is_admin,
        }
    }

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&user(true), "edit items").is_ok());
        let err = require_admin(&user(false), "edit items").unwrap_err();
        assert_eq!(err.to_string(), "only administrators can edit items");
    }

    #[test]
    fn test_normalize_details_rejects_blank_name() {
        let err = normalize_details(ItemDetails::named("   ")).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidArgument(_)));

        let details =
            normalize_details(ItemDetails::named(" Candle ").with_description(" tall ")).unwrap();
        assert_eq!(details.name, "Candle");
        assert_eq!(details.description, "tall");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  ".to_owned())), None);
        assert_eq!(non_empty(Some(" Ann ".to_owned())), Some("Ann".to_owned()));
        assert_eq!(non_empty(None), None);
    }
}
