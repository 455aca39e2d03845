//! Stock cell queries.
//!
//! A cell holds the positive quantity of one item at one location. Cells are
//! deleted rather than set to zero, and the schema rejects non-positive
//! quantities.

use std::collections::HashMap;

use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection};
use tracing::instrument;

use stockroom_core::{ItemId, LocationId, Quantity, StockCellId};

use super::RepositoryError;
use super::items::ItemRow;
use crate::models::{Item, LocationStockLine, StockCell, StockLine};

// =============================================================================
// Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct StockCellRow {
    id: StockCellId,
    item_id: ItemId,
    location_id: LocationId,
    quantity: i64,
}

impl From<StockCellRow> for StockCell {
    fn from(row: StockCellRow) -> Self {
        Self {
            id: row.id,
            item_id: row.item_id,
            location_id: row.location_id,
            quantity: row.quantity,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LocationLineRow {
    #[sqlx(flatten)]
    item: ItemRow,
    quantity: i64,
}

#[derive(sqlx::FromRow)]
struct StockLineRow {
    cell_id: StockCellId,
    item_id: ItemId,
    location_id: LocationId,
    location_name: String,
    quantity: i64,
}

impl From<StockLineRow> for StockLine {
    fn from(row: StockLineRow) -> Self {
        Self {
            cell_id: row.cell_id,
            item_id: row.item_id,
            location_id: row.location_id,
            location_name: row.location_name,
            quantity: row.quantity,
        }
    }
}

/// Outcome of removing quantity from a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decrement {
    /// The cell still holds stock.
    Reduced,
    /// The cell reached zero and was deleted.
    Emptied,
    /// The cell is missing or holds less than requested; nothing changed.
    Insufficient {
        /// Quantity currently held (0 when the cell is missing).
        available: i64,
    },
}

/// Outcome of adding quantity at a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Increment {
    /// An existing cell was incremented.
    Incremented(StockCell),
    /// A new cell was opened.
    Opened(StockCell),
}

impl Increment {
    /// The resulting cell.
    #[must_use]
    pub const fn cell(&self) -> &StockCell {
        match self {
            Self::Incremented(cell) | Self::Opened(cell) => cell,
        }
    }
}

// =============================================================================
// Lookups
// =============================================================================

/// Find the cell for an (item, location) pair.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_cell<'e, E>(
    executor: E,
    item_id: ItemId,
    location_id: LocationId,
) -> Result<Option<StockCell>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, StockCellRow>(
        "SELECT id, item_id, location_id, quantity FROM stock_cell WHERE item_id = ? AND location_id = ?",
    )
    .bind(item_id)
    .bind(location_id)
    .fetch_optional(executor)
    .await?;
    Ok(row.map(StockCell::from))
}

/// All cells owned by an item.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn cells_for_item<'e, E>(
    executor: E,
    item_id: ItemId,
) -> Result<Vec<StockCell>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, StockCellRow>(
        "SELECT id, item_id, location_id, quantity FROM stock_cell WHERE item_id = ? ORDER BY id",
    )
    .bind(item_id)
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().map(StockCell::from).collect())
}

/// Stock lines (with location names) for one item, ordered by location name.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lines_for_item<'e, E>(
    executor: E,
    item_id: ItemId,
) -> Result<Vec<StockLine>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, StockLineRow>(
        r"
        SELECT s.id AS cell_id, s.item_id, s.location_id, l.name AS location_name, s.quantity
        FROM stock_cell s
        JOIN location l ON l.id = s.location_id
        WHERE s.item_id = ?
        ORDER BY l.name
        ",
    )
    .bind(item_id)
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().map(StockLine::from).collect())
}

/// Batch-load stock lines for a set of items in one query.
///
/// Items without stock are absent from the map.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
#[instrument(skip(executor, item_ids), fields(count = item_ids.len()))]
pub async fn lines_for_items<'e, E>(
    executor: E,
    item_ids: &[ItemId],
) -> Result<HashMap<ItemId, Vec<StockLine>>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    if item_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut builder = QueryBuilder::<Sqlite>::new(
        r"
        SELECT s.id AS cell_id, s.item_id, s.location_id, l.name AS location_name, s.quantity
        FROM stock_cell s
        JOIN location l ON l.id = s.location_id
        WHERE s.item_id IN (",
    );
    let mut separated = builder.separated(", ");
    for id in item_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY s.item_id, l.name");

    let rows = builder
        .build_query_as::<StockLineRow>()
        .fetch_all(executor)
        .await?;

    let mut lines: HashMap<ItemId, Vec<StockLine>> = HashMap::new();
    for row in rows {
        lines.entry(row.item_id).or_default().push(row.into());
    }
    Ok(lines)
}

/// Stock held at one location, joined with item details, ordered by item name.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lines_for_location<'e, E>(
    executor: E,
    location_id: LocationId,
) -> Result<Vec<LocationStockLine>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, LocationLineRow>(
        r"
        SELECT i.id, i.name, i.description, i.category, i.condition,
               i.date_acquired, i.price_per_item, s.quantity
        FROM stock_cell s
        JOIN item i ON i.id = s.item_id
        WHERE s.location_id = ?
        ORDER BY i.name, i.id
        ",
    )
    .bind(location_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(LocationStockLine {
                item: Item::try_from(row.item)?,
                quantity: row.quantity,
            })
        })
        .collect()
}

/// Every stock line, ordered by item ID then location name. Used by exports.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn all_lines<'e, E>(executor: E) -> Result<Vec<StockLine>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, StockLineRow>(
        r"
        SELECT s.id AS cell_id, s.item_id, s.location_id, l.name AS location_name, s.quantity
        FROM stock_cell s
        JOIN location l ON l.id = s.location_id
        ORDER BY s.item_id, l.name
        ",
    )
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().map(StockLine::from).collect())
}

// =============================================================================
// Mutations
// =============================================================================

/// Add quantity to an (item, location) cell, opening the cell if absent.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
#[instrument(skip(conn))]
pub async fn increment(
    conn: &mut SqliteConnection,
    item_id: ItemId,
    location_id: LocationId,
    quantity: Quantity,
) -> Result<Increment, RepositoryError> {
    if let Some(existing) = find_cell(&mut *conn, item_id, location_id).await? {
        let row = sqlx::query_as::<_, StockCellRow>(
            "UPDATE stock_cell SET quantity = quantity + ? WHERE id = ? RETURNING id, item_id, location_id, quantity",
        )
        .bind(quantity.get())
        .bind(existing.id)
        .fetch_one(&mut *conn)
        .await?;
        return Ok(Increment::Incremented(row.into()));
    }

    let cell = insert(&mut *conn, item_id, location_id, quantity).await?;
    Ok(Increment::Opened(cell))
}

/// Remove quantity from an (item, location) cell.
///
/// The cell is deleted when it reaches exactly zero. When it holds less than
/// requested, or is missing, nothing changes and
/// [`Decrement::Insufficient`] reports what is available. Both writes are
/// conditional on the current quantity, so a concurrent drain cannot drive a
/// cell negative.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
#[instrument(skip(conn))]
pub async fn decrement(
    conn: &mut SqliteConnection,
    item_id: ItemId,
    location_id: LocationId,
    quantity: Quantity,
) -> Result<Decrement, RepositoryError> {
    let deleted = sqlx::query(
        "DELETE FROM stock_cell WHERE item_id = ? AND location_id = ? AND quantity = ?",
    )
    .bind(item_id)
    .bind(location_id)
    .bind(quantity.get())
    .execute(&mut *conn)
    .await?;
    if deleted.rows_affected() > 0 {
        return Ok(Decrement::Emptied);
    }

    let updated = sqlx::query(
        "UPDATE stock_cell SET quantity = quantity - ? WHERE item_id = ? AND location_id = ? AND quantity > ?",
    )
    .bind(quantity.get())
    .bind(item_id)
    .bind(location_id)
    .bind(quantity.get())
    .execute(&mut *conn)
    .await?;
    if updated.rows_affected() > 0 {
        return Ok(Decrement::Reduced);
    }

    let available = find_cell(&mut *conn, item_id, location_id)
        .await?
        .map_or(0, |cell| cell.quantity);
    Ok(Decrement::Insufficient { available })
}

/// Open a new cell.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the item already has a cell at the
/// location.
pub async fn insert<'e, E>(
    executor: E,
    item_id: ItemId,
    location_id: LocationId,
    quantity: Quantity,
) -> Result<StockCell, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, StockCellRow>(
        r"
        INSERT INTO stock_cell (item_id, location_id, quantity)
        VALUES (?, ?, ?)
        RETURNING id, item_id, location_id, quantity
        ",
    )
    .bind(item_id)
    .bind(location_id)
    .bind(quantity.get())
    .fetch_one(executor)
    .await
    .map_err(|e| RepositoryError::from_unique(e, "stock cell"))?;
    Ok(row.into())
}

/// Set a cell's location and quantity in one statement.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the item already has a cell at the
/// target location, `RepositoryError::NotFound` if the cell is gone.
pub async fn update_cell<'e, E>(
    executor: E,
    id: StockCellId,
    location_id: LocationId,
    quantity: Quantity,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE stock_cell SET location_id = ?, quantity = ? WHERE id = ?")
        .bind(location_id)
        .bind(quantity.get())
        .bind(id)
        .execute(executor)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "stock cell"))?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Delete one cell.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn delete_cell<'e, E>(executor: E, id: StockCellId) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("DELETE FROM stock_cell WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Delete every cell owned by an item. Returns the number removed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn delete_for_item<'e, E>(executor: E, item_id: ItemId) -> Result<u64, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM stock_cell WHERE item_id = ?")
        .bind(item_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
