//! Item catalog queries.

use chrono::NaiveDate;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::instrument;

use stockroom_core::{ItemId, UnitPrice};

use super::{RepositoryError, contains_pattern};
use crate::models::{Item, ItemDetails, Page, Pagination};

const ITEM_COLUMNS: &str =
    "item.id, item.name, item.description, item.category, item.condition, item.date_acquired, item.price_per_item";

// =============================================================================
// Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
pub(super) struct ItemRow {
    id: ItemId,
    name: String,
    description: String,
    category: String,
    condition: String,
    date_acquired: Option<NaiveDate>,
    price_per_item: Option<String>,
}

impl TryFrom<ItemRow> for Item {
    type Error = RepositoryError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let price_per_item = row
            .price_per_item
            .as_deref()
            .map(UnitPrice::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!(
                    "invalid price for item {}: {e}",
                    row.id
                ))
            })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            category: row.category,
            condition: row.condition,
            date_acquired: row.date_acquired,
            price_per_item,
        })
    }
}

fn into_items(rows: Vec<ItemRow>) -> Result<Vec<Item>, RepositoryError> {
    rows.into_iter().map(Item::try_from).collect()
}

// =============================================================================
// Lookups
// =============================================================================

/// Get an item by ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
/// Returns `RepositoryError::DataCorruption` if the stored price is invalid.
pub async fn get<'e, E>(executor: E, id: ItemId) -> Result<Option<Item>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, ItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM item WHERE item.id = ?"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;
    row.map(Item::try_from).transpose()
}

/// Find an item by exact name and description.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_name_and_description<'e, E>(
    executor: E,
    name: &str,
    description: &str,
) -> Result<Option<Item>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, ItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM item WHERE item.name = ? AND item.description = ? ORDER BY item.id LIMIT 1"
    ))
    .bind(name)
    .bind(description)
    .fetch_optional(executor)
    .await?;
    row.map(Item::try_from).transpose()
}

/// Find the oldest item with this exact name.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_name<'e, E>(executor: E, name: &str) -> Result<Option<Item>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, ItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM item WHERE item.name = ? ORDER BY item.id LIMIT 1"
    ))
    .bind(name)
    .fetch_optional(executor)
    .await?;
    row.map(Item::try_from).transpose()
}

// =============================================================================
// Mutations
// =============================================================================

/// Insert a new item.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
#[instrument(skip(executor, details), fields(name = %details.name))]
pub async fn insert<'e, E>(executor: E, details: &ItemDetails) -> Result<Item, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, ItemRow>(
        r"
        INSERT INTO item (name, description, category, condition, date_acquired, price_per_item)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id, name, description, category, condition, date_acquired, price_per_item
        ",
    )
    .bind(&details.name)
    .bind(&details.description)
    .bind(&details.category)
    .bind(&details.condition)
    .bind(details.date_acquired)
    .bind(details.price_per_item.map(|p| p.amount().to_string()))
    .fetch_one(executor)
    .await?;
    Item::try_from(row)
}

/// Overwrite an item's metadata.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if no item has this ID.
pub async fn update<'e, E>(
    executor: E,
    id: ItemId,
    details: &ItemDetails,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r"
        UPDATE item
        SET name = ?, description = ?, category = ?, condition = ?,
            date_acquired = ?, price_per_item = ?
        WHERE id = ?
        ",
    )
    .bind(&details.name)
    .bind(&details.description)
    .bind(&details.category)
    .bind(&details.condition)
    .bind(details.date_acquired)
    .bind(details.price_per_item.map(|p| p.amount().to_string()))
    .bind(id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Delete an item row. Dependent rows must already be gone.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if no item has this ID.
pub async fn delete<'e, E>(executor: E, id: ItemId) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM item WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

// =============================================================================
// Listings
// =============================================================================

/// Items holding stock somewhere, optionally filtered by name or description.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
#[instrument(skip(pool))]
pub async fn list_in_stock(
    pool: &SqlitePool,
    search: Option<&str>,
    pagination: Pagination,
) -> Result<Page<Item>, RepositoryError> {
    const FILTER: &str = r"
        WHERE EXISTS (SELECT 1 FROM stock_cell s WHERE s.item_id = item.id)
          AND (item.name LIKE ?1 ESCAPE '\' OR item.description LIKE ?1 ESCAPE '\')
    ";
    let pattern = contains_pattern(search.unwrap_or_default());

    let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM item {FILTER}"))
        .bind(&pattern)
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query_as::<_, ItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM item {FILTER} ORDER BY item.name, item.id LIMIT ?2 OFFSET ?3"
    ))
    .bind(&pattern)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await?;

    Ok(Page::new(into_items(rows)?, pagination, total))
}

/// Every item, with or without stock, filtered by name, description,
/// category or condition.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
#[instrument(skip(pool))]
pub async fn list_catalog(
    pool: &SqlitePool,
    search: Option<&str>,
    pagination: Pagination,
) -> Result<Page<Item>, RepositoryError> {
    const FILTER: &str = r"
        WHERE item.name LIKE ?1 ESCAPE '\'
           OR item.description LIKE ?1 ESCAPE '\'
           OR item.category LIKE ?1 ESCAPE '\'
           OR item.condition LIKE ?1 ESCAPE '\'
    ";
    let pattern = contains_pattern(search.unwrap_or_default());

    let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM item {FILTER}"))
        .bind(&pattern)
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query_as::<_, ItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM item {FILTER} ORDER BY item.name, item.id LIMIT ?2 OFFSET ?3"
    ))
    .bind(&pattern)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await?;

    Ok(Page::new(into_items(rows)?, pagination, total))
}

/// Every item that holds stock, ordered by name. Used for select lists.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_all_in_stock<'e, E>(executor: E) -> Result<Vec<Item>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, ItemRow>(&format!(
        r"
        SELECT {ITEM_COLUMNS} FROM item
        WHERE EXISTS (SELECT 1 FROM stock_cell s WHERE s.item_id = item.id)
        ORDER BY item.name, item.id
        "
    ))
    .fetch_all(executor)
    .await?;
    into_items(rows)
}

/// Every item, ordered by ID. Used by exports.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_all<'e, E>(executor: E) -> Result<Vec<Item>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, ItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM item ORDER BY item.id"
    ))
    .fetch_all(executor)
    .await?;
    into_items(rows)
}

/// Distinct categories in use, for form suggestions.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn distinct_categories<'e, E>(executor: E) -> Result<Vec<String>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT DISTINCT category FROM item ORDER BY category")
            .fetch_all(executor)
            .await?;
    Ok(rows.into_iter().map(|(c,)| c).collect())
}

/// Distinct conditions in use, for form suggestions.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn distinct_conditions<'e, E>(executor: E) -> Result<Vec<String>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT DISTINCT condition FROM item ORDER BY condition")
            .fetch_all(executor)
            .await?;
    Ok(rows.into_iter().map(|(c,)| c).collect())
}
