//! Disposal log queries.

use chrono::NaiveDate;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::instrument;

use stockroom_core::{DisposalId, ItemId};

use super::{RepositoryError, contains_pattern};
use crate::models::{Disposal, NewDisposal, Page, Pagination};

const DISPOSAL_SELECT: &str = r"
    SELECT d.id, d.item_id, i.name AS item_name, l.name AS location_name, d.quantity,
           d.reason, d.disposed_date, d.disposed_by, d.notes
    FROM disposed_item d
    JOIN item i ON i.id = d.item_id
    JOIN location l ON l.id = d.location_id
";

const SEARCH_FILTER: &str = r"
    WHERE i.name LIKE ?1 ESCAPE '\'
       OR l.name LIKE ?1 ESCAPE '\'
       OR d.reason LIKE ?1 ESCAPE '\'
";

#[derive(sqlx::FromRow)]
struct DisposalRow {
    id: DisposalId,
    item_id: ItemId,
    item_name: String,
    location_name: String,
    quantity: i64,
    reason: String,
    disposed_date: NaiveDate,
    disposed_by: String,
    notes: String,
}

impl From<DisposalRow> for Disposal {
    fn from(row: DisposalRow) -> Self {
        Self {
            id: row.id,
            item_id: row.item_id,
            item_name: row.item_name,
            location_name: row.location_name,
            quantity: row.quantity,
            reason: row.reason,
            disposed_date: row.disposed_date,
            disposed_by: row.disposed_by,
            notes: row.notes,
        }
    }
}

/// Append a disposal record.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
#[instrument(skip(executor, disposal), fields(item_id = %disposal.item_id, quantity = %disposal.quantity))]
pub async fn insert<'e, E>(executor: E, disposal: &NewDisposal) -> Result<DisposalId, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (id,): (DisposalId,) = sqlx::query_as(
        r"
        INSERT INTO disposed_item
            (item_id, location_id, quantity, reason, disposed_date, disposed_by, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        ",
    )
    .bind(disposal.item_id)
    .bind(disposal.location_id)
    .bind(disposal.quantity.get())
    .bind(&disposal.reason)
    .bind(disposal.disposed_date)
    .bind(&disposal.disposed_by)
    .bind(&disposal.notes)
    .fetch_one(executor)
    .await?;
    Ok(id)
}

/// Disposals newest first, optionally filtered by item name, location name
/// or reason.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
#[instrument(skip(pool))]
pub async fn list(
    pool: &SqlitePool,
    search: Option<&str>,
    pagination: Pagination,
) -> Result<Page<Disposal>, RepositoryError> {
    let pattern = contains_pattern(search.unwrap_or_default());

    let (total,): (i64,) = sqlx::query_as(&format!(
        r"
        SELECT COUNT(*) FROM disposed_item d
        JOIN item i ON i.id = d.item_id
        JOIN location l ON l.id = d.location_id
        {SEARCH_FILTER}
        "
    ))
    .bind(&pattern)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query_as::<_, DisposalRow>(&format!(
        "{DISPOSAL_SELECT} {SEARCH_FILTER} ORDER BY d.disposed_date DESC, d.id DESC LIMIT ?2 OFFSET ?3"
    ))
    .bind(&pattern)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await?;

    Ok(Page::new(
        rows.into_iter().map(Disposal::from).collect(),
        pagination,
        total,
    ))
}

/// Every disposal, newest first. Used by exports.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_all<'e, E>(executor: E) -> Result<Vec<Disposal>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{DISPOSAL_SELECT} ORDER BY d.disposed_date DESC, d.id DESC");
    let rows = sqlx::query_as::<_, DisposalRow>(&sql)
        .fetch_all(executor)
        .await?;
    Ok(rows.into_iter().map(Disposal::from).collect())
}

/// Number of disposals recorded for an item.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn count_for_item<'e, E>(executor: E, item_id: ItemId) -> Result<i64, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM disposed_item WHERE item_id = ?")
        .bind(item_id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}

/// Delete every disposal of an item. Returns the number removed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn delete_for_item<'e, E>(executor: E, item_id: ItemId) -> Result<u64, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM disposed_item WHERE item_id = ?")
        .bind(item_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
