//! Movement log queries.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::instrument;

use stockroom_core::{ItemId, MovementId};

use super::{RepositoryError, contains_pattern};
use crate::models::{Movement, NewMovement, Page, Pagination};

const MOVEMENT_SELECT: &str = r"
    SELECT m.id, m.item_id, i.name AS item_name, m.quantity,
           lf.name AS from_location, lt.name AS to_location,
           m.movement_date, m.responsible_person, m.notes
    FROM movement m
    JOIN item i ON i.id = m.item_id
    LEFT JOIN location lf ON lf.id = m.from_location_id
    LEFT JOIN location lt ON lt.id = m.to_location_id
";

const SEARCH_FILTER: &str = r"
    WHERE i.name LIKE ?1 ESCAPE '\'
       OR m.responsible_person LIKE ?1 ESCAPE '\'
       OR lf.name LIKE ?1 ESCAPE '\'
       OR lt.name LIKE ?1 ESCAPE '\'
";

#[derive(sqlx::FromRow)]
struct MovementRow {
    id: MovementId,
    item_id: ItemId,
    item_name: String,
    quantity: i64,
    from_location: Option<String>,
    to_location: Option<String>,
    movement_date: DateTime<Utc>,
    responsible_person: String,
    notes: String,
}

impl From<MovementRow> for Movement {
    fn from(row: MovementRow) -> Self {
        Self {
            id: row.id,
            item_id: row.item_id,
            item_name: row.item_name,
            quantity: row.quantity,
            from_location: row.from_location,
            to_location: row.to_location,
            movement_date: row.movement_date,
            responsible_person: row.responsible_person,
            notes: row.notes,
        }
    }
}

/// Append a movement.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails, including when
/// both locations are absent.
#[instrument(skip(executor, movement), fields(item_id = %movement.item_id, quantity = %movement.quantity))]
pub async fn insert<'e, E>(executor: E, movement: &NewMovement) -> Result<MovementId, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (id,): (MovementId,) = sqlx::query_as(
        r"
        INSERT INTO movement
            (item_id, quantity, from_location_id, to_location_id, movement_date, responsible_person, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        ",
    )
    .bind(movement.item_id)
    .bind(movement.quantity.get())
    .bind(movement.from_location_id)
    .bind(movement.to_location_id)
    .bind(movement.movement_date)
    .bind(&movement.responsible_person)
    .bind(&movement.notes)
    .fetch_one(executor)
    .await?;
    Ok(id)
}

/// Movements newest first, optionally filtered by item name, responsible
/// person or either location name.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
#[instrument(skip(pool))]
pub async fn list(
    pool: &SqlitePool,
    search: Option<&str>,
    pagination: Pagination,
) -> Result<Page<Movement>, RepositoryError> {
    let pattern = contains_pattern(search.unwrap_or_default());

    let (total,): (i64,) = sqlx::query_as(&format!(
        r"
        SELECT COUNT(*) FROM movement m
        JOIN item i ON i.id = m.item_id
        LEFT JOIN location lf ON lf.id = m.from_location_id
        LEFT JOIN location lt ON lt.id = m.to_location_id
        {SEARCH_FILTER}
        "
    ))
    .bind(&pattern)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query_as::<_, MovementRow>(&format!(
        "{MOVEMENT_SELECT} {SEARCH_FILTER} ORDER BY m.movement_date DESC, m.id DESC LIMIT ?2 OFFSET ?3"
    ))
    .bind(&pattern)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await?;

    Ok(Page::new(
        rows.into_iter().map(Movement::from).collect(),
        pagination,
        total,
    ))
}

/// Movements of one item, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_for_item<'e, E>(executor: E, item_id: ItemId) -> Result<Vec<Movement>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, MovementRow>(&format!(
        "{MOVEMENT_SELECT} WHERE m.item_id = ? ORDER BY m.movement_date DESC, m.id DESC"
    ))
    .bind(item_id)
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().map(Movement::from).collect())
}

/// Every movement, newest first. Used by exports.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_all<'e, E>(executor: E) -> Result<Vec<Movement>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{MOVEMENT_SELECT} ORDER BY m.movement_date DESC, m.id DESC");
    let rows = sqlx::query_as::<_, MovementRow>(&sql)
        .fetch_all(executor)
        .await?;
    Ok(rows.into_iter().map(Movement::from).collect())
}

/// Number of movements recorded for an item.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn count_for_item<'e, E>(executor: E, item_id: ItemId) -> Result<i64, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM movement WHERE item_id = ?")
        .bind(item_id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}

/// Delete every movement of an item. Returns the number removed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn delete_for_item<'e, E>(executor: E, item_id: ItemId) -> Result<u64, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM movement WHERE item_id = ?")
        .bind(item_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
