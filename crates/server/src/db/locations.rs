//! Location registry queries.

use sqlx::{Executor, Sqlite, SqliteConnection};
use tracing::{debug, instrument};

use stockroom_core::{LocationId, LocationName};

use super::RepositoryError;
use crate::models::Location;

#[derive(sqlx::FromRow)]
struct LocationRow {
    id: LocationId,
    name: String,
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

/// Get a location by ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get<'e, E>(executor: E, id: LocationId) -> Result<Option<Location>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, LocationRow>("SELECT id, name FROM location WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(Location::from))
}

/// Find a location by its normalized name.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_name<'e, E>(
    executor: E,
    name: &LocationName,
) -> Result<Option<Location>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, LocationRow>("SELECT id, name FROM location WHERE name = ?")
        .bind(name.as_str())
        .fetch_optional(executor)
        .await?;
    Ok(row.map(Location::from))
}

/// Return the location with this normalized name, creating it if absent.
///
/// Runs on the caller's connection so a location created inside a
/// transaction is usable by the following statements.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
#[instrument(skip(conn), fields(name = %name))]
pub async fn get_or_create(
    conn: &mut SqliteConnection,
    name: &LocationName,
) -> Result<Location, RepositoryError> {
    if let Some(existing) = find_by_name(&mut *conn, name).await? {
        return Ok(existing);
    }

    let row = sqlx::query_as::<_, LocationRow>(
        "INSERT INTO location (name) VALUES (?) RETURNING id, name",
    )
    .bind(name.as_str())
    .fetch_one(&mut *conn)
    .await?;

    debug!(location_id = %row.id, "Created location");
    Ok(row.into())
}

/// List every location ordered by name.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_all<'e, E>(executor: E) -> Result<Vec<Location>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, LocationRow>("SELECT id, name FROM location ORDER BY name")
        .fetch_all(executor)
        .await?;
    Ok(rows.into_iter().map(Location::from).collect())
}
