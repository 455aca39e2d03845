//! Integration test support for Stockroom.
//!
//! Every test gets its own in-memory `SQLite` database with the schema
//! applied, so tests run in parallel without any external services.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p stockroom-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `ledger` - Stock operations and their invariants
//! - `import_export` - CSV import atomicity and export formats
//! - `auth` - Login, lockout and registration
//! - `http` - Routes driven through the full router

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::missing_panics_doc)]

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use stockroom_core::{ItemId, LocationName, Quantity, UserId};
use stockroom_server::db::{MIGRATOR, items, stock};
use stockroom_server::models::{CurrentUser, ItemDetails, ItemStock};
use stockroom_server::services::ledger::{AddStock, AddStockOutcome, Ledger};

/// Open a fresh in-memory database with migrations applied.
///
/// The pool holds a single connection that never expires; an in-memory
/// database lives only as long as its connection.
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("valid sqlite url")
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("Failed to open in-memory database");

    MIGRATOR.run(&pool).await.expect("Failed to run migrations");
    pool
}

/// An administrator actor.
#[must_use]
pub fn admin() -> CurrentUser {
    CurrentUser {
        id: UserId::new(1),
        username: "admin".to_owned(),
        is_admin: true,
    }
}

/// A regular (non-admin) actor.
#[must_use]
pub fn clerk() -> CurrentUser {
    CurrentUser {
        id: UserId::new(2),
        username: "clerk".to_owned(),
        is_admin: false,
    }
}

/// Add `quantity` of a named item (empty description) at `location`.
pub async fn add_stock(
    pool: &SqlitePool,
    name: &str,
    location: &str,
    quantity: i64,
) -> AddStockOutcome {
    Ledger::new(pool)
        .add_stock(
            &admin(),
            AddStock {
                details: ItemDetails::named(name),
                location: location.to_owned(),
                quantity: Quantity::new(quantity).expect("positive quantity"),
            },
        )
        .await
        .expect("Failed to add stock")
}

/// Current stock for an item.
pub async fn item_stock(pool: &SqlitePool, item_id: ItemId) -> ItemStock {
    let item = items::get(pool, item_id)
        .await
        .expect("query item")
        .expect("item exists");
    let lines = stock::lines_for_item(pool, item_id)
        .await
        .expect("query stock lines");
    ItemStock { item, lines }
}

/// Quantity held at a named location, zero when there is no cell.
pub async fn quantity_at(pool: &SqlitePool, item_id: ItemId, location: &str) -> i64 {
    let wanted = LocationName::parse(location).expect("valid location");
    item_stock(pool, item_id)
        .await
        .lines
        .iter()
        .find(|line| line.location_name == wanted.as_str())
        .map_or(0, |line| line.quantity)
}

/// Row count of a table.
pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .expect("count rows");
    count
}
