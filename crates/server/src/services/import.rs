//! Bulk CSV import.
//!
//! An upload is parsed against one of three contexts and applied in a single
//! transaction. The first invalid row aborts the import and nothing is
//! committed. Inventory rows add stock; movement and disposal rows only append
//! history and never touch stock cells.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use csv::StringRecord;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::instrument;

use stockroom_core::{LocationName, Quantity, parse_date};

use crate::db::{RepositoryError, disposals, items, locations, movements, stock};
use crate::models::{CurrentUser, Item, ItemDetails, NewDisposal, NewMovement};

const MOVEMENT_PLACEHOLDER: &str = "Auto-created from movement import";
const DISPOSAL_PLACEHOLDER: &str = "Auto-created from disposal import";

/// Errors that can occur while importing a CSV file.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Unknown context name.
    #[error("invalid import context: {0}")]
    InvalidContext(String),

    /// The upload is not UTF-8 text.
    #[error("file is not valid UTF-8")]
    Encoding,

    /// The header row lacks required columns.
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),

    /// The file could not be parsed as CSV.
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A data row was rejected; `row` is 1-based, excluding the header.
    #[error("row {row}: {message}")]
    Row { row: usize, message: String },

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for ImportError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// What an uploaded file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportContext {
    Inventory,
    Movements,
    Disposals,
}

impl ImportContext {
    /// Columns every file of this context must have.
    #[must_use]
    pub const fn required_columns(self) -> &'static [&'static str] {
        match self {
            Self::Inventory => &["Name", "Location", "Quantity"],
            Self::Movements => &["Name", "Quantity", "MovementDate", "ResponsiblePerson"],
            Self::Disposals => &["Name", "Location", "Quantity", "DisposalDate", "Reason"],
        }
    }

    /// Columns read when present.
    #[must_use]
    pub const fn optional_columns(self) -> &'static [&'static str] {
        match self {
            Self::Inventory => &["Description", "Category", "Condition"],
            Self::Movements => &["FromLocation", "ToLocation", "Notes"],
            Self::Disposals => &["Notes"],
        }
    }
}

impl FromStr for ImportContext {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inventory" | "current_inventory" => Ok(Self::Inventory),
            "movements" | "movement_tracker" => Ok(Self::Movements),
            "disposals" | "disposed_items" => Ok(Self::Disposals),
            other => Err(ImportError::InvalidContext(other.to_owned())),
        }
    }
}

impl fmt::Display for ImportContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inventory => "inventory",
            Self::Movements => "movements",
            Self::Disposals => "disposals",
        })
    }
}

/// Result of a committed import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub context: ImportContext,
    pub rows: usize,
    pub items_created: usize,
}

/// Parse and apply an uploaded CSV file.
///
/// # Errors
///
/// Returns `ImportError::MissingColumns` for an incomplete header,
/// `ImportError::Row` for the first invalid row, and `ImportError::Encoding`
/// or `ImportError::Csv` for unreadable input. Nothing is written on error.
#[instrument(skip(pool, actor, data), fields(user = %actor.username, bytes = data.len()))]
pub async fn import_csv(
    pool: &SqlitePool,
    actor: &CurrentUser,
    context: ImportContext,
    data: &[u8],
) -> Result<ImportSummary, ImportError> {
    let text = std::str::from_utf8(data).map_err(|_| ImportError::Encoding)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let columns = Columns::new(reader.headers()?, context)?;

    let mut tx = pool.begin().await?;
    let mut summary = ImportSummary {
        context,
        rows: 0,
        items_created: 0,
    };

    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let row = Row {
            number: index + 1,
            record: &record,
            columns: &columns,
        };
        if row.is_blank() {
            continue;
        }

        let created = match context {
            ImportContext::Inventory => import_inventory_row(&mut tx, &row).await?,
            ImportContext::Movements => import_movement_row(&mut tx, &row).await?,
            ImportContext::Disposals => import_disposal_row(&mut tx, &row, actor).await?,
        };
        summary.rows += 1;
        if created {
            summary.items_created += 1;
        }
    }

    tx.commit().await?;

    tracing::info!(
        context = %context,
        rows = summary.rows,
        items_created = summary.items_created,
        "CSV import committed"
    );
    Ok(summary)
}

// =============================================================================
// Row Access
// =============================================================================

struct Columns {
    index: HashMap<&'static str, usize>,
}

impl Columns {
    fn new(headers: &StringRecord, context: ImportContext) -> Result<Self, ImportError> {
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);

        let missing: Vec<_> = context
            .required_columns()
            .iter()
            .copied()
            .filter(|name| position(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::MissingColumns(missing));
        }

        let index = context
            .required_columns()
            .iter()
            .chain(context.optional_columns())
            .filter_map(|&name| position(name).map(|i| (name, i)))
            .collect();
        Ok(Self { index })
    }
}

struct Row<'r> {
    number: usize,
    record: &'r StringRecord,
    columns: &'r Columns,
}

impl Row<'_> {
    /// Trimmed cell value; empty for absent columns or short rows.
    fn get(&self, column: &str) -> &str {
        self.columns
            .index
            .get(column)
            .and_then(|&i| self.record.get(i))
            .map_or("", str::trim)
    }

    fn is_blank(&self) -> bool {
        self.record.iter().all(|cell| cell.trim().is_empty())
    }

    fn invalid(&self, message: impl fmt::Display) -> ImportError {
        ImportError::Row {
            row: self.number,
            message: message.to_string(),
        }
    }

    fn required(&self, column: &str) -> Result<&str, ImportError> {
        let value = self.get(column);
        if value.is_empty() {
            return Err(self.invalid(format!("{column} is required")));
        }
        Ok(value)
    }

    fn quantity(&self) -> Result<Quantity, ImportError> {
        Quantity::parse(self.get("Quantity"))
            .map_err(|e| self.invalid(format!("invalid quantity '{}': {e}", self.get("Quantity"))))
    }

    fn location(&self, column: &str) -> Result<Option<LocationName>, ImportError> {
        let value = self.get(column);
        if value.is_empty() {
            return Ok(None);
        }
        LocationName::parse(value)
            .map(Some)
            .map_err(|e| self.invalid(e))
    }

    fn date(&self, column: &str) -> Result<NaiveDate, ImportError> {
        parse_date(self.get(column)).map_err(|e| self.invalid(e))
    }
}

// =============================================================================
// Row Handlers
// =============================================================================

/// Resolve an item by name, creating it from `details` when absent.
async fn find_or_create_item(
    conn: &mut SqliteConnection,
    details: ItemDetails,
) -> Result<(Item, bool), ImportError> {
    if let Some(item) = items::find_by_name(&mut *conn, &details.name).await? {
        return Ok((item, false));
    }
    let item = items::insert(&mut *conn, &details).await?;
    tracing::debug!(item_id = %item.id, name = %item.name, "Item created by import");
    Ok((item, true))
}

async fn import_inventory_row(
    conn: &mut SqliteConnection,
    row: &Row<'_>,
) -> Result<bool, ImportError> {
    let name = row.required("Name")?;
    let location = row
        .location("Location")?
        .ok_or_else(|| row.invalid("Location is required"))?;
    let quantity = row.quantity()?;

    let details = ItemDetails::named(name)
        .with_description(row.get("Description"))
        .with_category(row.get("Category"))
        .with_condition(row.get("Condition"));
    let (item, created) = find_or_create_item(conn, details).await?;

    let location = locations::get_or_create(conn, &location).await?;
    stock::increment(conn, item.id, location.id, quantity).await?;
    Ok(created)
}

async fn import_movement_row(
    conn: &mut SqliteConnection,
    row: &Row<'_>,
) -> Result<bool, ImportError> {
    let name = row.required("Name")?;
    let quantity = row.quantity()?;
    let date = row.date("MovementDate")?;
    let responsible = row.required("ResponsiblePerson")?;
    let from = row.location("FromLocation")?;
    let to = row.location("ToLocation")?;
    if from.is_none() && to.is_none() {
        return Err(row.invalid(
            "must specify at least one location (FromLocation or ToLocation)",
        ));
    }

    let details = ItemDetails::named(name).with_description(MOVEMENT_PLACEHOLDER);
    let (item, created) = find_or_create_item(conn, details).await?;

    let from_location_id = match from {
        Some(name) => Some(locations::get_or_create(conn, &name).await?.id),
        None => None,
    };
    let to_location_id = match to {
        Some(name) => Some(locations::get_or_create(conn, &name).await?.id),
        None => None,
    };

    movements::insert(
        &mut *conn,
        &NewMovement {
            item_id: item.id,
            quantity,
            from_location_id,
            to_location_id,
            movement_date: date.and_time(NaiveTime::MIN).and_utc(),
            responsible_person: responsible.to_owned(),
            notes: row.get("Notes").to_owned(),
        },
    )
    .await?;
    Ok(created)
}

async fn import_disposal_row(
    conn: &mut SqliteConnection,
    row: &Row<'_>,
    actor: &CurrentUser,
) -> Result<bool, ImportError> {
    let name = row.required("Name")?;
    let location = row
        .location("Location")?
        .ok_or_else(|| row.invalid("Location is required"))?;
    let quantity = row.quantity()?;
    let date = row.date("DisposalDate")?;
    let reason = row.required("Reason")?;

    let details = ItemDetails::named(name).with_description(DISPOSAL_PLACEHOLDER);
    let (item, created) = find_or_create_item(conn, details).await?;
    let location = locations::get_or_create(conn, &location).await?;

    disposals::insert(
        &mut *conn,
        &NewDisposal {
            item_id: item.id,
            location_id: location.id,
            quantity,
            reason: reason.to_owned(),
            disposed_date: date,
            disposed_by: actor.username.clone(),
            notes: row.get("Notes").to_owned(),
        },
    )
    .await?;
    Ok(created)
}
