//! CSV export and import templates.
//!
//! Single downloads are UTF-8 CSV with a byte-order mark so spreadsheet tools
//! detect the encoding. `all` bundles the three files into a deflated zip.

use std::collections::HashMap;
use std::fmt;
use std::io::{Cursor, Write};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::instrument;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use stockroom_core::{DATE_FORMAT, ItemId};

use crate::db::{RepositoryError, disposals, items, movements, stock};
use crate::models::StockLine;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const MOVEMENT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";
const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const NOT_AVAILABLE: &str = "N/A";

/// Errors that can occur while building an export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Unknown export type.
    #[error("invalid export type: {0}")]
    InvalidType(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Which data set to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Inventory,
    Movements,
    Disposals,
    /// All three, zipped.
    All,
}

impl ExportKind {
    const SINGLE: [Self; 3] = [Self::Inventory, Self::Movements, Self::Disposals];

    const fn name(self) -> &'static str {
        match self {
            Self::Inventory => "inventory",
            Self::Movements => "movements",
            Self::Disposals => "disposals",
            Self::All => "all",
        }
    }
}

impl FromStr for ExportKind {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inventory" => Ok(Self::Inventory),
            "movements" => Ok(Self::Movements),
            "disposals" => Ok(Self::Disposals),
            "all" => Ok(Self::All),
            other => Err(ExportError::InvalidType(other.to_owned())),
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A file ready to send as an attachment.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportFile {
    fn csv(filename: String, body: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(UTF8_BOM.len() + body.len());
        bytes.extend_from_slice(UTF8_BOM);
        bytes.extend_from_slice(body);
        Self {
            filename,
            content_type: "text/csv; charset=utf-8",
            bytes,
        }
    }

    const fn zip(filename: String, bytes: Vec<u8>) -> Self {
        Self {
            filename,
            content_type: "application/zip",
            bytes,
        }
    }
}

// =============================================================================
// Exports
// =============================================================================

/// Export current data.
///
/// # Errors
///
/// Returns `ExportError::Repository` if loading fails, or a CSV/zip error if
/// encoding fails.
#[instrument(skip(pool))]
pub async fn export(
    pool: &SqlitePool,
    kind: ExportKind,
    now: DateTime<Utc>,
) -> Result<ExportFile, ExportError> {
    let timestamp = now.format(FILE_TIMESTAMP_FORMAT);

    let file = if kind == ExportKind::All {
        let mut entries = Vec::with_capacity(ExportKind::SINGLE.len());
        for single in ExportKind::SINGLE {
            entries.push((format!("{single}_{timestamp}.csv"), export_csv(pool, single).await?));
        }
        ExportFile::zip(format!("export_all_{timestamp}.zip"), zip_entries(&entries)?)
    } else {
        ExportFile::csv(format!("{kind}_{timestamp}.csv"), &export_csv(pool, kind).await?)
    };

    tracing::info!(kind = %kind, filename = %file.filename, bytes = file.bytes.len(), "Export built");
    Ok(file)
}

async fn export_csv(pool: &SqlitePool, kind: ExportKind) -> Result<Vec<u8>, ExportError> {
    match kind {
        ExportKind::Inventory => inventory_csv(pool).await,
        ExportKind::Movements => movements_csv(pool).await,
        ExportKind::Disposals => disposals_csv(pool).await,
        ExportKind::All => Err(ExportError::InvalidType(kind.to_string())),
    }
}

async fn inventory_csv(pool: &SqlitePool) -> Result<Vec<u8>, ExportError> {
    let items = items::list_all_in_stock(pool).await?;
    let mut lines: HashMap<ItemId, Vec<StockLine>> = HashMap::new();
    for line in stock::all_lines(pool).await? {
        lines.entry(line.item_id).or_default().push(line);
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "Item ID",
        "Name",
        "Description",
        "Category",
        "Condition",
        "Location",
        "Quantity",
    ])?;
    for item in &items {
        for line in lines.get(&item.id).into_iter().flatten() {
            writer.write_record([
                item.id.to_string().as_str(),
                item.name.as_str(),
                item.description.as_str(),
                item.category.as_str(),
                item.condition.as_str(),
                line.location_name.as_str(),
                line.quantity.to_string().as_str(),
            ])?;
        }
    }
    finish(writer)
}

async fn movements_csv(pool: &SqlitePool) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "Movement ID",
        "Item",
        "Quantity",
        "From Location",
        "To Location",
        "Date",
        "Responsible Person",
    ])?;
    for movement in movements::list_all(pool).await? {
        writer.write_record([
            movement.id.to_string().as_str(),
            movement.item_name.as_str(),
            movement.quantity.to_string().as_str(),
            movement.from_location.as_deref().unwrap_or(NOT_AVAILABLE),
            movement.to_location.as_deref().unwrap_or(NOT_AVAILABLE),
            movement.movement_date.format(MOVEMENT_DATE_FORMAT).to_string().as_str(),
            movement.responsible_person.as_str(),
        ])?;
    }
    finish(writer)
}

async fn disposals_csv(pool: &SqlitePool) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "Disposal ID",
        "Item",
        "Location",
        "Quantity",
        "Reason",
        "Disposal Date",
        "Disposed By",
        "Notes",
    ])?;
    for disposal in disposals::list_all(pool).await? {
        writer.write_record([
            disposal.id.to_string().as_str(),
            disposal.item_name.as_str(),
            disposal.location_name.as_str(),
            disposal.quantity.to_string().as_str(),
            disposal.reason.as_str(),
            disposal.disposed_date.format(DATE_FORMAT).to_string().as_str(),
            disposal.disposed_by.as_str(),
            disposal.notes.as_str(),
        ])?;
    }
    finish(writer)
}

// =============================================================================
// Templates
// =============================================================================

/// Import templates: the import headers plus one sample row.
///
/// # Errors
///
/// Returns a CSV/zip error if encoding fails.
pub fn template(kind: ExportKind, now: DateTime<Utc>) -> Result<ExportFile, ExportError> {
    let timestamp = now.format(FILE_TIMESTAMP_FORMAT);

    if kind == ExportKind::All {
        let entries = ExportKind::SINGLE
            .into_iter()
            .map(|single| {
                Ok((
                    format!("{single}_template_{timestamp}.csv"),
                    template_csv(single)?,
                ))
            })
            .collect::<Result<Vec<_>, ExportError>>()?;
        return Ok(ExportFile::zip(
            format!("all_templates_{timestamp}.zip"),
            zip_entries(&entries)?,
        ));
    }

    Ok(ExportFile::csv(
        format!("{kind}_template_{timestamp}.csv"),
        &template_csv(kind)?,
    ))
}

fn template_csv(kind: ExportKind) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    match kind {
        ExportKind::Inventory => {
            writer.write_record(["Name", "Location", "Quantity", "Description", "Category", "Condition"])?;
            writer.write_record([
                "Altar Candle",
                "Sacristy",
                "10",
                "Beeswax candles, 12\" height",
                "Liturgical",
                "New",
            ])?;
        }
        ExportKind::Movements => {
            writer.write_record([
                "Name",
                "Quantity",
                "MovementDate",
                "ResponsiblePerson",
                "FromLocation",
                "ToLocation",
                "Notes",
            ])?;
            writer.write_record([
                "Communion Chalice",
                "2",
                "2025-05-01",
                "John Doe",
                "Storage Room",
                "Main Church",
                "Weekly service stock",
            ])?;
        }
        ExportKind::Disposals => {
            writer.write_record(["Name", "Location", "Quantity", "DisposalDate", "Reason", "Notes"])?;
            writer.write_record(["Damaged Chair", "Sanctuary", "1", "2025-05-01", "Broken legs", ""])?;
        }
        ExportKind::All => return Err(ExportError::InvalidType(kind.to_string())),
    }
    finish(writer)
}

// =============================================================================
// Encoding
// =============================================================================

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, ExportError> {
    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

fn zip_entries(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>, ExportError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(bytes)?;
    }
    Ok(zip.finish()?.into_inner())
}
