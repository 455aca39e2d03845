//! Locations and per-location stock.

use serde::Serialize;

use stockroom_core::{ItemId, LocationId, StockCellId};

use super::Item;

/// A storage location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub id: LocationId,
    /// Normalized (trimmed, title-cased) name.
    pub name: String,
}

/// Quantity of one item held at one location. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockCell {
    pub id: StockCellId,
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub quantity: i64,
}

/// A stock cell joined with its location name, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLine {
    pub cell_id: StockCellId,
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub location_name: String,
    pub quantity: i64,
}

/// An item together with every stock line it owns.
#[derive(Debug, Clone)]
pub struct ItemStock {
    pub item: Item,
    pub lines: Vec<StockLine>,
}

impl ItemStock {
    /// Sum of the item's cell quantities.
    #[must_use]
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// A stock line at a location, joined with the item it belongs to.
#[derive(Debug, Clone)]
pub struct LocationStockLine {
    pub item: Item,
    pub quantity: i64,
}
