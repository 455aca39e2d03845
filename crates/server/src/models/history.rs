//! Movement and disposal history records.

use chrono::{DateTime, NaiveDate, Utc};

use stockroom_core::{DisposalId, ItemId, LocationId, MovementId, Quantity};

// =============================================================================
// Movements
// =============================================================================

/// A recorded transfer of quantity between locations.
///
/// At least one side is present; a missing side means stock came in from or
/// went out to somewhere untracked.
#[derive(Debug, Clone)]
pub struct Movement {
    pub id: MovementId,
    pub item_id: ItemId,
    pub item_name: String,
    pub quantity: i64,
    pub from_location: Option<String>,
    pub to_location: Option<String>,
    pub movement_date: DateTime<Utc>,
    pub responsible_person: String,
    pub notes: String,
}

/// Input for appending a movement.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub item_id: ItemId,
    pub quantity: Quantity,
    pub from_location_id: Option<LocationId>,
    pub to_location_id: Option<LocationId>,
    pub movement_date: DateTime<Utc>,
    pub responsible_person: String,
    pub notes: String,
}

// =============================================================================
// Disposals
// =============================================================================

/// A recorded removal of quantity from a location.
#[derive(Debug, Clone)]
pub struct Disposal {
    pub id: DisposalId,
    pub item_id: ItemId,
    pub item_name: String,
    pub location_name: String,
    pub quantity: i64,
    pub reason: String,
    pub disposed_date: NaiveDate,
    pub disposed_by: String,
    pub notes: String,
}

/// Input for appending a disposal.
#[derive(Debug, Clone)]
pub struct NewDisposal {
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub quantity: Quantity,
    pub reason: String,
    pub disposed_date: NaiveDate,
    pub disposed_by: String,
    pub notes: String,
}
