//! Reconciliation of an item edit against its current stock cells.
//!
//! An edit submission describes the item's stock as a whole: each existing
//! line may be moved to another location, given a new quantity, or removed
//! (quantity 0), and one extra line may be added. The submission is reduced to
//! a desired quantity per location and then turned into the smallest set of
//! cell writes that reach it. Because existing cells first claim the location
//! they already sit at, two lines swapping locations or a line renamed into a
//! location edited in the same submission never collide on the
//! (item, location) uniqueness constraint.

use std::collections::{BTreeMap, HashSet};

use stockroom_core::{LocationId, Quantity, StockCellId};

use super::{LedgerError, NotFoundKind};
use crate::db::RepositoryError;
use crate::models::StockCell;

/// One submitted line after its location name has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLine {
    pub cell_id: StockCellId,
    pub location_id: LocationId,
    /// `None` removes the line.
    pub quantity: Option<Quantity>,
}

/// A single write against the item's stock cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellOp {
    /// Set an existing cell's location and quantity.
    Update {
        cell_id: StockCellId,
        location_id: LocationId,
        quantity: Quantity,
    },
    /// Open a new cell.
    Insert {
        location_id: LocationId,
        quantity: Quantity,
    },
    /// Remove an existing cell.
    Delete { cell_id: StockCellId },
}

/// Check submitted lines before anything is resolved or written.
///
/// # Errors
///
/// - `NotFound` if a line references a cell the item does not own
/// - `InvalidArgument` for a line submitted twice
pub fn validate_lines(cells: &[StockCell], lines: &[StockCellId]) -> Result<(), LedgerError> {
    let owned: HashSet<StockCellId> = cells.iter().map(|c| c.id).collect();
    let mut seen = HashSet::new();

    for &cell_id in lines {
        if !owned.contains(&cell_id) {
            return Err(LedgerError::not_found(NotFoundKind::StockLine, cell_id.as_i64()));
        }
        if !seen.insert(cell_id) {
            return Err(LedgerError::InvalidArgument(format!(
                "stock line {cell_id} submitted more than once"
            )));
        }
    }
    Ok(())
}

/// Desired quantity per location after applying the submission.
///
/// Cells without a submitted line keep their location and quantity.
///
/// # Errors
///
/// - `InvalidArgument` if the lines merged into one location overflow
/// - `Repository` if an untouched cell holds a non-positive quantity
pub fn desired_quantities(
    cells: &[StockCell],
    lines: &[ResolvedLine],
    new_line: Option<(LocationId, Quantity)>,
) -> Result<BTreeMap<LocationId, Quantity>, LedgerError> {
    let mut desired: BTreeMap<LocationId, Quantity> = BTreeMap::new();

    for cell in cells {
        match lines.iter().find(|l| l.cell_id == cell.id) {
            Some(ResolvedLine {
                location_id,
                quantity: Some(quantity),
                ..
            }) => merge(&mut desired, *location_id, *quantity)?,
            Some(_) => {}
            None => {
                let quantity = Quantity::new(cell.quantity).map_err(|_| {
                    RepositoryError::DataCorruption(format!(
                        "stock line {} holds {}",
                        cell.id, cell.quantity
                    ))
                })?;
                merge(&mut desired, cell.location_id, quantity)?;
            }
        }
    }

    if let Some((location_id, quantity)) = new_line {
        merge(&mut desired, location_id, quantity)?;
    }

    Ok(desired)
}

fn merge(
    desired: &mut BTreeMap<LocationId, Quantity>,
    location_id: LocationId,
    quantity: Quantity,
) -> Result<(), LedgerError> {
    let total = match desired.get(&location_id) {
        Some(current) => current.checked_add(quantity).ok_or_else(|| {
            LedgerError::InvalidArgument(
                "combined quantity at one location is too large".to_owned(),
            )
        })?,
        None => quantity,
    };
    desired.insert(location_id, total);
    Ok(())
}

/// Cell writes that turn `cells` into `desired`.
///
/// Deletes come first, then updates, then inserts.
#[must_use]
pub fn reconcile(cells: &[StockCell], desired: &BTreeMap<LocationId, Quantity>) -> Vec<CellOp> {
    let mut claimed: HashSet<LocationId> = HashSet::new();
    let mut updates = Vec::new();
    let mut leftovers = Vec::new();

    for cell in cells {
        match desired.get(&cell.location_id) {
            Some(&quantity) if claimed.insert(cell.location_id) => {
                if quantity.get() != cell.quantity {
                    updates.push(CellOp::Update {
                        cell_id: cell.id,
                        location_id: cell.location_id,
                        quantity,
                    });
                }
            }
            _ => leftovers.push(cell),
        }
    }

    let mut unclaimed = desired
        .iter()
        .filter(|(location_id, _)| !claimed.contains(location_id))
        .map(|(&location_id, &quantity)| (location_id, quantity));
    let mut leftovers = leftovers.into_iter();
    let mut deletes = Vec::new();
    let mut inserts = Vec::new();

    loop {
        match (leftovers.next(), unclaimed.next()) {
            (Some(cell), Some((location_id, quantity))) => updates.push(CellOp::Update {
                cell_id: cell.id,
                location_id,
                quantity,
            }),
            (Some(cell), None) => deletes.push(CellOp::Delete { cell_id: cell.id }),
            (None, Some((location_id, quantity))) => inserts.push(CellOp::Insert {
                location_id,
                quantity,
            }),
            (None, None) => break,
        }
    }

    deletes.extend(updates);
    deletes.extend(inserts);
    deletes
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stockroom_core::ItemId;

    use super::*;

    fn cell(id: i64, location: i64, quantity: i64) -> StockCell {
        StockCell {
            id: StockCellId::new(id),
            item_id: ItemId::new(1),
            location_id: LocationId::new(location),
            quantity,
        }
    }

    /// A line; 0 removes it.
    fn line(cell_id: i64, location: i64, quantity: i64) -> ResolvedLine {
        ResolvedLine {
            cell_id: StockCellId::new(cell_id),
            location_id: LocationId::new(location),
            quantity: Quantity::new(quantity).ok(),
        }
    }

    fn q(n: i64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    /// Apply ops to an in-memory copy and return location -> quantity.
    fn apply(cells: &[StockCell], ops: &[CellOp]) -> BTreeMap<LocationId, i64> {
        let mut state: BTreeMap<StockCellId, (LocationId, i64)> = cells
            .iter()
            .map(|c| (c.id, (c.location_id, c.quantity)))
            .collect();
        let mut next_id = 1000;
        for op in ops {
            match *op {
                CellOp::Update {
                    cell_id,
                    location_id,
                    quantity,
                } => {
                    state.insert(cell_id, (location_id, quantity.get()));
                }
                CellOp::Insert {
                    location_id,
                    quantity,
                } => {
                    state.insert(StockCellId::new(next_id), (location_id, quantity.get()));
                    next_id += 1;
                }
                CellOp::Delete { cell_id } => {
                    state.remove(&cell_id);
                }
            }
            let mut locations = HashSet::new();
            for (location, _) in state.values() {
                assert!(locations.insert(*location), "duplicate location after {op:?}");
            }
        }
        state.into_values().collect()
    }

    #[test]
    fn test_untouched_cells_produce_no_ops() {
        let cells = [cell(1, 10, 5), cell(2, 20, 3)];
        let desired = desired_quantities(&cells, &[], None).unwrap();
        assert!(reconcile(&cells, &desired).is_empty());
    }

    #[test]
    fn test_quantity_change_updates_in_place() {
        let cells = [cell(1, 10, 5)];
        let desired = desired_quantities(&cells, &[line(1, 10, 8)], None).unwrap();
        let ops = reconcile(&cells, &desired);
        assert_eq!(
            ops,
            vec![CellOp::Update {
                cell_id: StockCellId::new(1),
                location_id: LocationId::new(10),
                quantity: q(8),
            }]
        );
    }

    #[test]
    fn test_zero_quantity_deletes_line() {
        let cells = [cell(1, 10, 5), cell(2, 20, 3)];
        let desired = desired_quantities(&cells, &[line(2, 20, 0)], None).unwrap();
        let ops = reconcile(&cells, &desired);
        assert_eq!(ops, vec![CellOp::Delete { cell_id: StockCellId::new(2) }]);
    }

    #[test]
    fn test_rename_merges_into_existing_location() {
        let cells = [cell(1, 10, 5), cell(2, 20, 3)];
        let desired = desired_quantities(&cells, &[line(2, 10, 3)], None).unwrap();
        assert_eq!(desired.get(&LocationId::new(10)), Some(&q(8)));

        let result = apply(&cells, &reconcile(&cells, &desired));
        assert_eq!(result, BTreeMap::from([(LocationId::new(10), 8)]));
    }

    #[test]
    fn test_rename_to_new_location_repoints_cell() {
        let cells = [cell(1, 10, 5)];
        let desired = desired_quantities(&cells, &[line(1, 30, 5)], None).unwrap();
        let ops = reconcile(&cells, &desired);
        assert_eq!(
            ops,
            vec![CellOp::Update {
                cell_id: StockCellId::new(1),
                location_id: LocationId::new(30),
                quantity: q(5),
            }]
        );
    }

    #[test]
    fn test_swap_locations_never_collides() {
        let cells = [cell(1, 10, 5), cell(2, 20, 3)];
        let desired =
            desired_quantities(&cells, &[line(1, 20, 5), line(2, 10, 3)], None).unwrap();

        let result = apply(&cells, &reconcile(&cells, &desired));
        assert_eq!(
            result,
            BTreeMap::from([(LocationId::new(10), 3), (LocationId::new(20), 5)])
        );
    }

    #[test]
    fn test_new_line_merges_or_inserts() {
        let cells = [cell(1, 10, 5)];

        let desired =
            desired_quantities(&cells, &[], Some((LocationId::new(10), q(2)))).unwrap();
        let result = apply(&cells, &reconcile(&cells, &desired));
        assert_eq!(result, BTreeMap::from([(LocationId::new(10), 7)]));

        let desired =
            desired_quantities(&cells, &[], Some((LocationId::new(40), q(2)))).unwrap();
        let ops = reconcile(&cells, &desired);
        assert_eq!(
            ops,
            vec![CellOp::Insert {
                location_id: LocationId::new(40),
                quantity: q(2),
            }]
        );
    }

    #[test]
    fn test_total_matches_desired_sum() {
        let cells = [cell(1, 10, 5), cell(2, 20, 3), cell(3, 30, 4)];
        let lines = [line(1, 20, 6), line(2, 40, 0), line(3, 50, 1)];
        let desired =
            desired_quantities(&cells, &lines, Some((LocationId::new(10), q(9)))).unwrap();
        let result = apply(&cells, &reconcile(&cells, &desired));
        assert_eq!(result.values().sum::<i64>(), 16);
        assert!(result.values().all(|&q| q > 0));
    }

    #[test]
    fn test_validate_rejects_foreign_cell() {
        let cells = [cell(1, 10, 5)];
        let err = validate_lines(&cells, &[StockCellId::new(99)]).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::NotFound {
                kind: NotFoundKind::StockLine,
                id: 99
            }
        ));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let cells = [cell(1, 10, 5)];
        assert!(matches!(
            validate_lines(&cells, &[StockCellId::new(1), StockCellId::new(1)]),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(validate_lines(&cells, &[StockCellId::new(1)]).is_ok());
    }

    #[test]
    fn test_merged_lines_overflow_is_rejected() {
        let cells = [cell(1, 10, 5), cell(2, 20, 3)];
        let lines = [line(1, 10, i64::MAX), line(2, 10, 2)];
        let err = desired_quantities(&cells, &lines, None).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidArgument(_)));
    }

    #[test]
    fn test_new_line_overflow_is_rejected() {
        let cells = [cell(1, 10, 5)];
        let lines = [line(1, 10, i64::MAX)];
        let result = desired_quantities(&cells, &lines, Some((LocationId::new(10), q(1))));
        assert!(matches!(result, Err(LedgerError::InvalidArgument(_))));
    }

    #[test]
    fn test_corrupt_untouched_cell_is_reported() {
        let cells = [cell(1, 10, 0)];
        let result = desired_quantities(&cells, &[], None);
        assert!(matches!(result, Err(LedgerError::Repository(_))));
    }
}
