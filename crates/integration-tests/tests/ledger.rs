//! Integration tests for the stock ledger.
//!
//! Each test runs against its own in-memory database.

use chrono::Utc;
use stockroom_core::{LocationName, Quantity};
use stockroom_integration_tests::{
    add_stock, admin, clerk, count_rows, item_stock, quantity_at, test_pool,
};
use stockroom_server::db::{disposals, locations, movements};
use stockroom_server::models::ItemDetails;
use stockroom_server::services::ledger::{
    AddStock, AddStockKind, Destination, Dispose, EditItem, Ledger, LedgerError, LineEdit,
    NotFoundKind, Transfer,
};

fn qty(n: i64) -> Quantity {
    Quantity::new(n).unwrap()
}

// ============================================================================
// Add Stock
// ============================================================================

#[tokio::test]
async fn test_add_stock_twice_reuses_item_and_cell() {
    let pool = test_pool().await;

    let first = add_stock(&pool, "Candle", "Sacristy", 10).await;
    assert_eq!(first.kind, AddStockKind::NewItem);
    assert_eq!(first.cell.quantity, 10);

    let second = add_stock(&pool, "Candle", "sacristy ", 5).await;
    assert_eq!(second.kind, AddStockKind::AddedToExisting);
    assert_eq!(second.item.id, first.item.id);
    assert_eq!(second.cell.id, first.cell.id);
    assert_eq!(second.cell.quantity, 15);

    assert_eq!(count_rows(&pool, "item").await, 1);
    assert_eq!(count_rows(&pool, "stock_cell").await, 1);
    assert_eq!(count_rows(&pool, "location").await, 1);
}

#[tokio::test]
async fn test_add_stock_at_new_location_opens_cell() {
    let pool = test_pool().await;

    let first = add_stock(&pool, "Candle", "Sacristy", 10).await;
    let second = add_stock(&pool, "Candle", "Main Church", 4).await;

    assert_eq!(second.kind, AddStockKind::NewLocation);
    assert_eq!(second.item.id, first.item.id);

    let stock = item_stock(&pool, first.item.id).await;
    assert_eq!(stock.lines.len(), 2);
    assert_eq!(stock.total_quantity(), 14);
}

#[tokio::test]
async fn test_add_stock_different_description_is_new_item() {
    let pool = test_pool().await;
    let ledger = Ledger::new(&pool);

    let plain = add_stock(&pool, "Chair", "Hall", 2).await;
    let folding = ledger
        .add_stock(
            &clerk(),
            AddStock {
                details: ItemDetails::named("Chair").with_description("folding"),
                location: "Hall".to_owned(),
                quantity: qty(6),
            },
        )
        .await
        .unwrap();

    assert_eq!(folding.kind, AddStockKind::NewItem);
    assert_ne!(folding.item.id, plain.item.id);
    assert_eq!(count_rows(&pool, "location").await, 1);
}

#[tokio::test]
async fn test_add_stock_rejects_blank_name_and_location() {
    let pool = test_pool().await;
    let ledger = Ledger::new(&pool);

    let blank_name = ledger
        .add_stock(
            &clerk(),
            AddStock {
                details: ItemDetails::named("  "),
                location: "Hall".to_owned(),
                quantity: qty(1),
            },
        )
        .await;
    assert!(matches!(blank_name, Err(LedgerError::InvalidArgument(_))));

    let blank_location = ledger
        .add_stock(
            &clerk(),
            AddStock {
                details: ItemDetails::named("Chair"),
                location: "   ".to_owned(),
                quantity: qty(1),
            },
        )
        .await;
    assert!(matches!(blank_location, Err(LedgerError::InvalidArgument(_))));

    assert_eq!(count_rows(&pool, "item").await, 0);
    assert_eq!(count_rows(&pool, "location").await, 0);
}

// ============================================================================
// Locations
// ============================================================================

#[tokio::test]
async fn test_location_names_normalize_to_one_row() {
    let pool = test_pool().await;
    let mut conn = pool.acquire().await.unwrap();

    let a = locations::get_or_create(&mut conn, &LocationName::parse("main hall").unwrap())
        .await
        .unwrap();
    let b = locations::get_or_create(&mut conn, &LocationName::parse(" Main Hall").unwrap())
        .await
        .unwrap();

    assert_eq!(a.id, b.id);
    assert_eq!(a.name, "Main Hall");
    drop(conn);
    assert_eq!(count_rows(&pool, "location").await, 1);
}

// ============================================================================
// Transfer
// ============================================================================

#[tokio::test]
async fn test_transfer_conserves_total_and_logs_one_movement() {
    let pool = test_pool().await;
    let added = add_stock(&pool, "Candle", "Sacristy", 15).await;
    let item_id = added.item.id;

    let outcome = Ledger::new(&pool)
        .transfer(
            &clerk(),
            Transfer {
                item_id,
                from: added.location.id,
                to: Destination::Named("main church".to_owned()),
                quantity: qty(5),
                responsible: None,
                notes: Some("Easter vigil".to_owned()),
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.to.name, "Main Church");
    assert_eq!(quantity_at(&pool, item_id, "Sacristy").await, 10);
    assert_eq!(quantity_at(&pool, item_id, "Main Church").await, 5);
    assert_eq!(item_stock(&pool, item_id).await.total_quantity(), 15);

    let logged = movements::list_for_item(&pool, item_id).await.unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].quantity, 5);
    assert_eq!(logged[0].from_location.as_deref(), Some("Sacristy"));
    assert_eq!(logged[0].to_location.as_deref(), Some("Main Church"));
    assert_eq!(logged[0].responsible_person, "clerk");
    assert_eq!(logged[0].notes, "Easter vigil");
}

#[tokio::test]
async fn test_transfer_of_everything_removes_source_cell() {
    let pool = test_pool().await;
    let added = add_stock(&pool, "Candle", "Sacristy", 4).await;
    let church = add_stock(&pool, "Candle", "Main Church", 1).await;

    Ledger::new(&pool)
        .transfer(
            &clerk(),
            Transfer {
                item_id: added.item.id,
                from: added.location.id,
                to: Destination::Existing(church.location.id),
                quantity: qty(4),
                responsible: Some("Fr. Tom".to_owned()),
                notes: None,
            },
        )
        .await
        .unwrap();

    let stock = item_stock(&pool, added.item.id).await;
    assert_eq!(stock.lines.len(), 1);
    assert_eq!(stock.lines[0].location_name, "Main Church");
    assert_eq!(stock.lines[0].quantity, 5);
    assert_eq!(count_rows(&pool, "stock_cell WHERE quantity <= 0").await, 0);
}

#[tokio::test]
async fn test_transfer_insufficient_stock_changes_nothing() {
    let pool = test_pool().await;
    let added = add_stock(&pool, "Candle", "Sacristy", 3).await;

    let result = Ledger::new(&pool)
        .transfer(
            &clerk(),
            Transfer {
                item_id: added.item.id,
                from: added.location.id,
                to: Destination::Named("Loft".to_owned()),
                quantity: qty(4),
                responsible: None,
                notes: None,
            },
        )
        .await;

    assert!(matches!(
        result,
        Err(LedgerError::InsufficientStock {
            requested: 4,
            available: 3
        })
    ));
    assert_eq!(quantity_at(&pool, added.item.id, "Sacristy").await, 3);
    assert_eq!(count_rows(&pool, "movement").await, 0);
    // The destination created inside the failed transaction is rolled back too
    assert_eq!(count_rows(&pool, "location").await, 1);
}

#[tokio::test]
async fn test_transfer_to_same_location_is_rejected() {
    let pool = test_pool().await;
    let added = add_stock(&pool, "Candle", "Sacristy", 3).await;

    let result = Ledger::new(&pool)
        .transfer(
            &clerk(),
            Transfer {
                item_id: added.item.id,
                from: added.location.id,
                to: Destination::Named(" sacristy".to_owned()),
                quantity: qty(1),
                responsible: None,
                notes: None,
            },
        )
        .await;

    assert!(matches!(result, Err(LedgerError::InvalidArgument(_))));
    assert_eq!(quantity_at(&pool, added.item.id, "Sacristy").await, 3);
}

// ============================================================================
// Dispose
// ============================================================================

#[tokio::test]
async fn test_dispose_all_deletes_cell_and_logs_disposal() {
    let pool = test_pool().await;
    let added = add_stock(&pool, "Candle", "Sacristy", 15).await;
    let today = Utc::now().date_naive();

    Ledger::new(&pool)
        .dispose(
            &clerk(),
            Dispose {
                item_id: added.item.id,
                location_id: added.location.id,
                quantity: qty(15),
                reason: "damaged".to_owned(),
                date: today,
                notes: None,
            },
        )
        .await
        .unwrap();

    assert!(item_stock(&pool, added.item.id).await.lines.is_empty());
    assert_eq!(count_rows(&pool, "stock_cell").await, 0);

    let page = disposals::list(&pool, None, stockroom_server::models::Pagination::new(None, 20))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    let disposal = &page.items[0];
    assert_eq!(disposal.quantity, 15);
    assert_eq!(disposal.reason, "damaged");
    assert_eq!(disposal.disposed_by, "clerk");
    assert_eq!(disposal.disposed_date, today);
    assert_eq!(disposal.location_name, "Sacristy");
}

#[tokio::test]
async fn test_dispose_more_than_available_changes_nothing() {
    let pool = test_pool().await;
    let added = add_stock(&pool, "Candle", "Sacristy", 2).await;

    let result = Ledger::new(&pool)
        .dispose(
            &clerk(),
            Dispose {
                item_id: added.item.id,
                location_id: added.location.id,
                quantity: qty(3),
                reason: "broken".to_owned(),
                date: Utc::now().date_naive(),
                notes: None,
            },
        )
        .await;

    assert!(matches!(result, Err(LedgerError::InsufficientStock { .. })));
    assert_eq!(quantity_at(&pool, added.item.id, "Sacristy").await, 2);
    assert_eq!(count_rows(&pool, "disposed_item").await, 0);
}

#[tokio::test]
async fn test_dispose_requires_reason() {
    let pool = test_pool().await;
    let added = add_stock(&pool, "Candle", "Sacristy", 2).await;

    let result = Ledger::new(&pool)
        .dispose(
            &clerk(),
            Dispose {
                item_id: added.item.id,
                location_id: added.location.id,
                quantity: qty(1),
                reason: "  ".to_owned(),
                date: Utc::now().date_naive(),
                notes: None,
            },
        )
        .await;

    assert!(matches!(result, Err(LedgerError::InvalidArgument(_))));
    assert_eq!(quantity_at(&pool, added.item.id, "Sacristy").await, 2);
}

// ============================================================================
// Edit
// ============================================================================

#[tokio::test]
async fn test_edit_requires_admin() {
    let pool = test_pool().await;
    let added = add_stock(&pool, "Candle", "Sacristy", 2).await;

    let result = Ledger::new(&pool)
        .edit_item(
            &clerk(),
            EditItem {
                item_id: added.item.id,
                details: ItemDetails::named("Taper"),
                lines: Vec::new(),
                new_line: None,
            },
        )
        .await;

    assert!(matches!(result, Err(LedgerError::Forbidden(_))));
    assert_eq!(item_stock(&pool, added.item.id).await.item.name, "Candle");
}

#[tokio::test]
async fn test_edit_swaps_locations_without_conflict() {
    let pool = test_pool().await;
    let sacristy = add_stock(&pool, "Candle", "Sacristy", 3).await;
    let hall = add_stock(&pool, "Candle", "Hall", 5).await;
    let item_id = sacristy.item.id;

    Ledger::new(&pool)
        .edit_item(
            &admin(),
            EditItem {
                item_id,
                details: ItemDetails::named("Candle"),
                lines: vec![
                    LineEdit {
                        cell_id: sacristy.cell.id,
                        location: "Hall".to_owned(),
                        quantity: Some(qty(3)),
                    },
                    LineEdit {
                        cell_id: hall.cell.id,
                        location: "Sacristy".to_owned(),
                        quantity: Some(qty(5)),
                    },
                ],
                new_line: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(quantity_at(&pool, item_id, "Sacristy").await, 5);
    assert_eq!(quantity_at(&pool, item_id, "Hall").await, 3);
    assert_eq!(count_rows(&pool, "stock_cell").await, 2);
}

#[tokio::test]
async fn test_edit_rename_into_existing_line_merges() {
    let pool = test_pool().await;
    let sacristy = add_stock(&pool, "Candle", "Sacristy", 3).await;
    let hall = add_stock(&pool, "Candle", "Hall", 5).await;
    let item_id = sacristy.item.id;

    let item = Ledger::new(&pool)
        .edit_item(
            &admin(),
            EditItem {
                item_id,
                details: ItemDetails::named(" Altar Candle ").with_category("Liturgical"),
                lines: vec![
                    LineEdit {
                        cell_id: sacristy.cell.id,
                        location: "Sacristy".to_owned(),
                        quantity: Some(qty(3)),
                    },
                    LineEdit {
                        cell_id: hall.cell.id,
                        location: "sacristy".to_owned(),
                        quantity: Some(qty(5)),
                    },
                ],
                new_line: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(item.name, "Altar Candle");
    assert_eq!(item.category, "Liturgical");

    let stock = item_stock(&pool, item_id).await;
    assert_eq!(stock.lines.len(), 1);
    assert_eq!(stock.lines[0].location_name, "Sacristy");
    assert_eq!(stock.lines[0].quantity, 8);
}

#[tokio::test]
async fn test_edit_zero_removes_line_and_new_line_merges() {
    let pool = test_pool().await;
    let sacristy = add_stock(&pool, "Candle", "Sacristy", 3).await;
    let hall = add_stock(&pool, "Candle", "Hall", 5).await;
    let item_id = sacristy.item.id;

    Ledger::new(&pool)
        .edit_item(
            &admin(),
            EditItem {
                item_id,
                details: ItemDetails::named("Candle"),
                lines: vec![LineEdit {
                    cell_id: sacristy.cell.id,
                    location: String::new(),
                    quantity: None,
                }],
                new_line: Some(("hall".to_owned(), qty(2))),
            },
        )
        .await
        .unwrap();

    let stock = item_stock(&pool, item_id).await;
    assert_eq!(stock.lines.len(), 1);
    assert_eq!(stock.lines[0].cell_id, hall.cell.id);
    assert_eq!(stock.lines[0].quantity, 7);
}

#[tokio::test]
async fn test_edit_rejects_foreign_and_duplicate_lines() {
    let pool = test_pool().await;
    let candle = add_stock(&pool, "Candle", "Sacristy", 3).await;
    let chair = add_stock(&pool, "Chair", "Hall", 5).await;
    let ledger = Ledger::new(&pool);

    let foreign = ledger
        .edit_item(
            &admin(),
            EditItem {
                item_id: candle.item.id,
                details: ItemDetails::named("Candle"),
                lines: vec![LineEdit {
                    cell_id: chair.cell.id,
                    location: "Hall".to_owned(),
                    quantity: Some(qty(1)),
                }],
                new_line: None,
            },
        )
        .await;
    assert!(matches!(
        foreign,
        Err(LedgerError::NotFound {
            kind: NotFoundKind::StockLine,
            ..
        })
    ));

    let duplicate = ledger
        .edit_item(
            &admin(),
            EditItem {
                item_id: candle.item.id,
                details: ItemDetails::named("Renamed"),
                lines: vec![
                    LineEdit {
                        cell_id: candle.cell.id,
                        location: "Sacristy".to_owned(),
                        quantity: Some(qty(1)),
                    },
                    LineEdit {
                        cell_id: candle.cell.id,
                        location: "Hall".to_owned(),
                        quantity: Some(qty(2)),
                    },
                ],
                new_line: None,
            },
        )
        .await;
    assert!(matches!(duplicate, Err(LedgerError::InvalidArgument(_))));

    let stock = item_stock(&pool, candle.item.id).await;
    assert_eq!(stock.item.name, "Candle");
    assert_eq!(stock.total_quantity(), 3);
    assert_eq!(quantity_at(&pool, chair.item.id, "Hall").await, 5);
}

#[tokio::test]
async fn test_edit_merge_overflow_keeps_stock() {
    let pool = test_pool().await;
    let sacristy = add_stock(&pool, "Candle", "Sacristy", 5).await;
    let hall = add_stock(&pool, "Candle", "Hall", 3).await;
    let item_id = sacristy.item.id;

    let result = Ledger::new(&pool)
        .edit_item(
            &admin(),
            EditItem {
                item_id,
                details: ItemDetails::named("Candle"),
                lines: vec![
                    LineEdit {
                        cell_id: sacristy.cell.id,
                        location: "Sacristy".to_owned(),
                        quantity: Some(qty(i64::MAX)),
                    },
                    LineEdit {
                        cell_id: hall.cell.id,
                        location: "Sacristy".to_owned(),
                        quantity: Some(qty(2)),
                    },
                ],
                new_line: None,
            },
        )
        .await;

    assert!(matches!(result, Err(LedgerError::InvalidArgument(_))));
    assert_eq!(quantity_at(&pool, item_id, "Sacristy").await, 5);
    assert_eq!(quantity_at(&pool, item_id, "Hall").await, 3);
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_leaves_no_orphans() {
    let pool = test_pool().await;
    let candle = add_stock(&pool, "Candle", "Sacristy", 10).await;
    add_stock(&pool, "Chair", "Hall", 4).await;
    let ledger = Ledger::new(&pool);

    ledger
        .transfer(
            &clerk(),
            Transfer {
                item_id: candle.item.id,
                from: candle.location.id,
                to: Destination::Named("Hall".to_owned()),
                quantity: qty(2),
                responsible: None,
                notes: None,
            },
        )
        .await
        .unwrap();
    ledger
        .dispose(
            &clerk(),
            Dispose {
                item_id: candle.item.id,
                location_id: candle.location.id,
                quantity: qty(1),
                reason: "snapped".to_owned(),
                date: Utc::now().date_naive(),
                notes: None,
            },
        )
        .await
        .unwrap();

    let unconfirmed = ledger.delete_item(&admin(), candle.item.id, false).await;
    assert!(matches!(unconfirmed, Err(LedgerError::InvalidArgument(_))));

    let forbidden = ledger.delete_item(&clerk(), candle.item.id, true).await;
    assert!(matches!(forbidden, Err(LedgerError::Forbidden(_))));

    let deleted = ledger.delete_item(&admin(), candle.item.id, true).await.unwrap();
    assert_eq!(deleted.name, "Candle");
    assert_eq!(deleted.stock_cells, 2);
    assert_eq!(deleted.movements, 1);
    assert_eq!(deleted.disposals, 1);

    let id = candle.item.id.as_i64();
    for table in ["stock_cell", "movement", "disposed_item"] {
        assert_eq!(
            count_rows(&pool, &format!("{table} WHERE item_id = {id}")).await,
            0,
            "{table} rows remain"
        );
    }
    assert_eq!(count_rows(&pool, "item").await, 1);
    assert_eq!(count_rows(&pool, "stock_cell").await, 1);

    let missing = ledger.delete_item(&admin(), candle.item.id, true).await;
    assert!(missing.unwrap_err().is_missing_item());
}
