//! Integration tests for CSV import and export.

use std::io::Cursor;

use chrono::{TimeZone, Utc};
use stockroom_integration_tests::{add_stock, admin, clerk, count_rows, quantity_at, test_pool};
use stockroom_server::db::{disposals, items, movements};
use stockroom_server::models::Pagination;
use stockroom_server::services::export::{self, ExportKind};
use stockroom_server::services::import::{ImportContext, ImportError, import_csv};
use stockroom_server::services::ledger::{Destination, Ledger, Transfer};

const BOM: &[u8] = b"\xEF\xBB\xBF";

fn body(file: &[u8]) -> &str {
    std::str::from_utf8(file.strip_prefix(BOM).expect("export starts with a BOM")).unwrap()
}

// ============================================================================
// Import
// ============================================================================

#[tokio::test]
async fn test_inventory_import_adds_stock() {
    let pool = test_pool().await;
    let existing = add_stock(&pool, "Candle", "Sacristy", 2).await;

    let csv = "Name,Location,Quantity,Category\n\
               Candle,sacristy,3,\n\
               Hymnal,Main Church,40,Books\n\
               ,,,\n";
    let summary = import_csv(&pool, &clerk(), ImportContext::Inventory, csv.as_bytes())
        .await
        .unwrap();

    assert_eq!(summary.rows, 2);
    assert_eq!(summary.items_created, 1);
    assert_eq!(quantity_at(&pool, existing.item.id, "Sacristy").await, 5);

    let hymnal = items::find_by_name(&pool, "Hymnal").await.unwrap().unwrap();
    assert_eq!(hymnal.category, "Books");
    assert_eq!(hymnal.condition, "Unknown");
    assert_eq!(quantity_at(&pool, hymnal.id, "Main Church").await, 40);
}

#[tokio::test]
async fn test_import_with_bom_and_column_order() {
    let pool = test_pool().await;

    let mut data = BOM.to_vec();
    data.extend_from_slice(b"Quantity,Location,Name\n7,Hall,Chair\n");
    import_csv(&pool, &clerk(), ImportContext::Inventory, &data)
        .await
        .unwrap();

    let chair = items::find_by_name(&pool, "Chair").await.unwrap().unwrap();
    assert_eq!(quantity_at(&pool, chair.id, "Hall").await, 7);
}

#[tokio::test]
async fn test_bad_row_rolls_back_whole_import() {
    let pool = test_pool().await;

    let csv = "Name,Location,Quantity\n\
               Chair,Hall,4\n\
               Table,Hall,-1\n\
               Lamp,Hall,2\n";
    let err = import_csv(&pool, &clerk(), ImportContext::Inventory, csv.as_bytes())
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::Row { row: 2, .. }), "got {err}");
    assert_eq!(count_rows(&pool, "item").await, 0);
    assert_eq!(count_rows(&pool, "location").await, 0);
    assert_eq!(count_rows(&pool, "stock_cell").await, 0);
}

#[tokio::test]
async fn test_missing_required_column_is_rejected() {
    let pool = test_pool().await;

    let csv = "Name,Quantity\nChair,4\n";
    let err = import_csv(&pool, &clerk(), ImportContext::Inventory, csv.as_bytes())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "missing required columns: Location");
    assert_eq!(count_rows(&pool, "item").await, 0);
}

#[tokio::test]
async fn test_movement_import_is_history_only() {
    let pool = test_pool().await;
    let candle = add_stock(&pool, "Candle", "Sacristy", 10).await;

    let csv = "Name,Quantity,MovementDate,ResponsiblePerson,FromLocation,ToLocation,Notes\n\
               Candle,4,2024-03-01,Jo,Sacristy,Main Church,Lent\n\
               Chalice,1,2024-03-02,Jo,,Sacristy,\n";
    let summary = import_csv(&pool, &clerk(), ImportContext::Movements, csv.as_bytes())
        .await
        .unwrap();
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.items_created, 1);

    // Stock cells are untouched
    assert_eq!(quantity_at(&pool, candle.item.id, "Sacristy").await, 10);
    assert_eq!(quantity_at(&pool, candle.item.id, "Main Church").await, 0);

    let logged = movements::list_for_item(&pool, candle.item.id).await.unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(
        logged[0].movement_date,
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    );
    assert_eq!(logged[0].responsible_person, "Jo");

    let chalice = items::find_by_name(&pool, "Chalice").await.unwrap().unwrap();
    assert_eq!(chalice.description, "Auto-created from movement import");
    assert_eq!(count_rows(&pool, "stock_cell").await, 1);
}

#[tokio::test]
async fn test_movement_import_needs_a_location() {
    let pool = test_pool().await;

    let csv = "Name,Quantity,MovementDate,ResponsiblePerson\nCandle,4,2024-03-01,Jo\n";
    let err = import_csv(&pool, &clerk(), ImportContext::Movements, csv.as_bytes())
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::Row { row: 1, .. }));
    assert_eq!(count_rows(&pool, "item").await, 0);
}

#[tokio::test]
async fn test_disposal_import_is_stamped_with_actor() {
    let pool = test_pool().await;

    let csv = "Name,Location,Quantity,DisposalDate,Reason\n\
               Chair,Hall,2,2024-01-15,Woodworm\n";
    import_csv(&pool, &admin(), ImportContext::Disposals, csv.as_bytes())
        .await
        .unwrap();

    let page = disposals::list(&pool, Some("woodworm"), Pagination::new(None, 20))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].disposed_by, "admin");
    assert_eq!(page.items[0].location_name, "Hall");
    assert_eq!(page.items[0].disposed_date.to_string(), "2024-01-15");
    assert_eq!(count_rows(&pool, "stock_cell").await, 0);
}

#[tokio::test]
async fn test_bad_date_names_the_row() {
    let pool = test_pool().await;

    let csv = "Name,Location,Quantity,DisposalDate,Reason\n\
               Chair,Hall,2,2024-01-15,Woodworm\n\
               Chair,Hall,1,15/01/2024,Woodworm\n";
    let err = import_csv(&pool, &clerk(), ImportContext::Disposals, csv.as_bytes())
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("row 2:"), "got {err}");
    assert_eq!(count_rows(&pool, "disposed_item").await, 0);
}

#[tokio::test]
async fn test_inventory_template_imports_cleanly() {
    let pool = test_pool().await;

    let template = export::template(ExportKind::Inventory, Utc::now()).unwrap();
    let summary = import_csv(&pool, &clerk(), ImportContext::Inventory, &template.bytes)
        .await
        .unwrap();

    assert_eq!(summary.rows, 1);
    assert_eq!(count_rows(&pool, "stock_cell").await, 1);
}

// ============================================================================
// Export
// ============================================================================

#[tokio::test]
async fn test_inventory_export_lists_each_stock_line() {
    let pool = test_pool().await;
    add_stock(&pool, "Candle", "Sacristy", 10).await;
    add_stock(&pool, "Candle", "Main Church", 2).await;
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap();

    let file = export::export(&pool, ExportKind::Inventory, now).await.unwrap();

    assert_eq!(file.filename, "inventory_20240601_093000.csv");
    assert_eq!(file.content_type, "text/csv; charset=utf-8");

    let text = body(&file.bytes);
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("Item ID,Name,Description,Category,Condition,Location,Quantity")
    );
    let rows: Vec<_> = lines.collect();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().any(|r| r.ends_with("Sacristy,10")));
    assert!(rows.iter().any(|r| r.ends_with("Main Church,2")));
}

#[tokio::test]
async fn test_movement_export_formats_dates_and_missing_sides() {
    let pool = test_pool().await;
    let candle = add_stock(&pool, "Candle", "Sacristy", 10).await;
    Ledger::new(&pool)
        .transfer(
            &clerk(),
            Transfer {
                item_id: candle.item.id,
                from: candle.location.id,
                to: Destination::Named("Loft".to_owned()),
                quantity: stockroom_core::Quantity::new(3).unwrap(),
                responsible: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    let csv = "Name,Quantity,MovementDate,ResponsiblePerson,ToLocation\n\
               Candle,5,2023-12-24,Jo,Sacristy\n";
    import_csv(&pool, &clerk(), ImportContext::Movements, csv.as_bytes())
        .await
        .unwrap();

    let file = export::export(&pool, ExportKind::Movements, Utc::now()).await.unwrap();
    let text = body(&file.bytes);

    assert!(text.starts_with(
        "Movement ID,Item,Quantity,From Location,To Location,Date,Responsible Person"
    ));
    assert!(text.contains(",Candle,3,Sacristy,Loft,"));
    assert!(text.contains(",Candle,5,N/A,Sacristy,2023-12-24 00:00,Jo"));
}

#[tokio::test]
async fn test_history_exports_list_newest_first() {
    let pool = test_pool().await;

    // Older rows are imported last so id order and date order disagree
    let csv = "Name,Quantity,MovementDate,ResponsiblePerson,ToLocation\n\
               Candle,1,2024-01-01,Newer,Sacristy\n\
               Candle,2,2023-01-01,Older,Sacristy\n";
    import_csv(&pool, &clerk(), ImportContext::Movements, csv.as_bytes())
        .await
        .unwrap();
    let csv = "Name,Location,Quantity,DisposalDate,Reason\n\
               Chair,Hall,1,2024-01-01,Newer\n\
               Chair,Hall,2,2023-01-01,Older\n";
    import_csv(&pool, &clerk(), ImportContext::Disposals, csv.as_bytes())
        .await
        .unwrap();

    for kind in [ExportKind::Movements, ExportKind::Disposals] {
        let file = export::export(&pool, kind, Utc::now()).await.unwrap();
        let text = body(&file.bytes);
        let newer = text.find("Newer").expect("newer row");
        let older = text.find("Older").expect("older row");
        assert!(newer < older, "{text}");
    }
}

#[tokio::test]
async fn test_export_all_zips_three_files() {
    let pool = test_pool().await;
    add_stock(&pool, "Candle", "Sacristy", 1).await;
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap();

    let file = export::export(&pool, ExportKind::All, now).await.unwrap();
    assert_eq!(file.filename, "export_all_20240601_093000.zip");
    assert_eq!(file.content_type, "application/zip");

    let archive = zip::ZipArchive::new(Cursor::new(file.bytes)).unwrap();
    let mut names: Vec<_> = archive.file_names().map(str::to_owned).collect();
    names.sort();
    assert_eq!(
        names,
        [
            "disposals_20240601_093000.csv",
            "inventory_20240601_093000.csv",
            "movements_20240601_093000.csv",
        ]
    );
}
