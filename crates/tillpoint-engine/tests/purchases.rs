//! Supplier deliveries into stock and payables.

mod common;

use chrono::{NaiveDate, Utc};
use common::*;
use tillpoint_core::calendar::due_date;
use tillpoint_core::{AccountStatus, CommerceError, ErrorKind, StockMovement};
use tillpoint_engine::PurchaseLine;

#[tokio::test]
async fn test_received_purchase_fills_stock_and_opens_payable() {
    let engine = engine().await;
    let cable = product(&engine, "CABLE-USB", 1_000, 2).await;
    let screen = product(&engine, "SCREEN-A10", 5_000, 0).await;
    let supplier_id = supplier(&engine, 45).await;

    let receipt = engine
        .receive_purchase(
            OPERATOR,
            &supplier_id,
            "PO-2024-001",
            &[
                PurchaseLine::new(&cable.id, 20, base(400)),
                PurchaseLine::new(&screen.id, 3, base(3_000)),
            ],
            None,
        )
        .await
        .unwrap();

    assert_eq!(receipt.stock.len(), 2);
    assert!(receipt.stock.iter().all(|e| e.movement == StockMovement::Receipt));
    assert_eq!(quantity(&engine, &cable.id).await, 22);
    assert_eq!(quantity(&engine, &screen.id).await, 3);

    let payable = &receipt.payable;
    assert_eq!(payable.total(), base(17_000));
    assert_eq!(payable.status, AccountStatus::Pending);
    assert_eq!(payable.purchase_reference.as_deref(), Some("PO-2024-001"));
    assert_eq!(payable.due_date, due_date(Utc::now().date_naive(), 45));

    let mut uow = engine.database().begin_read().await.unwrap();
    let supplier = uow.suppliers().get(&supplier_id).await.unwrap().unwrap();
    uow.rollback().await.unwrap();
    assert_eq!(supplier.current_debt_cents, 17_000);
}

#[tokio::test]
async fn test_same_purchase_is_not_received_twice() {
    let engine = engine().await;
    let cable = product(&engine, "CABLE-USB", 1_000, 0).await;
    let supplier_id = supplier(&engine, 30).await;
    let lines = [PurchaseLine::new(&cable.id, 10, base(400))];
    let due = NaiveDate::from_ymd_opt(2030, 1, 31);

    let first = engine
        .receive_purchase(OPERATOR, &supplier_id, "PO-7", &lines, due)
        .await
        .unwrap();
    assert_eq!(Some(first.payable.due_date), due);

    let err = engine
        .receive_purchase(OPERATOR, &supplier_id, "PO-7", &lines, due)
        .await
        .unwrap_err();
    match err.as_commerce() {
        Some(CommerceError::PurchaseAlreadyReceived { purchase_reference, .. }) => {
            assert_eq!(purchase_reference, "PO-7");
        }
        other => panic!("expected PurchaseAlreadyReceived, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(quantity(&engine, &cable.id).await, 10);
}

#[tokio::test]
async fn test_unknown_product_rolls_back_the_delivery() {
    let engine = engine().await;
    let cable = product(&engine, "CABLE-USB", 1_000, 5).await;
    let supplier_id = supplier(&engine, 30).await;

    let err = engine
        .receive_purchase(
            OPERATOR,
            &supplier_id,
            "PO-8",
            &[
                PurchaseLine::new(&cable.id, 10, base(400)),
                PurchaseLine::new("no-such-product", 1, base(100)),
            ],
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_eq!(quantity(&engine, &cable.id).await, 5);
    let mut uow = engine.database().begin_read().await.unwrap();
    let supplier = uow.suppliers().get(&supplier_id).await.unwrap().unwrap();
    let booked = uow.payables().find_by_reference(&supplier_id, "PO-8").await.unwrap();
    uow.rollback().await.unwrap();
    assert_eq!(supplier.current_debt_cents, 0);
    assert!(booked.is_none());
}

#[tokio::test]
async fn test_malformed_purchase_is_rejected_before_reading() {
    let engine = engine().await;
    let cable = product(&engine, "CABLE-USB", 1_000, 5).await;
    let supplier_id = supplier(&engine, 30).await;

    for lines in [
        vec![],
        vec![PurchaseLine::new(&cable.id, 0, base(400))],
        vec![PurchaseLine::new(&cable.id, 1, base(-1))],
        vec![PurchaseLine::new(&cable.id, 1, base(0))],
        vec![
            PurchaseLine::new(&cable.id, 1, base(400)),
            PurchaseLine::new(&cable.id, 2, base(400)),
        ],
    ] {
        let err = engine
            .receive_purchase(OPERATOR, &supplier_id, "PO-9", &lines, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{lines:?}");
    }
    assert_eq!(quantity(&engine, &cable.id).await, 5);
}
