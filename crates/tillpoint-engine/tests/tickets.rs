//! Repair parts, desk payments and hand-over.

mod common;

use common::*;
use tillpoint_core::{
    CommerceError, Currency, ErrorKind, PaymentMethod, StockMovement, TicketStatus,
};
use tillpoint_engine::DomainEvent;

#[tokio::test]
async fn test_parts_come_out_of_stock_and_go_back() {
    let engine = engine_with_session().await;
    let screen = product(&engine, "SCREEN-A10", 5_000, 3).await;
    let repair = labor_ticket(&engine, "T-0100", 2_000).await;

    let part = engine
        .add_ticket_part(OPERATOR, &repair.id, &screen.id, 2)
        .await
        .unwrap();
    assert_eq!(part.unit_cost_cents, 5_000);
    assert_eq!(part.product_id.as_deref(), Some(screen.id.as_str()));
    assert_eq!(quantity(&engine, &screen.id).await, 1);
    assert_eq!(reload_ticket(&engine, &repair.id).await.total_cost(), base(12_000));

    let err = engine
        .add_ticket_part(OPERATOR, &repair.id, &screen.id, 2)
        .await
        .unwrap_err();
    assert!(matches!(
        err.as_commerce(),
        Some(CommerceError::InsufficientStock { available: 1, requested: 2, .. })
    ));
    assert_eq!(quantity(&engine, &screen.id).await, 1);

    let removed = engine
        .remove_ticket_part(OPERATOR, &repair.id, &part.id)
        .await
        .unwrap();
    assert_eq!(removed.quantity, 2);
    assert_eq!(quantity(&engine, &screen.id).await, 3);
    assert_eq!(reload_ticket(&engine, &repair.id).await.total_cost(), base(2_000));

    let mut uow = engine.database().begin_read().await.unwrap();
    let log = uow.stock().log_for(&screen.id).await.unwrap();
    uow.rollback().await.unwrap();
    let for_ticket: Vec<_> = log
        .iter()
        .filter(|e| e.reference_id.as_deref() == Some(repair.id.as_str()))
        .map(|e| (e.movement, e.delta))
        .collect();
    assert_eq!(for_ticket, vec![(StockMovement::Sale, -2), (StockMovement::Return, 2)]);

    // the part is gone
    let err = engine
        .remove_ticket_part(OPERATOR, &repair.id, &part.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_desk_payment_delivers_when_paid_off() {
    let engine = engine_with_session().await;
    let repair = ticket(&engine, "T-0101", 3_000).await;
    let mut events = engine.subscribe().expect("broadcast emitter");

    let first = engine
        .pay_ticket(OPERATOR, &repair.id, base(1_000), PaymentMethod::Cash, Currency::Base)
        .await
        .unwrap();
    assert!(!first.delivered);
    assert_eq!(first.applied, base(1_000));
    assert_eq!(first.balance_after, base(2_000));
    assert_eq!(first.ticket.paid_cents, 1_000);
    assert_ne!(first.ticket.status, TicketStatus::Delivered);
    assert!(events.try_recv().is_err());

    let err = engine
        .pay_ticket(OPERATOR, &repair.id, base(5_000), PaymentMethod::Cash, Currency::Base)
        .await
        .unwrap_err();
    assert!(matches!(err.as_commerce(), Some(CommerceError::OverPayment { .. })));

    // 730.00 secondary is the remaining 20.00 base
    let last = engine
        .pay_ticket(OPERATOR, &repair.id, base(73_000), PaymentMethod::Cash, Currency::Secondary)
        .await
        .unwrap();
    assert!(last.delivered);
    assert_eq!(last.applied, base(2_000));
    assert_eq!(last.tendered.secondary, base(73_000));
    assert_eq!(last.ticket.status, TicketStatus::Delivered);
    assert!(last.ticket.warranty_expires_at.is_some());

    match events.recv().await.unwrap() {
        DomainEvent::TicketDelivered { ticket_id, sale_id, .. } => {
            assert_eq!(ticket_id, repair.id);
            assert!(sale_id.is_none());
        }
        other => panic!("unexpected event {other:?}"),
    }

    let drawer = expected(&engine).await;
    assert_eq!(drawer.base, base(11_000));
    assert_eq!(drawer.secondary, base(73_000));
    assert_ledger_law(&engine).await;

    let err = engine
        .pay_ticket(OPERATOR, &repair.id, base(100), PaymentMethod::Cash, Currency::Base)
        .await
        .unwrap_err();
    assert!(matches!(err.as_commerce(), Some(CommerceError::NothingToSettle)));
}

#[tokio::test]
async fn test_paid_ticket_is_delivered_at_the_counter() {
    let engine = engine_with_session().await;
    let screen = product(&engine, "SCREEN-A10", 5_000, 3).await;
    let repair = labor_ticket(&engine, "T-0102", 1_000).await;

    let part = engine
        .add_ticket_part(OPERATOR, &repair.id, &screen.id, 1)
        .await
        .unwrap();
    engine
        .pay_ticket(OPERATOR, &repair.id, base(1_000), PaymentMethod::Cash, Currency::Base)
        .await
        .unwrap();

    let err = engine.deliver_ticket(OPERATOR, &repair.id).await.unwrap_err();
    match err.as_commerce() {
        Some(CommerceError::TicketNotPaid { outstanding, .. }) => {
            assert_eq!(*outstanding, base(5_000));
        }
        other => panic!("expected TicketNotPaid, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Precondition);

    // the part was not needed after all; labor is already paid
    engine
        .remove_ticket_part(OPERATOR, &repair.id, &part.id)
        .await
        .unwrap();
    let delivered = engine.deliver_ticket(OPERATOR, &repair.id).await.unwrap();
    assert_eq!(delivered.status, TicketStatus::Delivered);
    assert!(delivered.warranty_expires_at.unwrap() > delivered.delivered_at.unwrap());

    let mut uow = engine.database().begin_read().await.unwrap();
    let log = uow.tickets().status_log(&repair.id).await.unwrap();
    uow.rollback().await.unwrap();
    assert_eq!(log.last().map(|e| e.to_status), Some(TicketStatus::Delivered));

    let err = engine.deliver_ticket(OPERATOR, &repair.id).await.unwrap_err();
    assert!(matches!(err.as_commerce(), Some(CommerceError::TicketClosed { .. })));
    let err = engine
        .add_ticket_part(OPERATOR, &repair.id, &screen.id, 1)
        .await
        .unwrap_err();
    assert!(matches!(err.as_commerce(), Some(CommerceError::TicketClosed { .. })));
    assert_eq!(quantity(&engine, &screen.id).await, 3);
}

#[tokio::test]
async fn test_cancelled_ticket_refuses_payment_but_returns_parts() {
    let engine = engine_with_session().await;
    let screen = product(&engine, "SCREEN-A10", 5_000, 3).await;
    let repair = labor_ticket(&engine, "T-0103", 1_000).await;
    let part = engine
        .add_ticket_part(OPERATOR, &repair.id, &screen.id, 1)
        .await
        .unwrap();

    sqlx::query("UPDATE service_tickets SET status = 'cancelled' WHERE id = ?1")
        .bind(&repair.id)
        .execute(engine.database().pool())
        .await
        .unwrap();

    let err = engine
        .pay_ticket(OPERATOR, &repair.id, base(500), PaymentMethod::Cash, Currency::Base)
        .await
        .unwrap_err();
    assert!(matches!(err.as_commerce(), Some(CommerceError::TicketNotSettleable { .. })));
    let err = engine
        .add_ticket_part(OPERATOR, &repair.id, &screen.id, 1)
        .await
        .unwrap_err();
    assert!(matches!(err.as_commerce(), Some(CommerceError::TicketClosed { .. })));

    engine
        .remove_ticket_part(OPERATOR, &repair.id, &part.id)
        .await
        .unwrap();
    assert_eq!(quantity(&engine, &screen.id).await, 3);
    assert_eq!(expected_base(&engine).await, base(10_000));
}
