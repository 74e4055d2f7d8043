//! Checkout across stock, drawer, receivables and tickets.

mod common;

use chrono::Utc;
use common::*;
use tillpoint_core::calendar::due_date;
use tillpoint_core::{
    AccountStatus, CommerceError, Currency, ErrorKind, SalePaymentStatus, StockMovement,
    TicketStatus,
};
use tillpoint_engine::{CheckoutRequest, DomainEvent};

#[tokio::test]
async fn test_cash_sale_moves_stock_and_drawer() {
    let engine = engine_with_session().await;
    let cable = product(&engine, "CABLE-USB", 1_000, 10).await;

    let receipt = engine
        .checkout(CheckoutRequest::new(OPERATOR).line(&cable.id, 2))
        .await
        .unwrap();

    assert_eq!(sold(&receipt).total_base_cents, 2_000);
    assert_eq!(sold(&receipt).status, SalePaymentStatus::Paid);
    assert_eq!(sold(&receipt).pending_base_cents, 0);
    assert_eq!(receipt.lines.len(), 1);
    assert_eq!(receipt.lines[0].unit_price_cents, 1_000);
    assert!(receipt.receivable.is_none());

    assert_eq!(quantity(&engine, &cable.id).await, 8);
    assert_eq!(expected_base(&engine).await, base(12_000));
    assert_ledger_law(&engine).await;
}

#[tokio::test]
async fn test_partial_tender_opens_receivable() {
    let engine = engine_with_session().await;
    let cable = product(&engine, "CABLE-USB", 1_000, 10).await;
    let customer_id = customer(&engine, 30).await;

    let receipt = engine
        .checkout(
            CheckoutRequest::new(OPERATOR)
                .line(&cable.id, 2)
                .customer(&customer_id)
                .tender(Currency::Base, base(500)),
        )
        .await
        .unwrap();

    assert_eq!(sold(&receipt).status, SalePaymentStatus::Partial);
    assert_eq!(sold(&receipt).applied_base_cents, 500);
    assert_eq!(sold(&receipt).pending_base_cents, 1_500);

    let account = receipt.receivable.as_ref().expect("receivable for the pending amount");
    assert_eq!(account.total(), base(2_000));
    assert_eq!(account.paid(), base(500));
    assert_eq!(account.balance(), base(1_500));
    assert_eq!(account.status, AccountStatus::Partial);
    assert_eq!(account.due_date, due_date(Utc::now().date_naive(), 30));
    assert_eq!(account.sale_id.as_deref(), Some(sold(&receipt).id.as_str()));

    let statement = engine.statement(&customer_id).await.unwrap();
    assert_eq!(statement.total_balance, base(1_500));
    assert_eq!(statement.customer.current_debt_cents, 1_500);

    // only what was handed over reaches the drawer
    assert_eq!(expected_base(&engine).await, base(10_500));
    assert_ledger_law(&engine).await;
}

#[tokio::test]
async fn test_partial_secondary_tender_leaves_base_receivable() {
    let engine = engine_with_session().await;
    let cable = product(&engine, "CABLE-USB", 1_000, 10).await;
    let customer_id = customer(&engine, 30).await;

    // 365.00 secondary is 10.00 base at 36.50
    let receipt = engine
        .checkout(
            CheckoutRequest::new(OPERATOR)
                .line(&cable.id, 2)
                .customer(&customer_id)
                .tender(Currency::Secondary, base(36_500)),
        )
        .await
        .unwrap();

    let sale = sold(&receipt);
    assert_eq!(sale.currency, Currency::Secondary);
    assert_eq!(sale.status, SalePaymentStatus::Partial);
    assert_eq!(sale.applied_base_cents, 1_000);
    assert_eq!(sale.pending_base_cents, 1_000);

    let account = receipt.receivable.clone().expect("receivable for the shortfall");
    assert_eq!(account.total(), base(2_000));
    assert_eq!(account.balance(), base(1_000));
    assert_eq!(account.due_date, due_date(Utc::now().date_naive(), 30));

    let drawer = expected(&engine).await;
    assert_eq!(drawer.base, base(10_000));
    assert_eq!(drawer.secondary, base(36_500));
    assert_ledger_law(&engine).await;
}

#[tokio::test]
async fn test_credit_without_customer_is_rejected() {
    let engine = engine_with_session().await;
    let cable = product(&engine, "CABLE-USB", 1_000, 10).await;

    let err = engine
        .checkout(
            CheckoutRequest::new(OPERATOR)
                .line(&cable.id, 1)
                .tender(Currency::Base, base(400)),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err.as_commerce(),
        Some(CommerceError::CustomerRequiredForCredit { pending }) if *pending == base(600)
    ));
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert_eq!(quantity(&engine, &cable.id).await, 10);
    assert_eq!(expected_base(&engine).await, base(10_000));
}

#[tokio::test]
async fn test_failed_line_rolls_back_whole_checkout() {
    let engine = engine_with_session().await;
    let cable = product(&engine, "CABLE-USB", 1_000, 10).await;
    let screen = product(&engine, "SCREEN-A10", 5_000, 1).await;

    let err = engine
        .checkout(
            CheckoutRequest::new(OPERATOR)
                .line(&cable.id, 3)
                .line(&screen.id, 2),
        )
        .await
        .unwrap_err();

    match err.as_commerce() {
        Some(CommerceError::InsufficientStock {
            sku,
            available,
            requested,
            ..
        }) => {
            assert_eq!(sku, "SCREEN-A10");
            assert_eq!(*available, 1);
            assert_eq!(*requested, 2);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // the first line's reservation did not survive
    assert_eq!(quantity(&engine, &cable.id).await, 10);
    assert_eq!(quantity(&engine, &screen.id).await, 1);
    assert_eq!(expected_base(&engine).await, base(10_000));

    let session = engine.current_session(OPERATOR).await.unwrap().unwrap();
    let mut uow = engine.database().begin_read().await.unwrap();
    assert!(uow.sales().for_session(&session.id).await.unwrap().is_empty());
    let log = uow.stock().log_for(&cable.id).await.unwrap();
    assert!(log.iter().all(|e| e.movement == StockMovement::Receipt));
    uow.rollback().await.unwrap();
}

#[tokio::test]
async fn test_secondary_tender_lands_in_secondary_drawer() {
    let engine = engine_with_session().await;
    let cable = product(&engine, "CABLE-USB", 1_000, 10).await;

    let receipt = engine
        .checkout(
            CheckoutRequest::new(OPERATOR)
                .line(&cable.id, 1)
                .exact_tender(Currency::Secondary),
        )
        .await
        .unwrap();

    assert_eq!(sold(&receipt).currency, Currency::Secondary);
    assert_eq!(sold(&receipt).total_secondary_cents, 36_500);
    assert_eq!(sold(&receipt).rate_micros, RATE_MICROS);

    let drawer = expected(&engine).await;
    assert_eq!(drawer.base, base(10_000));
    assert_eq!(drawer.secondary, base(36_500));
    assert_ledger_law(&engine).await;
}

#[tokio::test]
async fn test_overtender_gives_change() {
    let engine = engine_with_session().await;
    let cable = product(&engine, "CABLE-USB", 1_000, 10).await;

    let receipt = engine
        .checkout(
            CheckoutRequest::new(OPERATOR)
                .line(&cable.id, 2)
                .tender(Currency::Base, base(5_000)),
        )
        .await
        .unwrap();

    assert_eq!(sold(&receipt).tendered_cents, 5_000);
    assert_eq!(sold(&receipt).change_cents, 3_000);
    assert_eq!(expected_base(&engine).await, base(12_000));
}

#[tokio::test]
async fn test_ticket_paid_in_full_is_delivered_once() {
    let engine = engine_with_session().await;
    let repair = ticket(&engine, "T-0001", 3_000).await;

    let receipt = engine
        .checkout(CheckoutRequest::new(OPERATOR).ticket(&repair.id))
        .await
        .unwrap();

    assert_eq!(sold(&receipt).total_base_cents, 3_000);
    assert_eq!(receipt.allocations.len(), 1);
    assert_eq!(receipt.allocations[0].amount_cents, 3_000);
    assert_eq!(receipt.delivered_tickets.len(), 1);
    let delivered = &receipt.delivered_tickets[0];
    assert_eq!(delivered.status, TicketStatus::Delivered);
    assert!(delivered.warranty_expires_at.unwrap() > delivered.delivered_at.unwrap());
    assert_eq!(expected_base(&engine).await, base(13_000));

    // settling the same ticket again is a no-op
    let again = engine
        .checkout(CheckoutRequest::new(OPERATOR).ticket(&repair.id))
        .await
        .unwrap();
    assert!(again.is_noop());
    assert!(again.sale.is_none());
    assert!(again.allocations.is_empty());
    assert!(again.delivered_tickets.is_empty());

    let mut uow = engine.database().begin_read().await.unwrap();
    assert_eq!(uow.sales().allocations_for_ticket(&repair.id).await.unwrap().len(), 1);
    uow.rollback().await.unwrap();
    assert_eq!(expected_base(&engine).await, base(13_000));
    assert_ledger_law(&engine).await;
}

#[tokio::test]
async fn test_partial_ticket_payment_keeps_ticket_open() {
    let engine = engine_with_session().await;
    let repair = ticket(&engine, "T-0002", 3_000).await;
    let customer_id = customer(&engine, 15).await;

    let receipt = engine
        .checkout(
            CheckoutRequest::new(OPERATOR)
                .ticket(&repair.id)
                .customer(&customer_id)
                .tender(Currency::Base, base(1_000)),
        )
        .await
        .unwrap();

    assert!(receipt.delivered_tickets.is_empty());
    assert_eq!(receipt.allocations[0].amount_cents, 1_000);

    let mut uow = engine.database().begin_read().await.unwrap();
    let reloaded = uow.tickets().get(&repair.id).await.unwrap().unwrap();
    uow.rollback().await.unwrap();
    assert_eq!(reloaded.paid_cents, 1_000);
    assert_ne!(reloaded.status, TicketStatus::Delivered);
}

#[tokio::test]
async fn test_checkout_requires_open_session() {
    let engine = engine().await;
    let cable = product(&engine, "CABLE-USB", 1_000, 10).await;

    let err = engine
        .checkout(CheckoutRequest::new("op-nobody").line(&cable.id, 1))
        .await
        .unwrap_err();

    assert!(matches!(err.as_commerce(), Some(CommerceError::NoOpenSession { .. })));
    assert_eq!(quantity(&engine, &cable.id).await, 10);
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let engine = engine_with_session().await;

    let err = engine
        .checkout(CheckoutRequest::new(OPERATOR).line("no-such-product", 1))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_events_follow_commit() {
    let engine = engine_with_session().await;
    let cable = product(&engine, "CABLE-USB", 1_000, 10).await;
    let mut events = engine.subscribe().expect("broadcast emitter");

    let receipt = engine
        .checkout(CheckoutRequest::new(OPERATOR).line(&cable.id, 1))
        .await
        .unwrap();

    match events.recv().await.unwrap() {
        DomainEvent::SaleCompleted { sale_id, total, .. } => {
            assert_eq!(sale_id, sold(&receipt).id);
            assert_eq!(total.base, base(1_000));
        }
        other => panic!("unexpected event {other:?}"),
    }

    let mut uow = engine.database().begin_read().await.unwrap();
    let pending = uow.outbox().pending(10).await.unwrap();
    uow.rollback().await.unwrap();
    let sale_id = &sold(&receipt).id;
    assert!(pending
        .iter()
        .any(|e| e.event_type == "sale_completed" && &e.aggregate_id == sale_id));

    // a failed checkout publishes nothing
    let _ = engine
        .checkout(CheckoutRequest::new(OPERATOR).line(&cable.id, 500))
        .await
        .unwrap_err();
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_outbox_replay_reemits_pending_events() {
    let engine = engine_with_session().await;
    let cable = product(&engine, "CABLE-USB", 1_000, 10).await;

    let receipt = engine
        .checkout(CheckoutRequest::new(OPERATOR).line(&cable.id, 1))
        .await
        .unwrap();
    let sale_id = sold(&receipt).id.clone();

    // a subscriber that joins late catches up from the outbox
    let mut events = engine.subscribe().expect("broadcast emitter");
    let replayed = engine.publish_pending(100).await.unwrap();
    assert!(replayed >= 1);

    let mut saw_sale = false;
    while let Ok(event) = events.try_recv() {
        if let DomainEvent::SaleCompleted { sale_id: id, .. } = event {
            saw_sale |= id == sale_id;
        }
    }
    assert!(saw_sale);

    let mut uow = engine.database().begin_read().await.unwrap();
    let pending = uow.outbox().pending(100).await.unwrap();
    uow.rollback().await.unwrap();
    assert!(pending.is_empty());

    assert_eq!(engine.publish_pending(100).await.unwrap(), 0);
}
