//! Receivable and payable payments.

mod common;

use chrono::{Duration, Utc};
use common::*;
use tillpoint_core::calendar::due_date;
use tillpoint_core::{
    AccountStatus, CommerceError, Currency, ErrorKind, PaymentMethod, ReceivableAccount,
    SalePaymentStatus,
};
use tillpoint_engine::{CheckoutRequest, DomainEvent, Engine, LedgerSide};

/// Sells 20.00 with 5.00 down; returns the receivable for the other 15.00.
async fn credit_sale(engine: &Engine) -> (String, ReceivableAccount) {
    let cable = product(engine, "CABLE-USB", 1_000, 10).await;
    let customer_id = customer(engine, 30).await;
    let receipt = engine
        .checkout(
            CheckoutRequest::new(OPERATOR)
                .line(&cable.id, 2)
                .customer(&customer_id)
                .tender(Currency::Base, base(500)),
        )
        .await
        .unwrap();
    (customer_id, receipt.receivable.unwrap())
}

#[tokio::test]
async fn test_receivable_paid_in_installments() {
    let engine = engine_with_session().await;
    let (customer_id, account) = credit_sale(&engine).await;
    assert_eq!(expected_base(&engine).await, base(10_500));

    let first = engine
        .register_receivable_payment(
            OPERATOR,
            &account.id,
            base(1_000),
            PaymentMethod::Cash,
            Currency::Base,
        )
        .await
        .unwrap();
    assert_eq!(first.balance_before_cents, 1_500);
    assert_eq!(first.balance_after_cents, 500);
    assert_eq!(expected_base(&engine).await, base(11_500));

    let statement = engine.statement(&customer_id).await.unwrap();
    assert_eq!(statement.accounts.len(), 1);
    assert_eq!(statement.accounts[0].status, AccountStatus::Partial);
    assert_eq!(statement.total_balance, base(500));
    assert_eq!(statement.customer.current_debt_cents, 500);

    // more than what is left
    let err = engine
        .register_receivable_payment(
            OPERATOR,
            &account.id,
            base(600),
            PaymentMethod::Cash,
            Currency::Base,
        )
        .await
        .unwrap_err();
    match err.as_commerce() {
        Some(CommerceError::OverPayment { amount, balance, .. }) => {
            assert_eq!(*amount, base(600));
            assert_eq!(*balance, base(500));
        }
        other => panic!("expected OverPayment, got {other:?}"),
    }

    let mut events = engine.subscribe().unwrap();
    let last = engine
        .register_receivable_payment(
            OPERATOR,
            &account.id,
            base(500),
            PaymentMethod::Cash,
            Currency::Base,
        )
        .await
        .unwrap();
    assert_eq!(last.balance_after_cents, 0);
    match events.recv().await.unwrap() {
        DomainEvent::PaymentRegistered { side, balance_after, .. } => {
            assert_eq!(side, LedgerSide::Receivable);
            assert!(balance_after.is_zero());
        }
        other => panic!("unexpected event {other:?}"),
    }

    let mut uow = engine.database().begin_read().await.unwrap();
    let settled = uow.receivables().get(&account.id).await.unwrap().unwrap();
    let sale = uow.sales().get(account.sale_id.as_deref().unwrap()).await.unwrap().unwrap();
    let payments = uow.receivables().payments(&account.id).await.unwrap();
    uow.rollback().await.unwrap();

    assert_eq!(settled.status, AccountStatus::Paid);
    assert_eq!(sale.status, SalePaymentStatus::Paid);
    assert_eq!(payments.len(), 2);
    assert!(engine.statement(&customer_id).await.unwrap().accounts.is_empty());

    let err = engine
        .register_receivable_payment(
            OPERATOR,
            &account.id,
            base(100),
            PaymentMethod::Cash,
            Currency::Base,
        )
        .await
        .unwrap_err();
    assert!(matches!(err.as_commerce(), Some(CommerceError::AccountAlreadySettled { .. })));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_ledger_law(&engine).await;
}

#[tokio::test]
async fn test_secondary_payment_is_converted() {
    let engine = engine_with_session().await;
    let (_, account) = credit_sale(&engine).await;

    // 365.00 secondary is 10.00 base at 36.50
    let payment = engine
        .register_receivable_payment(
            OPERATOR,
            &account.id,
            base(36_500),
            PaymentMethod::Cash,
            Currency::Secondary,
        )
        .await
        .unwrap();

    assert_eq!(payment.amount_base_cents, 1_000);
    assert_eq!(payment.amount_secondary_cents, 36_500);
    assert_eq!(payment.balance_after_cents, 500);

    let drawer = expected(&engine).await;
    assert_eq!(drawer.base, base(10_500));
    assert_eq!(drawer.secondary, base(36_500));
    assert_ledger_law(&engine).await;
}

#[tokio::test]
async fn test_card_payment_leaves_drawer_alone() {
    let engine = engine_with_session().await;
    let (_, account) = credit_sale(&engine).await;

    engine
        .register_receivable_payment(
            OPERATOR,
            &account.id,
            base(1_500),
            PaymentMethod::Card,
            Currency::Base,
        )
        .await
        .unwrap();

    assert_eq!(expected_base(&engine).await, base(10_500));
}

#[tokio::test]
async fn test_payment_needs_open_session() {
    let engine = engine_with_session().await;
    let (_, account) = credit_sale(&engine).await;

    let err = engine
        .register_receivable_payment(
            "op-luis",
            &account.id,
            base(100),
            PaymentMethod::Cash,
            Currency::Base,
        )
        .await
        .unwrap_err();

    assert!(matches!(err.as_commerce(), Some(CommerceError::NoOpenSession { .. })));
}

#[tokio::test]
async fn test_manual_receivable_and_overdue_statement() {
    let engine = engine().await;
    let customer_id = customer(&engine, 45).await;
    let today = Utc::now().date_naive();

    let current = engine
        .create_receivable(&customer_id, base(4_000), None, Some("Bulk order on account"))
        .await
        .unwrap();
    assert_eq!(current.due_date, due_date(today, 45));
    assert_eq!(current.status, AccountStatus::Pending);
    assert!(current.sale_id.is_none());

    engine
        .create_receivable(&customer_id, base(2_500), Some(today - Duration::days(3)), None)
        .await
        .unwrap();

    let statement = engine.statement(&customer_id).await.unwrap();
    assert_eq!(statement.accounts.len(), 2);
    assert_eq!(statement.total_balance, base(6_500));
    assert_eq!(statement.overdue_balance, base(2_500));
    assert_eq!(statement.customer.current_debt_cents, 6_500);
}

#[tokio::test]
async fn test_payable_paid_from_drawer() {
    let engine = engine_with_session().await;
    let supplier_id = supplier(&engine, 15).await;

    let account = engine
        .create_payable(&supplier_id, base(5_000), None, Some("PO-7781"))
        .await
        .unwrap();
    assert_eq!(account.due_date, due_date(Utc::now().date_naive(), 15));
    assert_eq!(account.status, AccountStatus::Pending);

    let payment = engine
        .register_payable_payment(
            OPERATOR,
            &account.id,
            base(2_000),
            PaymentMethod::Cash,
            Currency::Base,
        )
        .await
        .unwrap();
    assert_eq!(payment.balance_after_cents, 3_000);
    assert_eq!(expected_base(&engine).await, base(8_000));

    let err = engine
        .register_payable_payment(
            OPERATOR,
            &account.id,
            base(3_100),
            PaymentMethod::Cash,
            Currency::Base,
        )
        .await
        .unwrap_err();
    assert!(matches!(err.as_commerce(), Some(CommerceError::OverPayment { .. })));

    engine
        .register_payable_payment(
            OPERATOR,
            &account.id,
            base(3_000),
            PaymentMethod::Transfer,
            Currency::Base,
        )
        .await
        .unwrap();

    let mut uow = engine.database().begin_read().await.unwrap();
    let settled = uow.payables().get(&account.id).await.unwrap().unwrap();
    let supplier = uow.suppliers().get(&supplier_id).await.unwrap().unwrap();
    uow.rollback().await.unwrap();

    assert_eq!(settled.status, AccountStatus::Paid);
    assert_eq!(supplier.current_debt_cents, 0);
    // the transfer did not touch the drawer
    assert_eq!(expected_base(&engine).await, base(8_000));
    assert_ledger_law(&engine).await;
}

#[tokio::test]
async fn test_unknown_account_is_not_found() {
    let engine = engine_with_session().await;

    let err = engine
        .register_payable_payment(
            OPERATOR,
            "no-such-account",
            base(100),
            PaymentMethod::Cash,
            Currency::Base,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}
