//! Shared setup for engine integration tests.

#![allow(dead_code)]

use chrono::Utc;
use tillpoint_core::{Currency, DualMoney, Money, Product, Rate, Sale, ServiceTicket};
use tillpoint_db::NewTicket;
use tillpoint_engine::{CheckoutReceipt, Engine, EngineConfig};

pub const OPERATOR: &str = "op-ana";

/// 36.50 secondary units per base unit.
pub const RATE_MICROS: i64 = 36_500_000;

pub fn base(cents: i64) -> Money {
    Money::from_cents(cents)
}

/// Engine over a fresh in-memory database with an active rate.
pub async fn engine() -> Engine {
    let engine = Engine::connect(EngineConfig::in_memory()).await.unwrap();
    engine
        .set_active_rate(Rate::from_micros(RATE_MICROS), "test", Utc::now().date_naive())
        .await
        .unwrap();
    engine
}

/// Engine plus an open session for [`OPERATOR`] with 100.00 base float.
pub async fn engine_with_session() -> Engine {
    let engine = engine().await;
    engine
        .open_session(OPERATOR, DualMoney::from_cents(10_000, 0), None)
        .await
        .unwrap();
    engine
}

/// The sale a checkout wrote; panics on a no-op receipt.
pub fn sold(receipt: &CheckoutReceipt) -> &Sale {
    receipt.sale.as_ref().expect("checkout wrote a sale")
}

pub async fn product(engine: &Engine, sku: &str, price_cents: i64, stock: i64) -> Product {
    let mut uow = engine.database().begin().await.unwrap();
    let product = uow
        .products()
        .insert(sku, &format!("Product {sku}"), base(price_cents), base(price_cents / 2))
        .await
        .unwrap();
    uow.stock().create(&product.id, stock, 1, "seed").await.unwrap();
    uow.commit().await.unwrap();
    product
}

pub async fn customer(engine: &Engine, terms_days: i64) -> String {
    let mut uow = engine.database().begin().await.unwrap();
    let customer = uow.customers().insert("Maria Perez", terms_days).await.unwrap();
    uow.commit().await.unwrap();
    customer.id
}

pub async fn supplier(engine: &Engine, terms_days: i64) -> String {
    let mut uow = engine.database().begin().await.unwrap();
    let supplier = uow.suppliers().insert("Parts Wholesale", terms_days).await.unwrap();
    uow.commit().await.unwrap();
    supplier.id
}

pub async fn ticket(engine: &Engine, number: &str, final_cost_cents: i64) -> ServiceTicket {
    let mut uow = engine.database().begin().await.unwrap();
    let ticket = uow
        .tickets()
        .insert(
            &NewTicket {
                ticket_number: number.to_string(),
                device_description: "Phone, cracked screen".to_string(),
                final_cost: base(final_cost_cents),
                ..NewTicket::default()
            },
            "seed",
        )
        .await
        .unwrap();
    uow.commit().await.unwrap();
    ticket
}

/// Ticket priced by labor plus parts (no final or estimated cost).
pub async fn labor_ticket(engine: &Engine, number: &str, labor_cents: i64) -> ServiceTicket {
    let mut uow = engine.database().begin().await.unwrap();
    let ticket = uow
        .tickets()
        .insert(
            &NewTicket {
                ticket_number: number.to_string(),
                device_description: "Laptop, no power".to_string(),
                labor_cost: base(labor_cents),
                ..NewTicket::default()
            },
            "seed",
        )
        .await
        .unwrap();
    uow.commit().await.unwrap();
    ticket
}

pub async fn reload_ticket(engine: &Engine, ticket_id: &str) -> ServiceTicket {
    let mut uow = engine.database().begin_read().await.unwrap();
    let ticket = uow.tickets().get(ticket_id).await.unwrap().unwrap();
    uow.rollback().await.unwrap();
    ticket
}

pub async fn quantity(engine: &Engine, product_id: &str) -> i64 {
    let mut uow = engine.database().begin_read().await.unwrap();
    let item = uow.stock().get(product_id).await.unwrap().unwrap();
    uow.rollback().await.unwrap();
    item.quantity
}

pub async fn expected(engine: &Engine) -> DualMoney {
    engine.current_session(OPERATOR).await.unwrap().unwrap().expected()
}

pub async fn expected_base(engine: &Engine) -> Money {
    expected(engine).await.get(Currency::Base)
}

/// Asserts the running totals equal the ledger, the way close-out checks it.
pub async fn assert_ledger_law(engine: &Engine) {
    let session = engine.current_session(OPERATOR).await.unwrap().unwrap();
    let summary = engine.session_summary(&session.id).await.unwrap();
    assert!(summary.reconciled, "running totals drifted from ledger: {summary:?}");
}
