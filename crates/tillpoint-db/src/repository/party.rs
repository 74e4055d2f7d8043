//! # Party Repositories
//!
//! Customers and suppliers: payment terms and the running debt counter.
//! The counter never drops below zero (`MAX(0, ...)`), matching the CHECK
//! on the column.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tillpoint_core::{Customer, Money, Supplier};

// =============================================================================
// Customers
// =============================================================================

pub struct CustomerRepository<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> CustomerRepository<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        CustomerRepository { conn }
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT id, name, payment_terms_days, current_debt_cents, created_at \
             FROM customers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(customer)
    }

    pub async fn insert(&mut self, name: &str, payment_terms_days: i64) -> DbResult<Customer> {
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            payment_terms_days,
            current_debt_cents: 0,
            created_at: Utc::now(),
        };

        debug!(id = %customer.id, name = %customer.name, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (id, name, payment_terms_days, current_debt_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(customer.payment_terms_days)
        .bind(customer.current_debt_cents)
        .bind(customer.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(customer)
    }

    /// Moves the debt counter by `delta`, floored at zero. Returns the new value.
    pub async fn adjust_debt(&mut self, id: &str, delta: Money) -> DbResult<Money> {
        let debt: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE customers
            SET current_debt_cents = MAX(0, current_debt_cents + ?2)
            WHERE id = ?1
            RETURNING current_debt_cents
            "#,
        )
        .bind(id)
        .bind(delta.cents())
        .fetch_optional(&mut *self.conn)
        .await?;

        debt.map(Money::from_cents)
            .ok_or_else(|| DbError::not_found("Customer", id))
    }
}

// =============================================================================
// Suppliers
// =============================================================================

pub struct SupplierRepository<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> SupplierRepository<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        SupplierRepository { conn }
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>(
            "SELECT id, name, payment_terms_days, current_debt_cents, created_at \
             FROM suppliers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(supplier)
    }

    pub async fn insert(&mut self, name: &str, payment_terms_days: i64) -> DbResult<Supplier> {
        let supplier = Supplier {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            payment_terms_days,
            current_debt_cents: 0,
            created_at: Utc::now(),
        };

        debug!(id = %supplier.id, name = %supplier.name, "Inserting supplier");

        sqlx::query(
            r#"
            INSERT INTO suppliers (id, name, payment_terms_days, current_debt_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(supplier.payment_terms_days)
        .bind(supplier.current_debt_cents)
        .bind(supplier.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(supplier)
    }

    /// What the business owes this supplier, floored at zero.
    pub async fn adjust_debt(&mut self, id: &str, delta: Money) -> DbResult<Money> {
        let debt: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE suppliers
            SET current_debt_cents = MAX(0, current_debt_cents + ?2)
            WHERE id = ?1
            RETURNING current_debt_cents
            "#,
        )
        .bind(id)
        .bind(delta.cents())
        .fetch_optional(&mut *self.conn)
        .await?;

        debt.map(Money::from_cents)
            .ok_or_else(|| DbError::not_found("Supplier", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_debt_counter_floors_at_zero() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();

        let c = uow.customers().insert("Rosa Díaz", 30).await.unwrap();
        let debt = uow.customers().adjust_debt(&c.id, Money::from_cents(1500)).await.unwrap();
        assert_eq!(debt.cents(), 1500);
        let debt = uow.customers().adjust_debt(&c.id, Money::from_cents(-2000)).await.unwrap();
        assert_eq!(debt, Money::zero());

        let s = uow.suppliers().insert("Parts Wholesale", 15).await.unwrap();
        let owed = uow.suppliers().adjust_debt(&s.id, Money::from_cents(900)).await.unwrap();
        assert_eq!(owed.cents(), 900);
        assert_eq!(uow.suppliers().get(&s.id).await.unwrap().unwrap().payment_terms_days, 15);

        let missing = uow.customers().adjust_debt("nobody", Money::from_cents(1)).await;
        assert!(matches!(missing, Err(DbError::NotFound { .. })));
    }
}
