//! # Account Repositories
//!
//! Receivables (owed to the business) and payables (owed by it), with
//! their append-only payment histories.
//!
//! ## Balance Law
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  paid + balance == total           (balance is never stored)            │
//! │  0 <= paid <= total                (CHECK on both tables)               │
//! │  status == derive(total, paid)     (written together with paid)         │
//! │                                                                         │
//! │  every payment row snapshots balance_before / balance_after             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tillpoint_core::{
    AccountStatus, AppliedPayment, CustomerPayment, Money, PayableAccount, ReceivableAccount,
    SupplierPayment,
};

const RECEIVABLE_COLUMNS: &str = "id, customer_id, sale_id, total_cents, paid_cents, \
    due_date, status, notes, created_at, updated_at";

const PAYABLE_COLUMNS: &str = "id, supplier_id, purchase_reference, total_cents, paid_cents, \
    due_date, status, notes, created_at, updated_at";

const PAYMENT_COLUMNS: &str = r#"
    id, account_id, {party}, session_id, currency, method,
    amount_base_cents, amount_secondary_cents, rate_micros,
    balance_before_cents, balance_after_cents, created_at
"#;

fn payment_columns(party: &str) -> String {
    PAYMENT_COLUMNS.replace("{party}", party)
}

// =============================================================================
// Receivables
// =============================================================================

/// Fields for a new receivable.
#[derive(Debug, Clone)]
pub struct NewReceivable {
    pub customer_id: String,
    pub sale_id: Option<String>,
    pub total: Money,
    pub paid: Money,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}

pub struct ReceivableRepository<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> ReceivableRepository<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        ReceivableRepository { conn }
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<ReceivableAccount>> {
        let sql = format!("SELECT {RECEIVABLE_COLUMNS} FROM receivables WHERE id = ?1");
        let account = sqlx::query_as::<_, ReceivableAccount>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(account)
    }

    /// Unsettled accounts of a customer, earliest due first.
    pub async fn open_for_customer(
        &mut self,
        customer_id: &str,
    ) -> DbResult<Vec<ReceivableAccount>> {
        let sql = format!(
            "SELECT {RECEIVABLE_COLUMNS} FROM receivables \
             WHERE customer_id = ?1 AND status <> ?2 ORDER BY due_date, rowid"
        );
        let accounts = sqlx::query_as::<_, ReceivableAccount>(&sql)
            .bind(customer_id)
            .bind(AccountStatus::Paid)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(accounts)
    }

    pub async fn insert(&mut self, new: &NewReceivable) -> DbResult<ReceivableAccount> {
        let now = Utc::now();
        let account = ReceivableAccount {
            id: Uuid::new_v4().to_string(),
            customer_id: new.customer_id.clone(),
            sale_id: new.sale_id.clone(),
            total_cents: new.total.cents(),
            paid_cents: new.paid.cents(),
            due_date: new.due_date,
            status: AccountStatus::derive(new.total, new.paid),
            notes: new.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        debug!(
            id = %account.id,
            customer_id = %account.customer_id,
            total = account.total_cents,
            "Inserting receivable"
        );

        sqlx::query(
            r#"
            INSERT INTO receivables (
                id, customer_id, sale_id, total_cents, paid_cents,
                due_date, status, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&account.id)
        .bind(&account.customer_id)
        .bind(&account.sale_id)
        .bind(account.total_cents)
        .bind(account.paid_cents)
        .bind(account.due_date)
        .bind(account.status)
        .bind(&account.notes)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(account)
    }

    /// Writes the outcome of [`tillpoint_core::apply_payment`].
    pub async fn apply_payment(
        &mut self,
        id: &str,
        applied: &AppliedPayment,
    ) -> DbResult<ReceivableAccount> {
        let result = sqlx::query(
            "UPDATE receivables SET paid_cents = ?2, status = ?3, updated_at = ?4 WHERE id = ?1",
        )
            .bind(id)
            .bind(applied.new_paid.cents())
            .bind(applied.status)
            .bind(Utc::now())
            .execute(&mut *self.conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ReceivableAccount", id));
        }
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("ReceivableAccount", id))
    }

    pub async fn insert_payment(&mut self, payment: &CustomerPayment) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customer_payments (
                id, account_id, customer_id, session_id, currency, method,
                amount_base_cents, amount_secondary_cents, rate_micros,
                balance_before_cents, balance_after_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.account_id)
        .bind(&payment.customer_id)
        .bind(&payment.session_id)
        .bind(payment.currency)
        .bind(payment.method)
        .bind(payment.amount_base_cents)
        .bind(payment.amount_secondary_cents)
        .bind(payment.rate_micros)
        .bind(payment.balance_before_cents)
        .bind(payment.balance_after_cents)
        .bind(payment.created_at)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    pub async fn payments(&mut self, account_id: &str) -> DbResult<Vec<CustomerPayment>> {
        let sql = format!(
            "SELECT {} FROM customer_payments WHERE account_id = ?1 ORDER BY rowid",
            payment_columns("customer_id")
        );
        let rows = sqlx::query_as::<_, CustomerPayment>(&sql)
            .bind(account_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows)
    }
}

// =============================================================================
// Payables
// =============================================================================

/// Fields for a new payable.
#[derive(Debug, Clone)]
pub struct NewPayable {
    pub supplier_id: String,
    pub purchase_reference: Option<String>,
    pub total: Money,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}

pub struct PayableRepository<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> PayableRepository<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        PayableRepository { conn }
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<PayableAccount>> {
        let sql = format!("SELECT {PAYABLE_COLUMNS} FROM payables WHERE id = ?1");
        let account = sqlx::query_as::<_, PayableAccount>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(account)
    }

    /// The payable a supplier's purchase was booked under, if any.
    pub async fn find_by_reference(
        &mut self,
        supplier_id: &str,
        purchase_reference: &str,
    ) -> DbResult<Option<PayableAccount>> {
        let sql = format!(
            "SELECT {PAYABLE_COLUMNS} FROM payables \
             WHERE supplier_id = ?1 AND purchase_reference = ?2"
        );
        let account = sqlx::query_as::<_, PayableAccount>(&sql)
            .bind(supplier_id)
            .bind(purchase_reference)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(account)
    }

    pub async fn insert(&mut self, new: &NewPayable) -> DbResult<PayableAccount> {
        let now = Utc::now();
        let account = PayableAccount {
            id: Uuid::new_v4().to_string(),
            supplier_id: new.supplier_id.clone(),
            purchase_reference: new.purchase_reference.clone(),
            total_cents: new.total.cents(),
            paid_cents: 0,
            due_date: new.due_date,
            status: AccountStatus::Pending,
            notes: new.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        debug!(
            id = %account.id,
            supplier_id = %account.supplier_id,
            total = account.total_cents,
            "Inserting payable"
        );

        sqlx::query(
            r#"
            INSERT INTO payables (
                id, supplier_id, purchase_reference, total_cents, paid_cents,
                due_date, status, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&account.id)
        .bind(&account.supplier_id)
        .bind(&account.purchase_reference)
        .bind(account.total_cents)
        .bind(account.paid_cents)
        .bind(account.due_date)
        .bind(account.status)
        .bind(&account.notes)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(account)
    }

    pub async fn apply_payment(
        &mut self,
        id: &str,
        applied: &AppliedPayment,
    ) -> DbResult<PayableAccount> {
        let result = sqlx::query(
            "UPDATE payables SET paid_cents = ?2, status = ?3, updated_at = ?4 WHERE id = ?1",
        )
            .bind(id)
            .bind(applied.new_paid.cents())
            .bind(applied.status)
            .bind(Utc::now())
            .execute(&mut *self.conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PayableAccount", id));
        }
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("PayableAccount", id))
    }

    pub async fn insert_payment(&mut self, payment: &SupplierPayment) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO supplier_payments (
                id, account_id, supplier_id, session_id, currency, method,
                amount_base_cents, amount_secondary_cents, rate_micros,
                balance_before_cents, balance_after_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.account_id)
        .bind(&payment.supplier_id)
        .bind(&payment.session_id)
        .bind(payment.currency)
        .bind(payment.method)
        .bind(payment.amount_base_cents)
        .bind(payment.amount_secondary_cents)
        .bind(payment.rate_micros)
        .bind(payment.balance_before_cents)
        .bind(payment.balance_after_cents)
        .bind(payment.created_at)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    pub async fn payments(&mut self, account_id: &str) -> DbResult<Vec<SupplierPayment>> {
        let sql = format!(
            "SELECT {} FROM supplier_payments WHERE account_id = ?1 ORDER BY rowid",
            payment_columns("supplier_id")
        );
        let rows = sqlx::query_as::<_, SupplierPayment>(&sql)
            .bind(account_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows)
    }
}
