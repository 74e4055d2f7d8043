//! # Sale Repository
//!
//! Sales, their lines, ticket allocations and returns.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CHECKOUT (one unit of work)                                         │
//! │     └── next_receipt_number() → YYYYMMDD-NNNN                           │
//! │     └── insert_sale()         → totals, rate, tender frozen             │
//! │     └── insert_line() × N     → price and cost snapshots                │
//! │     └── insert_allocation()   → per settled ticket                      │
//! │                                                                         │
//! │  2. (OPTIONAL) RECEIVABLE SETTLED LATER                                 │
//! │     └── mark_paid()           → status partial → paid                   │
//! │                                (the only column allowed to change)      │
//! │                                                                         │
//! │  3. (OPTIONAL) RETURN                                                   │
//! │     └── returned_quantity()   → guard against over-returning            │
//! │     └── insert_return() + insert_return_line() × N                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use tillpoint_core::{
    Sale, SaleLine, SalePaymentStatus, SaleReturn, SaleReturnLine, TicketAllocation,
};

const SALE_COLUMNS: &str = r#"
    id, receipt_number, session_id, operator_id, customer_id, currency, method,
    total_base_cents, total_secondary_cents, rate_micros,
    tendered_cents, change_cents, applied_base_cents, pending_base_cents,
    status, notes, created_at
"#;

/// Repository for sale database operations.
pub struct SaleRepository<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> SaleRepository<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        SaleRepository { conn }
    }

    /// Next receipt number for `date`: `YYYYMMDD-NNNN`.
    ///
    /// Counted under the unit-of-work write lock, so two checkouts can not
    /// draw the same number.
    pub async fn next_receipt_number(&mut self, date: NaiveDate) -> DbResult<String> {
        let prefix = date.format("%Y%m%d").to_string();
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE receipt_number LIKE ?1 || '-%'")
                .bind(&prefix)
                .fetch_one(&mut *self.conn)
                .await?;
        Ok(format!("{}-{:04}", prefix, count + 1))
    }

    /// Gets a sale by ID.
    pub async fn get(&mut self, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(sale)
    }

    /// Sales rung up in a drawer session.
    pub async fn for_session(&mut self, session_id: &str) -> DbResult<Vec<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE session_id = ?1 ORDER BY rowid");
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(session_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(sales)
    }

    /// Inserts a sale.
    pub async fn insert_sale(&mut self, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, receipt_number = %sale.receipt_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, receipt_number, session_id, operator_id, customer_id, currency, method,
                total_base_cents, total_secondary_cents, rate_micros,
                tendered_cents, change_cents, applied_base_cents, pending_base_cents,
                status, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.receipt_number)
        .bind(&sale.session_id)
        .bind(&sale.operator_id)
        .bind(&sale.customer_id)
        .bind(sale.currency)
        .bind(sale.method)
        .bind(sale.total_base_cents)
        .bind(sale.total_secondary_cents)
        .bind(sale.rate_micros)
        .bind(sale.tendered_cents)
        .bind(sale.change_cents)
        .bind(sale.applied_base_cents)
        .bind(sale.pending_base_cents)
        .bind(sale.status)
        .bind(&sale.notes)
        .bind(sale.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Adds a line to a sale.
    ///
    /// ## Snapshot Pattern
    /// SKU, name, price and cost are copied onto the line so later catalog
    /// edits never change a recorded sale.
    pub async fn insert_line(&mut self, line: &SaleLine) -> DbResult<()> {
        debug!(
            sale_id = %line.sale_id,
            product_id = %line.product_id,
            quantity = line.quantity,
            "Adding sale line"
        );

        sqlx::query(
            r#"
            INSERT INTO sale_lines (
                id, sale_id, product_id, sku_snapshot, name_snapshot,
                quantity, unit_price_cents, unit_cost_cents, line_total_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&line.id)
        .bind(&line.sale_id)
        .bind(&line.product_id)
        .bind(&line.sku_snapshot)
        .bind(&line.name_snapshot)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.unit_cost_cents)
        .bind(line.line_total_cents)
        .bind(line.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Lines of a sale in insertion order.
    pub async fn lines(&mut self, sale_id: &str) -> DbResult<Vec<SaleLine>> {
        let lines = sqlx::query_as::<_, SaleLine>(
            r#"
            SELECT id, sale_id, product_id, sku_snapshot, name_snapshot,
                   quantity, unit_price_cents, unit_cost_cents, line_total_cents, created_at
            FROM sale_lines
            WHERE sale_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(lines)
    }

    /// Records how much of a sale went to a ticket.
    pub async fn insert_allocation(&mut self, allocation: &TicketAllocation) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ticket_allocations (id, sale_id, ticket_id, amount_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&allocation.id)
        .bind(&allocation.sale_id)
        .bind(&allocation.ticket_id)
        .bind(allocation.amount_cents)
        .bind(allocation.created_at)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    /// Every allocation a ticket ever received.
    pub async fn allocations_for_ticket(
        &mut self,
        ticket_id: &str,
    ) -> DbResult<Vec<TicketAllocation>> {
        let rows = sqlx::query_as::<_, TicketAllocation>(
            r#"
            SELECT id, sale_id, ticket_id, amount_cents, created_at
            FROM ticket_allocations
            WHERE ticket_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(ticket_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows)
    }

    /// Flips a partial sale to paid once its receivable is settled.
    pub async fn mark_paid(&mut self, sale_id: &str) -> DbResult<bool> {
        let result = sqlx::query("UPDATE sales SET status = ?2 WHERE id = ?1 AND status <> ?2")
            .bind(sale_id)
            .bind(SalePaymentStatus::Paid)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Returns
    // =========================================================================

    /// Units of `product_id` already returned against a sale.
    pub async fn returned_quantity(&mut self, sale_id: &str, product_id: &str) -> DbResult<i64> {
        let qty: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(l.quantity), 0)
            FROM sale_return_lines l
            INNER JOIN sale_returns r ON r.id = l.return_id
            WHERE r.sale_id = ?1 AND l.product_id = ?2
            "#,
        )
        .bind(sale_id)
        .bind(product_id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(qty)
    }

    pub async fn insert_return(&mut self, ret: &SaleReturn) -> DbResult<()> {
        debug!(id = %ret.id, sale_id = %ret.sale_id, "Inserting sale return");

        sqlx::query(
            r#"
            INSERT INTO sale_returns (
                id, sale_id, session_id, operator_id, currency,
                refund_base_cents, refund_secondary_cents, rate_micros, reason, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&ret.id)
        .bind(&ret.sale_id)
        .bind(&ret.session_id)
        .bind(&ret.operator_id)
        .bind(ret.currency)
        .bind(ret.refund_base_cents)
        .bind(ret.refund_secondary_cents)
        .bind(ret.rate_micros)
        .bind(&ret.reason)
        .bind(ret.created_at)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    pub async fn insert_return_line(&mut self, line: &SaleReturnLine) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sale_return_lines (
                id, return_id, product_id, quantity, unit_price_cents, line_total_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&line.id)
        .bind(&line.return_id)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.line_total_cents)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }
}
