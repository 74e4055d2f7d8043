//! # Stock Repository
//!
//! Quantities on hand and the append-only inventory log.
//!
//! ## Conditional Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE stock_items                                                     │
//! │     SET quantity = quantity + delta                                     │
//! │   WHERE product_id = ? AND quantity + delta >= 0                        │
//! │  RETURNING quantity                                                     │
//! │                                                                         │
//! │  row returned   → applied, log row written with before/after            │
//! │  no row         → re-read quantity: Insufficient { available }          │
//! │                   (or NotFound when the item does not exist)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The check and the write are one statement, so quantity can never go
//! below zero even if two writers raced past the unit-of-work lock.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tillpoint_core::{InventoryLogEntry, StockChange, StockItem, StockMovement};

const STOCK_COLUMNS: &str = r#"
    s.product_id, p.sku, p.name, s.quantity, s.reorder_level, s.updated_at
    FROM stock_items s
    INNER JOIN products p ON p.id = s.product_id
"#;

/// Result of a conditional stock mutation.
#[derive(Debug, Clone)]
pub enum StockOutcome {
    Applied(InventoryLogEntry),
    /// The mutation would have taken quantity below zero.
    Insufficient { available: i64 },
}

impl StockOutcome {
    /// Quantities before and after, when applied.
    pub fn change(&self) -> Option<StockChange> {
        match self {
            StockOutcome::Applied(log) => Some(StockChange {
                before: log.old_quantity,
                after: log.new_quantity,
            }),
            StockOutcome::Insufficient { .. } => None,
        }
    }
}

/// Repository for stock quantities.
pub struct StockRepository<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> StockRepository<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        StockRepository { conn }
    }

    /// Gets the stock row for a product, with SKU and name for messages.
    pub async fn get(&mut self, product_id: &str) -> DbResult<Option<StockItem>> {
        let sql = format!("SELECT {STOCK_COLUMNS} WHERE s.product_id = ?1");
        let item = sqlx::query_as::<_, StockItem>(&sql)
            .bind(product_id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(item)
    }

    /// Creates the stock row for a product and logs the initial receipt.
    pub async fn create(
        &mut self,
        product_id: &str,
        quantity: i64,
        reorder_level: i64,
        actor_id: &str,
    ) -> DbResult<StockItem> {
        sqlx::query(
            r#"
            INSERT INTO stock_items (product_id, quantity, reorder_level, updated_at)
            VALUES (?1, 0, ?2, ?3)
            "#,
        )
        .bind(product_id)
        .bind(reorder_level)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;

        if quantity > 0 {
            let note = Some("initial stock");
            self.apply_delta(product_id, quantity, StockMovement::Receipt, note, None, actor_id)
                .await?;
        }

        self.get(product_id)
            .await?
            .ok_or_else(|| DbError::not_found("StockItem", product_id))
    }

    /// Takes `quantity` units for a sale.
    pub async fn reserve(
        &mut self,
        product_id: &str,
        quantity: i64,
        reference_id: &str,
        actor_id: &str,
    ) -> DbResult<StockOutcome> {
        let reference = Some(reference_id);
        self.apply_delta(product_id, -quantity, StockMovement::Sale, None, reference, actor_id)
            .await
    }

    /// Puts `quantity` units back (returns).
    pub async fn restore(
        &mut self,
        product_id: &str,
        quantity: i64,
        reference_id: &str,
        actor_id: &str,
    ) -> DbResult<StockChange> {
        let reference = Some(reference_id);
        let outcome = self
            .apply_delta(product_id, quantity, StockMovement::Return, None, reference, actor_id)
            .await?;
        outcome.change().ok_or_else(|| {
            DbError::Internal(format!("restore of {product_id} reported insufficient stock"))
        })
    }

    /// Books `quantity` received units, e.g. from a supplier purchase.
    pub async fn receive(
        &mut self,
        product_id: &str,
        quantity: i64,
        reference_id: &str,
        actor_id: &str,
    ) -> DbResult<InventoryLogEntry> {
        let reference = Some(reference_id);
        let outcome = self
            .apply_delta(product_id, quantity, StockMovement::Receipt, None, reference, actor_id)
            .await?;
        match outcome {
            StockOutcome::Applied(entry) => Ok(entry),
            StockOutcome::Insufficient { .. } => Err(DbError::Internal(format!(
                "receipt of {quantity} x {product_id} reported insufficient stock"
            ))),
        }
    }

    /// Manual correction by any non-zero delta.
    pub async fn adjust(
        &mut self,
        product_id: &str,
        delta: i64,
        reason: &str,
        actor_id: &str,
    ) -> DbResult<StockOutcome> {
        self.apply_delta(product_id, delta, StockMovement::Adjustment, Some(reason), None, actor_id)
            .await
    }

    /// Items at or below their reorder level.
    pub async fn low_stock(&mut self) -> DbResult<Vec<StockItem>> {
        let sql = format!(
            "SELECT {STOCK_COLUMNS} WHERE s.quantity <= s.reorder_level ORDER BY s.quantity, p.name"
        );
        let items = sqlx::query_as::<_, StockItem>(&sql)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(items)
    }

    /// Inventory log of a product, oldest first.
    pub async fn log_for(&mut self, product_id: &str) -> DbResult<Vec<InventoryLogEntry>> {
        let entries = sqlx::query_as::<_, InventoryLogEntry>(
            r#"
            SELECT id, product_id, movement, old_quantity, new_quantity, delta,
                   note, reference_id, actor_id, created_at
            FROM inventory_log
            WHERE product_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(product_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(entries)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn apply_delta(
        &mut self,
        product_id: &str,
        delta: i64,
        movement: StockMovement,
        note: Option<&str>,
        reference_id: Option<&str>,
        actor_id: &str,
    ) -> DbResult<StockOutcome> {
        let now = Utc::now();

        let after: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE stock_items
            SET quantity = quantity + ?2, updated_at = ?3
            WHERE product_id = ?1 AND quantity + ?2 >= 0
            RETURNING quantity
            "#,
        )
        .bind(product_id)
        .bind(delta)
        .bind(now)
        .fetch_optional(&mut *self.conn)
        .await?;

        let Some(after) = after else {
            let available: Option<i64> =
                sqlx::query_scalar("SELECT quantity FROM stock_items WHERE product_id = ?1")
                    .bind(product_id)
                    .fetch_optional(&mut *self.conn)
                    .await?;
            return match available {
                Some(available) => {
                    debug!(product_id, delta, available, "Stock mutation refused");
                    Ok(StockOutcome::Insufficient { available })
                }
                None => Err(DbError::not_found("StockItem", product_id)),
            };
        };

        let entry = InventoryLogEntry {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            movement,
            old_quantity: after - delta,
            new_quantity: after,
            delta,
            note: note.map(str::to_string),
            reference_id: reference_id.map(str::to_string),
            actor_id: actor_id.to_string(),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO inventory_log (
                id, product_id, movement, old_quantity, new_quantity, delta,
                note, reference_id, actor_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.product_id)
        .bind(entry.movement)
        .bind(entry.old_quantity)
        .bind(entry.new_quantity)
        .bind(entry.delta)
        .bind(&entry.note)
        .bind(&entry.reference_id)
        .bind(&entry.actor_id)
        .bind(entry.created_at)
        .execute(&mut *self.conn)
        .await?;

        debug!(product_id, delta, before = entry.old_quantity, after, "Stock updated");
        Ok(StockOutcome::Applied(entry))
    }
}
