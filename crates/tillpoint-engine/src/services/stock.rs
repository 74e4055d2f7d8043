//! # Stock Operations
//!
//! Manual corrections (counts, breakage, receiving) and the reorder report.
//! Sales and returns move stock from their own services.

use tracing::{info, warn};

use crate::error::EngineResult;
use crate::Engine;
use tillpoint_core::validation::{validate_id, validate_reason, validate_stock_delta};
use tillpoint_core::{CommerceError, InventoryLogEntry, StockItem};
use tillpoint_db::{DbError, StockOutcome};

impl Engine {
    /// Applies a signed correction to a product's quantity.
    ///
    /// A negative `delta` larger than what is on hand fails with
    /// `InsufficientStock` and leaves the quantity untouched.
    pub async fn adjust_stock(
        &self,
        operator_id: &str,
        product_id: &str,
        delta: i64,
        reason: &str,
    ) -> EngineResult<InventoryLogEntry> {
        validate_id("operator_id", operator_id)?;
        validate_id("product_id", product_id)?;
        validate_stock_delta(delta)?;
        validate_reason("reason", reason)?;

        let mut uow = self.db.begin().await?;
        match uow.stock().adjust(product_id, delta, reason.trim(), operator_id).await? {
            StockOutcome::Applied(log) => {
                uow.commit().await?;
                info!(
                    product_id,
                    delta,
                    quantity = log.new_quantity,
                    operator_id,
                    "Stock adjusted"
                );
                Ok(log)
            }
            StockOutcome::Insufficient { available } => {
                let item = uow
                    .stock()
                    .get(product_id)
                    .await?
                    .ok_or_else(|| DbError::not_found("StockItem", product_id))?;
                warn!(product_id, delta, available, "Stock adjustment would go below zero");
                Err(CommerceError::InsufficientStock {
                    product_id: product_id.to_string(),
                    sku: item.sku,
                    available,
                    requested: -delta,
                }
                .into())
            }
        }
    }

    /// Items at or below their reorder level.
    pub async fn low_stock(&self) -> EngineResult<Vec<StockItem>> {
        let mut uow = self.db.begin_read().await?;
        let items = uow.stock().low_stock().await?;
        uow.rollback().await?;
        Ok(items)
    }
}
