//! # Purchase Receiving
//!
//! Books a supplier delivery: every line goes into stock and the total
//! becomes one payable, in a single unit of work.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  receive_purchase(supplier, reference, lines)                           │
//! │       ├── reference already booked ──────────► PurchaseAlreadyReceived  │
//! │       ├── per line: stock +qty (`receipt`, ref = purchase reference)    │
//! │       ├── payable(total = Σ qty × unit cost, due = today + terms)       │
//! │       └── supplier debt += total                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ts_rs::TS;

use crate::error::EngineResult;
use crate::Engine;
use tillpoint_core::calendar::due_date;
use tillpoint_core::validation::{validate_id, validate_quantity, validate_reason, validate_unique};
use tillpoint_core::{CommerceError, InventoryLogEntry, Money, PayableAccount, ValidationError};
use tillpoint_db::NewPayable;

/// One product line of a supplier delivery.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseLine {
    pub product_id: String,
    pub quantity: i64,
    /// Cost per unit, in base.
    pub unit_cost: Money,
}

impl PurchaseLine {
    pub fn new(product_id: impl Into<String>, quantity: i64, unit_cost: Money) -> Self {
        PurchaseLine {
            product_id: product_id.into(),
            quantity,
            unit_cost,
        }
    }

    fn subtotal(&self) -> Money {
        self.unit_cost.multiply_quantity(self.quantity)
    }
}

/// What a received purchase wrote.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseReceipt {
    pub payable: PayableAccount,
    /// One stock movement per line, in line order.
    pub stock: Vec<InventoryLogEntry>,
}

impl Engine {
    /// Puts a supplier delivery into stock and records what is owed for it.
    ///
    /// `due` overrides the supplier's payment terms.
    ///
    /// ## Errors
    /// - `PurchaseAlreadyReceived` when the supplier already has a payable
    ///   under `purchase_reference`
    /// - `NotFound` for an unknown supplier or product
    pub async fn receive_purchase(
        &self,
        operator_id: &str,
        supplier_id: &str,
        purchase_reference: &str,
        lines: &[PurchaseLine],
        due: Option<NaiveDate>,
    ) -> EngineResult<PurchaseReceipt> {
        validate_id("operator_id", operator_id)?;
        validate_id("supplier_id", supplier_id)?;
        validate_reason("purchase_reference", purchase_reference)?;
        if lines.is_empty() {
            return Err(ValidationError::Required {
                field: "purchase lines".to_string(),
            }
            .into());
        }
        for line in lines {
            validate_id("product_id", &line.product_id)?;
            validate_quantity(line.quantity)?;
            if line.unit_cost.is_negative() {
                return Err(ValidationError::MustNotBeNegative {
                    field: "unit cost".to_string(),
                }
                .into());
            }
        }
        validate_unique("product_id", lines.iter().map(|l| l.product_id.as_str()))?;

        let total = lines.iter().fold(Money::zero(), |acc, line| acc + line.subtotal());
        if !total.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "purchase total".to_string(),
            }
            .into());
        }

        let mut uow = self.db.begin().await?;
        let supplier = uow
            .suppliers()
            .get(supplier_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("Supplier", supplier_id))?;
        if uow
            .payables()
            .find_by_reference(&supplier.id, purchase_reference)
            .await?
            .is_some()
        {
            return Err(CommerceError::PurchaseAlreadyReceived {
                supplier_id: supplier.id,
                purchase_reference: purchase_reference.to_string(),
            }
            .into());
        }

        let mut stock = Vec::with_capacity(lines.len());
        for line in lines {
            let product = uow
                .products()
                .get(&line.product_id)
                .await?
                .ok_or_else(|| CommerceError::not_found("Product", &line.product_id))?;
            let entry = uow
                .stock()
                .receive(&product.id, line.quantity, purchase_reference, operator_id)
                .await?;
            debug!(
                product_id = %product.id,
                quantity = line.quantity,
                stock_after = entry.new_quantity,
                "Purchase line received"
            );
            stock.push(entry);
        }

        let terms = u32::try_from(supplier.payment_terms_days)
            .unwrap_or(self.config.default_terms_days);
        let payable = uow
            .payables()
            .insert(&NewPayable {
                supplier_id: supplier.id.clone(),
                purchase_reference: Some(purchase_reference.to_string()),
                total,
                due_date: due.unwrap_or_else(|| due_date(Utc::now().date_naive(), terms)),
                notes: None,
            })
            .await?;
        uow.suppliers().adjust_debt(&supplier.id, total).await?;
        uow.commit().await?;

        info!(
            supplier_id,
            purchase_reference,
            lines = lines.len(),
            %total,
            account_id = %payable.id,
            "Purchase received"
        );
        Ok(PurchaseReceipt { payable, stock })
    }
}
