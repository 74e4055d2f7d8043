//! # Customer Returns
//!
//! ```text
//! return_items(sale, [(product, qty)], currency)
//!   │
//!   ├── qty ≤ sold on the sale − already returned   else ReturnExceedsSold
//!   ├── stock restored, logged as `return` against the sale
//!   ├── refund = Σ qty × unit price frozen on the sale line
//!   └── `refund` ledger entry in the requested currency (cash leaves drawer)
//! ```
//!
//! The original sale row is never modified.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::Engine;
use tillpoint_core::validation::{
    validate_checkout_size, validate_id, validate_quantity, validate_reason, validate_unique,
};
use tillpoint_core::{
    CommerceError, Currency, EntryType, Money, NewLedgerEntry, PaymentMethod, SaleLine, SaleReturn,
    SaleReturnLine,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnItem {
    pub product_id: String,
    pub quantity: i64,
}

impl ReturnItem {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        ReturnItem {
            product_id: product_id.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnReceipt {
    pub sale_return: SaleReturn,
    pub lines: Vec<SaleReturnLine>,
}

impl ReturnReceipt {
    pub fn refund_base(&self) -> Money {
        Money::from_cents(self.sale_return.refund_base_cents)
    }
}

impl Engine {
    /// Takes goods back from a sale and refunds them in cash.
    pub async fn return_items(
        &self,
        operator_id: &str,
        sale_id: &str,
        items: &[ReturnItem],
        currency: Currency,
        reason: &str,
    ) -> EngineResult<ReturnReceipt> {
        validate_id("operator_id", operator_id)?;
        validate_id("sale_id", sale_id)?;
        validate_reason("reason", reason)?;
        validate_checkout_size(items.len(), 0)?;
        validate_unique("product_id", items.iter().map(|i| i.product_id.as_str()))?;
        for item in items {
            validate_id("product_id", &item.product_id)?;
            validate_quantity(item.quantity)?;
        }

        let mut uow = self.db.begin().await?;
        let session = Self::require_open_session(&mut uow, operator_id).await?;
        let rate = Self::require_rate(&mut uow).await?.rate();

        let sale = uow
            .sales()
            .get(sale_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("Sale", sale_id))?;
        let sold_lines = uow.sales().lines(&sale.id).await?;

        let mut by_product: HashMap<&str, Vec<&SaleLine>> = HashMap::new();
        for line in &sold_lines {
            by_product.entry(line.product_id.as_str()).or_default().push(line);
        }

        let return_id = Uuid::new_v4().to_string();
        let mut lines = Vec::with_capacity(items.len());
        let mut refund_base = Money::zero();

        for item in items {
            let Some(matching) = by_product.get(item.product_id.as_str()) else {
                return Err(CommerceError::ReturnExceedsSold {
                    sale_id: sale.id.clone(),
                    product_id: item.product_id.clone(),
                    sold: 0,
                    already_returned: 0,
                    requested: item.quantity,
                }
                .into());
            };

            let sold: i64 = matching.iter().map(|l| l.quantity).sum();
            let already_returned = uow.sales().returned_quantity(&sale.id, &item.product_id).await?;
            if item.quantity > sold - already_returned {
                return Err(CommerceError::ReturnExceedsSold {
                    sale_id: sale.id.clone(),
                    product_id: item.product_id.clone(),
                    sold,
                    already_returned,
                    requested: item.quantity,
                }
                .into());
            }

            uow.stock()
                .restore(&item.product_id, item.quantity, &return_id, operator_id)
                .await?;

            let unit_price = matching[0].unit_price();
            let line_total = unit_price.multiply_quantity(item.quantity);
            refund_base += line_total;
            lines.push(SaleReturnLine {
                id: Uuid::new_v4().to_string(),
                return_id: return_id.clone(),
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                unit_price_cents: unit_price.cents(),
                line_total_cents: line_total.cents(),
            });
        }

        let refund = rate.dual(refund_base, Currency::Base);
        let sale_return = SaleReturn {
            id: return_id.clone(),
            sale_id: sale.id.clone(),
            session_id: session.id.clone(),
            operator_id: operator_id.to_string(),
            currency,
            refund_base_cents: refund.base.cents(),
            refund_secondary_cents: refund.secondary.cents(),
            rate_micros: rate.micros(),
            reason: reason.trim().to_string(),
            created_at: Utc::now(),
        };
        uow.sales().insert_return(&sale_return).await?;
        for line in &lines {
            uow.sales().insert_return_line(line).await?;
        }

        if refund_base.is_positive() {
            uow.cash()
                .append_entry(&NewLedgerEntry {
                    session_id: session.id.clone(),
                    entry_type: EntryType::Refund,
                    currency,
                    method: PaymentMethod::Cash,
                    amount: refund,
                    rate,
                    description: format!("Refund on sale {}", sale.receipt_number),
                    reference_id: Some(return_id.clone()),
                })
                .await?;
        }
        uow.commit().await?;

        info!(
            return_id = %return_id,
            sale_id,
            items = lines.len(),
            refund = %refund.get(currency),
            %currency,
            "Items returned"
        );
        Ok(ReturnReceipt { sale_return, lines })
    }
}
