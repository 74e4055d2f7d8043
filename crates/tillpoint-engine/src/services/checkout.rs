//! # Checkout
//!
//! One sale across stock, the drawer, receivables and repair tickets, as a
//! single unit of work.
//!
//! ## Transaction Steps
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate request                       (nothing touched yet)           │
//! │  BEGIN (write lock)                                                     │
//! │   1. open session? active rate?         NoOpenSession / NoActiveRate    │
//! │   2. lines:   reserve stock, freeze price and cost  InsufficientStock   │
//! │   3. tickets: outstanding balances, paid ones skipped                   │
//! │      nothing left at all → empty receipt, nothing written               │
//! │   4. plan_settlement(): total, applied, change, pending                 │
//! │   5. pending > 0 without customer       CustomerRequiredForCredit       │
//! │   6. sale + lines                                                       │
//! │   7. `sale` ledger entry for the applied amount                         │
//! │   8. receivable + customer debt for the pending amount                  │
//! │   9. ticket allocations; fully paid tickets → delivered + warranty      │
//! │  10. outbox: SaleCompleted, TicketDelivered...                          │
//! │  COMMIT → emit events                                                   │
//! │                                                                         │
//! │  Any error before COMMIT rolls every step back.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::events::DomainEvent;
use crate::Engine;
use tillpoint_core::calendar::due_date;
use tillpoint_core::settlement::{needs_settlement, plan_settlement, Tender, TicketBalance};
use tillpoint_core::validation::{
    validate_checkout_size, validate_id, validate_optional_note, validate_quantity, validate_tender,
    validate_unique,
};
use tillpoint_core::{
    CommerceError, Currency, EntryType, Money, NewLedgerEntry, PaymentMethod, ReceivableAccount,
    Sale, SaleLine, ServiceTicket, TicketAllocation, TicketStatus,
};
use tillpoint_db::{DbError, NewReceivable, StockOutcome};

// =============================================================================
// Request / Receipt
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutLine {
    pub product_id: String,
    pub quantity: i64,
}

/// Everything the till sends for one checkout.
///
/// ## Example
/// ```rust,ignore
/// let request = CheckoutRequest::new("ana")
///     .line(cable_id, 2)
///     .ticket(repair_id)
///     .customer(customer_id)
///     .tender(Currency::Base, Money::from_cents(500));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutRequest {
    pub operator_id: String,
    pub customer_id: Option<String>,
    pub lines: Vec<CheckoutLine>,
    /// Settled in this order.
    pub ticket_ids: Vec<String>,
    pub tender_currency: Currency,
    pub method: PaymentMethod,
    /// Amount handed over in `tender_currency`; `None` means exactly the total.
    pub tendered: Option<Money>,
    pub notes: Option<String>,
}

impl CheckoutRequest {
    pub fn new(operator_id: impl Into<String>) -> Self {
        CheckoutRequest {
            operator_id: operator_id.into(),
            customer_id: None,
            lines: Vec::new(),
            ticket_ids: Vec::new(),
            tender_currency: Currency::Base,
            method: PaymentMethod::Cash,
            tendered: None,
            notes: None,
        }
    }

    pub fn line(mut self, product_id: impl Into<String>, quantity: i64) -> Self {
        self.lines.push(CheckoutLine {
            product_id: product_id.into(),
            quantity,
        });
        self
    }

    pub fn ticket(mut self, ticket_id: impl Into<String>) -> Self {
        self.ticket_ids.push(ticket_id.into());
        self
    }

    pub fn customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    /// Pays `amount` in `currency` (less than the total leaves a receivable).
    pub fn tender(mut self, currency: Currency, amount: Money) -> Self {
        self.tender_currency = currency;
        self.tendered = Some(amount);
        self
    }

    /// Pays exactly the total in `currency`.
    pub fn exact_tender(mut self, currency: Currency) -> Self {
        self.tender_currency = currency;
        self.tendered = None;
        self
    }

    pub fn method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    fn tender_spec(&self) -> Tender {
        match self.tendered {
            Some(amount) => Tender::of(self.tender_currency, amount),
            None => Tender::exact(self.tender_currency),
        }
    }

    fn validate(&self) -> Result<(), tillpoint_core::ValidationError> {
        validate_id("operator_id", &self.operator_id)?;
        if let Some(customer_id) = &self.customer_id {
            validate_id("customer_id", customer_id)?;
        }
        validate_checkout_size(self.lines.len(), self.ticket_ids.len())?;
        for line in &self.lines {
            validate_id("product_id", &line.product_id)?;
            validate_quantity(line.quantity)?;
        }
        for ticket_id in &self.ticket_ids {
            validate_id("ticket_id", ticket_id)?;
        }
        validate_unique("ticket_id", self.ticket_ids.iter().map(String::as_str))?;
        if let Some(amount) = self.tendered {
            validate_tender(amount)?;
        }
        validate_optional_note("notes", self.notes.as_deref())
    }
}

/// What a committed checkout wrote.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutReceipt {
    /// `None` when every referenced ticket was already paid and there were
    /// no lines: the checkout was a no-op.
    pub sale: Option<Sale>,
    pub lines: Vec<SaleLine>,
    pub allocations: Vec<TicketAllocation>,
    /// Present when part of the total was left on credit.
    pub receivable: Option<ReceivableAccount>,
    /// Tickets this checkout paid off, now delivered.
    pub delivered_tickets: Vec<ServiceTicket>,
}

impl CheckoutReceipt {
    fn nothing_settled() -> Self {
        CheckoutReceipt {
            sale: None,
            lines: Vec::new(),
            allocations: Vec::new(),
            receivable: None,
            delivered_tickets: Vec::new(),
        }
    }

    /// True when the checkout wrote nothing.
    pub fn is_noop(&self) -> bool {
        self.sale.is_none()
    }
}

// =============================================================================
// Checkout
// =============================================================================

impl Engine {
    /// Settles a checkout atomically.
    ///
    /// ## Errors
    /// - `Validation` for a malformed request (nothing is read)
    /// - `NoOpenSession`, `NoActiveRate`
    /// - `InsufficientStock` for the first line that cannot be reserved
    /// - `NotFound` for an unknown product, ticket or customer
    /// - `TicketNotSettleable` for a cancelled ticket
    /// - `CustomerRequiredForCredit` when a balance would be left without a customer
    ///
    /// Only already-paid tickets and no lines is not an error: the receipt
    /// comes back empty ([`CheckoutReceipt::is_noop`]) and nothing is written.
    pub async fn checkout(&self, request: CheckoutRequest) -> EngineResult<CheckoutReceipt> {
        request.validate()?;
        let operator_id = request.operator_id.as_str();
        let epsilon = self.config.epsilon();

        let mut uow = self.db.begin().await?;
        let session = Self::require_open_session(&mut uow, operator_id).await?;
        let rate = Self::require_rate(&mut uow).await?.rate();

        let customer = match &request.customer_id {
            Some(id) => Some(
                uow.customers()
                    .get(id)
                    .await?
                    .ok_or_else(|| CommerceError::not_found("Customer", id))?,
            ),
            None => None,
        };

        let now = Utc::now();
        let sale_id = Uuid::new_v4().to_string();

        // Lines: reserve first, then freeze catalog data
        let mut lines = Vec::with_capacity(request.lines.len());
        let mut lines_total = Money::zero();
        for line in &request.lines {
            let product = uow
                .products()
                .get(&line.product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| CommerceError::not_found("Product", &line.product_id))?;

            match uow
                .stock()
                .reserve(&product.id, line.quantity, &sale_id, operator_id)
                .await?
            {
                StockOutcome::Applied(_) => {}
                StockOutcome::Insufficient { available } => {
                    return Err(CommerceError::InsufficientStock {
                        product_id: product.id,
                        sku: product.sku,
                        available,
                        requested: line.quantity,
                    }
                    .into());
                }
            }

            let line_total = product.price().multiply_quantity(line.quantity);
            lines_total += line_total;
            lines.push(SaleLine {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                product_id: product.id,
                sku_snapshot: product.sku,
                name_snapshot: product.name,
                quantity: line.quantity,
                unit_price_cents: product.price_cents,
                unit_cost_cents: product.cost_cents,
                line_total_cents: line_total.cents(),
                created_at: now,
            });
        }

        // Tickets: only those with a balance take part
        let mut tickets: HashMap<String, ServiceTicket> = HashMap::new();
        let mut balances = Vec::new();
        for ticket_id in &request.ticket_ids {
            let ticket = uow
                .tickets()
                .get(ticket_id)
                .await?
                .ok_or_else(|| CommerceError::not_found("ServiceTicket", ticket_id))?;
            if !ticket.can_take_payment() {
                return Err(CommerceError::TicketNotSettleable {
                    ticket_id: ticket.id,
                    status: ticket.status.as_str().to_string(),
                }
                .into());
            }

            let outstanding = ticket.outstanding();
            if needs_settlement(outstanding, epsilon) {
                balances.push(TicketBalance {
                    ticket_id: ticket.id.clone(),
                    outstanding,
                });
            } else {
                debug!(ticket_id = %ticket.id, "Ticket already settled; skipped");
            }
            tickets.insert(ticket.id.clone(), ticket);
        }

        if lines.is_empty() && balances.is_empty() {
            uow.rollback().await?;
            debug!(
                operator_id,
                tickets = request.ticket_ids.len(),
                "Checkout had nothing to settle"
            );
            return Ok(CheckoutReceipt::nothing_settled());
        }

        let plan = plan_settlement(lines_total, &balances, request.tender_spec(), rate, epsilon);

        if plan.pending.is_positive() && customer.is_none() {
            return Err(CommerceError::CustomerRequiredForCredit { pending: plan.pending }.into());
        }

        // Sale
        let receipt_number = uow.sales().next_receipt_number(now.date_naive()).await?;
        let sale = Sale {
            id: sale_id.clone(),
            receipt_number: receipt_number.clone(),
            session_id: session.id.clone(),
            operator_id: operator_id.to_string(),
            customer_id: request.customer_id.clone(),
            currency: plan.tender_currency,
            method: request.method,
            total_base_cents: plan.total.base.cents(),
            total_secondary_cents: plan.total.secondary.cents(),
            rate_micros: rate.micros(),
            tendered_cents: plan.tendered.cents(),
            change_cents: plan.change.cents(),
            applied_base_cents: plan.applied.base.cents(),
            pending_base_cents: plan.pending.cents(),
            status: plan.status,
            notes: request.notes.clone(),
            created_at: now,
        };
        uow.sales().insert_sale(&sale).await?;
        for line in &lines {
            uow.sales().insert_line(line).await?;
        }

        // Drawer
        if plan.applied_in_tender().is_positive() {
            uow.cash()
                .append_entry(&NewLedgerEntry {
                    session_id: session.id.clone(),
                    entry_type: EntryType::Sale,
                    currency: plan.tender_currency,
                    method: request.method,
                    amount: plan.applied,
                    rate,
                    description: format!("Sale {receipt_number}"),
                    reference_id: Some(sale_id.clone()),
                })
                .await?;
        }

        // Credit
        let receivable = match &customer {
            Some(customer) if plan.pending.is_positive() => {
                let terms = u32::try_from(customer.payment_terms_days)
                    .unwrap_or(self.config.default_terms_days);
                let account = uow
                    .receivables()
                    .insert(&NewReceivable {
                        customer_id: customer.id.clone(),
                        sale_id: Some(sale_id.clone()),
                        total: plan.total.base,
                        paid: plan.applied.base,
                        due_date: due_date(now.date_naive(), terms),
                        notes: Some(format!("Sale {receipt_number}")),
                    })
                    .await?;
                uow.customers().adjust_debt(&customer.id, plan.pending).await?;
                Some(account)
            }
            _ => None,
        };

        // Tickets, in input order
        let mut events = Vec::new();
        let mut allocations = Vec::with_capacity(plan.allocations.len());
        let mut delivered_tickets = Vec::new();
        for allocation in &plan.allocations {
            let row = TicketAllocation {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                ticket_id: allocation.ticket_id.clone(),
                amount_cents: allocation.amount.cents(),
                created_at: now,
            };
            uow.sales().insert_allocation(&row).await?;
            uow.tickets()
                .record_payment(&allocation.ticket_id, allocation.amount)
                .await?;
            allocations.push(row);

            let already_delivered = tickets
                .get(&allocation.ticket_id)
                .map(|t| t.status == TicketStatus::Delivered)
                .unwrap_or(false);
            if !allocation.settles || already_delivered {
                continue;
            }

            let note = format!("Settled by sale {receipt_number}");
            let ticket_id = allocation.ticket_id.as_str();
            let event = self
                .deliver_in(&mut uow, ticket_id, operator_id, now, &note, Some(&sale_id))
                .await?;
            let delivered = uow
                .tickets()
                .get(&allocation.ticket_id)
                .await?
                .ok_or_else(|| DbError::not_found("ServiceTicket", &allocation.ticket_id))?;
            events.push(event);
            delivered_tickets.push(delivered);
        }

        events.insert(
            0,
            DomainEvent::SaleCompleted {
                sale_id: sale_id.clone(),
                receipt_number: receipt_number.clone(),
                session_id: session.id.clone(),
                operator_id: operator_id.to_string(),
                customer_id: request.customer_id.clone(),
                total: plan.total,
                applied_base: plan.applied.base,
                pending_base: plan.pending,
                status: plan.status,
                occurred_at: now,
            },
        );
        Self::enqueue(&mut uow, &events).await?;
        self.commit_and_publish(uow, events).await?;

        info!(
            sale_id = %sale.id,
            receipt_number = %sale.receipt_number,
            total = %plan.total.base,
            applied = %plan.applied.base,
            pending = %plan.pending,
            tickets = allocations.len(),
            "Checkout completed"
        );

        Ok(CheckoutReceipt {
            sale: Some(sale),
            lines,
            allocations,
            receivable,
            delivered_tickets,
        })
    }
}
