//! # Repair Tickets
//!
//! Parts taken from stock for a repair, payments taken at the repair desk
//! and hand-over of paid tickets. Checkout settles tickets too; both paths
//! deliver through the same `deliver_in` step.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  received / in_progress / ready                                         │
//! │     │  add_ticket_part      stock −qty (sale, ref = ticket)             │
//! │     │  remove_ticket_part   stock +qty (return, ref = ticket)           │
//! │     │  pay_ticket           paid += amount, `payment` ledger entry      │
//! │     │  checkout(.ticket())  paid += allocation                          │
//! │     ▼                                                                   │
//! │  outstanding ≤ ε ──► delivered (delivered_at, warranty_expires_at)      │
//! │                      automatically on the paying call, or through       │
//! │                      deliver_ticket when the cost dropped later         │
//! │                                                                         │
//! │  delivered / cancelled: parts and payments are refused                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ts_rs::TS;

use crate::error::EngineResult;
use crate::events::DomainEvent;
use crate::Engine;
use tillpoint_core::calendar::add_business_days;
use tillpoint_core::validation::{validate_id, validate_payment_amount, validate_quantity};
use tillpoint_core::{
    apply_payment, CommerceError, Currency, DualMoney, EntryType, Money, NewLedgerEntry,
    PaymentMethod, ServiceTicket, TicketPart, TicketStatus, ValidationError,
};
use tillpoint_db::{DbError, StockOutcome, UnitOfWork};

/// What a repair-desk payment did to the ticket.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TicketPaymentReceipt {
    /// The ticket after the payment (delivered if it was paid off).
    pub ticket: ServiceTicket,
    /// Credited to the ticket, in base.
    pub applied: Money,
    /// What was handed over, in both currencies.
    pub tendered: DualMoney,
    pub balance_after: Money,
    pub delivered: bool,
}

impl Engine {
    // =========================================================================
    // Parts
    // =========================================================================

    /// Takes `quantity` units of a product out of stock for a repair.
    ///
    /// The part is priced at the product's current sale price.
    pub async fn add_ticket_part(
        &self,
        operator_id: &str,
        ticket_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> EngineResult<TicketPart> {
        validate_id("operator_id", operator_id)?;
        validate_id("ticket_id", ticket_id)?;
        validate_id("product_id", product_id)?;
        validate_quantity(quantity)?;

        let mut uow = self.db.begin().await?;
        let ticket = Self::require_open_ticket(&mut uow, ticket_id).await?;
        let product = uow
            .products()
            .get(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| CommerceError::not_found("Product", product_id))?;

        match uow
            .stock()
            .reserve(&product.id, quantity, &ticket.id, operator_id)
            .await?
        {
            StockOutcome::Applied(_) => {}
            StockOutcome::Insufficient { available } => {
                return Err(CommerceError::InsufficientStock {
                    product_id: product.id,
                    sku: product.sku,
                    available,
                    requested: quantity,
                }
                .into());
            }
        }

        let part = uow
            .tickets()
            .add_part(&ticket.id, Some(&product.id), &product.name, product.price(), quantity)
            .await?;
        uow.commit().await?;

        info!(
            ticket_id,
            product_id,
            quantity,
            unit_cost = %product.price(),
            "Part added to ticket"
        );
        Ok(part)
    }

    /// Takes a part off a ticket and puts its units back in stock.
    pub async fn remove_ticket_part(
        &self,
        operator_id: &str,
        ticket_id: &str,
        part_id: &str,
    ) -> EngineResult<TicketPart> {
        validate_id("operator_id", operator_id)?;
        validate_id("ticket_id", ticket_id)?;
        validate_id("part_id", part_id)?;

        let mut uow = self.db.begin().await?;
        let ticket = uow
            .tickets()
            .get(ticket_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("ServiceTicket", ticket_id))?;
        // Parts of a cancelled repair may go back; a delivered one keeps them
        if ticket.status == TicketStatus::Delivered {
            return Err(CommerceError::TicketClosed {
                ticket_id: ticket.id,
                status: ticket.status.as_str().to_string(),
            }
            .into());
        }

        let part = uow
            .tickets()
            .part(part_id)
            .await?
            .filter(|p| p.ticket_id == ticket.id)
            .ok_or_else(|| CommerceError::not_found("TicketPart", part_id))?;

        if let Some(product_id) = &part.product_id {
            uow.stock()
                .restore(product_id, part.quantity, &ticket.id, operator_id)
                .await?;
        }
        uow.tickets().remove_part(&part.id).await?;
        uow.commit().await?;

        info!(ticket_id, part_id, quantity = part.quantity, "Part removed from ticket");
        Ok(part)
    }

    // =========================================================================
    // Payment and delivery
    // =========================================================================

    /// Takes a payment on a ticket at the repair desk, without a sale.
    ///
    /// Paying off the balance delivers the ticket. Unlike checkout, a
    /// partial payment needs no customer: the rest stays on the ticket.
    ///
    /// ## Errors
    /// - `NoOpenSession`, `NoActiveRate`
    /// - `TicketNotSettleable` for a cancelled ticket
    /// - `NothingToSettle` when nothing is outstanding
    /// - `OverPayment` when the amount exceeds the balance by more than ε
    pub async fn pay_ticket(
        &self,
        operator_id: &str,
        ticket_id: &str,
        amount: Money,
        method: PaymentMethod,
        currency: Currency,
    ) -> EngineResult<TicketPaymentReceipt> {
        validate_id("operator_id", operator_id)?;
        validate_id("ticket_id", ticket_id)?;
        validate_payment_amount(amount)?;
        let epsilon = self.config.epsilon();

        let mut uow = self.db.begin().await?;
        let session = Self::require_open_session(&mut uow, operator_id).await?;
        let rate = Self::require_rate(&mut uow).await?.rate();

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
        if outstanding <= epsilon {
            return Err(CommerceError::NothingToSettle.into());
        }

        let amount_base = rate.in_base(amount, currency);
        if !amount_base.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "payment amount in base currency".to_string(),
            }
            .into());
        }
        let applied = apply_payment(ticket.total_cost(), ticket.paid(), amount_base, epsilon)
            .ok_or_else(|| CommerceError::OverPayment {
                account_id: ticket.id.clone(),
                amount: amount_base,
                balance: outstanding,
            })?;

        uow.tickets().record_payment(&ticket.id, applied.amount).await?;

        let tendered = rate.dual(amount, currency);
        uow.cash()
            .append_entry(&NewLedgerEntry {
                session_id: session.id.clone(),
                entry_type: EntryType::Payment,
                currency,
                method,
                amount: tendered,
                rate,
                description: format!("Payment on ticket {}", ticket.ticket_number),
                reference_id: Some(ticket.id.clone()),
            })
            .await?;

        let mut events = Vec::new();
        let delivered =
            applied.balance_after <= epsilon && ticket.status != TicketStatus::Delivered;
        if delivered {
            let note = "Paid at the repair desk";
            let event = self
                .deliver_in(&mut uow, &ticket.id, operator_id, Utc::now(), note, None)
                .await?;
            events.push(event);
        }

        let updated = uow
            .tickets()
            .get(&ticket.id)
            .await?
            .ok_or_else(|| DbError::not_found("ServiceTicket", &ticket.id))?;
        Self::enqueue(&mut uow, &events).await?;
        self.commit_and_publish(uow, events).await?;

        info!(
            ticket_id,
            amount = %applied.amount,
            balance = %applied.balance_after,
            delivered,
            "Ticket payment registered"
        );
        Ok(TicketPaymentReceipt {
            ticket: updated,
            applied: applied.amount,
            tendered,
            balance_after: applied.balance_after,
            delivered,
        })
    }

    /// Hands over a ticket that is already paid in full.
    ///
    /// Needed when the cost dropped after the last payment (a part taken
    /// off, a lower final price), so no paying call delivered it.
    pub async fn deliver_ticket(
        &self,
        operator_id: &str,
        ticket_id: &str,
    ) -> EngineResult<ServiceTicket> {
        validate_id("operator_id", operator_id)?;
        validate_id("ticket_id", ticket_id)?;

        let mut uow = self.db.begin().await?;
        let ticket = Self::require_open_ticket(&mut uow, ticket_id).await?;
        let outstanding = ticket.outstanding();
        if outstanding > self.config.epsilon() {
            return Err(CommerceError::TicketNotPaid {
                ticket_id: ticket.id,
                outstanding,
            }
            .into());
        }

        let note = "Delivered at the counter";
        let event = self
            .deliver_in(&mut uow, &ticket.id, operator_id, Utc::now(), note, None)
            .await?;
        let delivered = uow
            .tickets()
            .get(&ticket.id)
            .await?
            .ok_or_else(|| DbError::not_found("ServiceTicket", &ticket.id))?;

        let events = vec![event];
        Self::enqueue(&mut uow, &events).await?;
        self.commit_and_publish(uow, events).await?;

        info!(ticket_id, ticket_number = %delivered.ticket_number, "Ticket delivered");
        Ok(delivered)
    }

    // =========================================================================
    // Shared
    // =========================================================================

    /// Marks a ticket delivered inside `uow` and stamps its warranty.
    ///
    /// Returns the event to queue; the caller commits.
    pub(crate) async fn deliver_in(
        &self,
        uow: &mut UnitOfWork,
        ticket_id: &str,
        operator_id: &str,
        now: DateTime<Utc>,
        note: &str,
        sale_id: Option<&str>,
    ) -> EngineResult<DomainEvent> {
        let warranty_expires_at = add_business_days(now, self.config.warranty_business_days);
        uow.tickets()
            .mark_delivered(ticket_id, now, warranty_expires_at, operator_id, Some(note))
            .await?;
        let ticket = uow
            .tickets()
            .get(ticket_id)
            .await?
            .ok_or_else(|| DbError::not_found("ServiceTicket", ticket_id))?;
        debug!(ticket_id, %warranty_expires_at, "Warranty stamped");

        Ok(DomainEvent::TicketDelivered {
            ticket_id: ticket.id,
            ticket_number: ticket.ticket_number,
            sale_id: sale_id.map(str::to_string),
            warranty_expires_at,
            occurred_at: now,
        })
    }

    /// A ticket that can still change, or `TicketClosed`.
    async fn require_open_ticket(
        uow: &mut UnitOfWork,
        ticket_id: &str,
    ) -> EngineResult<ServiceTicket> {
        let ticket = uow
            .tickets()
            .get(ticket_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("ServiceTicket", ticket_id))?;
        match ticket.status {
            TicketStatus::Delivered | TicketStatus::Cancelled => Err(CommerceError::TicketClosed {
                ticket_id: ticket.id,
                status: ticket.status.as_str().to_string(),
            }
            .into()),
            _ => Ok(ticket),
        }
    }
}
