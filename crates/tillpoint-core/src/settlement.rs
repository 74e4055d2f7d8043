//! # Settlement Math
//!
//! The arithmetic half of a checkout: grand total, how much of the tender
//! is applied, change, the debt left pending, and how the applied amount
//! is spread over open repair tickets. The engine does the I/O around it.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lines_total + Σ ticket outstanding ─────────────► total (base)         │
//! │                                         rate ────► total (secondary)    │
//! │                                                                         │
//! │  tendered (tender ccy, default = total in tender ccy)                   │
//! │      │                                                                  │
//! │      ├── applied = min(tendered, total)   (tender ccy)                  │
//! │      ├── change  = tendered - applied     (tender ccy)                  │
//! │      └── applied in base ──► pending = total - applied                  │
//! │                                  pending ≤ ε → paid, pending = 0        │
//! │                                  otherwise   → partial                  │
//! │                                                                         │
//! │  tickets, in input order:                                               │
//! │      paid      → every ticket receives its full outstanding             │
//! │      partial   → each absorbs min(outstanding, applied left)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Currency, DualMoney, Money, Rate};
use crate::types::SalePaymentStatus;

// =============================================================================
// Inputs
// =============================================================================

/// What the customer hands over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Tender {
    pub currency: Currency,
    /// Amount in `currency`. `None` means exactly the total.
    pub amount: Option<Money>,
}

impl Tender {
    pub fn exact(currency: Currency) -> Self {
        Tender {
            currency,
            amount: None,
        }
    }

    pub fn of(currency: Currency, amount: Money) -> Self {
        Tender {
            currency,
            amount: Some(amount),
        }
    }
}

/// Outstanding balance of a ticket entering the checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketBalance {
    pub ticket_id: String,
    pub outstanding: Money,
}

/// True when a balance is large enough to be worth settling.
#[inline]
pub fn needs_settlement(outstanding: Money, epsilon: Money) -> bool {
    outstanding > epsilon
}

// =============================================================================
// Plan
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TicketAllocationPlan {
    pub ticket_id: String,
    pub amount: Money,
    /// The allocation brings the ticket to fully paid.
    pub settles: bool,
}

/// Everything a checkout needs to write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SettlementPlan {
    pub lines_total: Money,
    pub tickets_total: Money,
    pub total: DualMoney,
    pub tender_currency: Currency,
    /// Handed over, tender currency.
    pub tendered: Money,
    /// Given back, tender currency.
    pub change: Money,
    /// Kept in the drawer, both currencies. The tender currency side is exact.
    pub applied: DualMoney,
    /// Left on credit, base.
    pub pending: Money,
    pub status: SalePaymentStatus,
    pub allocations: Vec<TicketAllocationPlan>,
}

impl SettlementPlan {
    /// Applied amount in the currency actually handed over.
    pub fn applied_in_tender(&self) -> Money {
        self.applied.get(self.tender_currency)
    }
}

/// Computes the settlement for one checkout.
///
/// ```rust
/// use tillpoint_core::money::{Currency, Money, Rate};
/// use tillpoint_core::settlement::{plan_settlement, Tender};
/// use tillpoint_core::SalePaymentStatus;
///
/// let plan = plan_settlement(
///     Money::from_cents(2000),
///     &[],
///     Tender::of(Currency::Base, Money::from_cents(500)),
///     Rate::from_micros(36_500_000),
///     Money::from_cents(1),
/// );
/// assert_eq!(plan.pending.cents(), 1500);
/// assert_eq!(plan.status, SalePaymentStatus::Partial);
/// ```
pub fn plan_settlement(
    lines_total: Money,
    tickets: &[TicketBalance],
    tender: Tender,
    rate: Rate,
    epsilon: Money,
) -> SettlementPlan {
    let tickets_total: Money = tickets.iter().map(|t| t.outstanding).sum();
    let total_base = lines_total + tickets_total;
    let total = DualMoney::new(total_base, rate.to_secondary(total_base));

    let total_in_tender = total.get(tender.currency);
    let tendered = tender.amount.unwrap_or(total_in_tender);
    let applied_tender = tendered.min(total_in_tender);
    let change = tendered - applied_tender;

    let applied = match tender.currency {
        Currency::Base => DualMoney::new(applied_tender, rate.to_secondary(applied_tender)),
        Currency::Secondary => {
            DualMoney::new(rate.to_base(applied_tender).min(total_base), applied_tender)
        }
    };

    let raw_pending = (total_base - applied.base).floor_zero();
    let (pending, status) = if raw_pending <= epsilon {
        (Money::zero(), SalePaymentStatus::Paid)
    } else {
        (raw_pending, SalePaymentStatus::Partial)
    };

    let allocations = allocate(tickets, applied.base, status == SalePaymentStatus::Paid, epsilon);

    SettlementPlan {
        lines_total,
        tickets_total,
        total,
        tender_currency: tender.currency,
        tendered,
        change,
        applied,
        pending,
        status,
        allocations,
    }
}

/// Spreads `budget` over tickets in input order.
fn allocate(
    tickets: &[TicketBalance],
    budget: Money,
    fully_paid: bool,
    epsilon: Money,
) -> Vec<TicketAllocationPlan> {
    if fully_paid {
        return tickets
            .iter()
            .filter(|t| t.outstanding.is_positive())
            .map(|t| TicketAllocationPlan {
                ticket_id: t.ticket_id.clone(),
                amount: t.outstanding,
                settles: true,
            })
            .collect();
    }

    let mut left = budget;
    let mut out = Vec::new();
    for ticket in tickets {
        if !left.is_positive() {
            break;
        }
        let amount = ticket.outstanding.min(left);
        if !amount.is_positive() {
            continue;
        }
        left -= amount;
        out.push(TicketAllocationPlan {
            ticket_id: ticket.ticket_id.clone(),
            amount,
            settles: ticket.outstanding - amount <= epsilon,
        });
    }
    out
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: Money = Money::from_cents(1);

    fn rate() -> Rate {
        Rate::from_micros(36_500_000)
    }

    fn ticket(id: &str, cents: i64) -> TicketBalance {
        TicketBalance {
            ticket_id: id.to_string(),
            outstanding: Money::from_cents(cents),
        }
    }

    #[test]
    fn test_exact_tender_pays_in_full() {
        let exact = Tender::exact(Currency::Base);
        let plan = plan_settlement(Money::from_cents(2000), &[], exact, rate(), EPS);
        assert_eq!(plan.total, DualMoney::from_cents(2000, 73_000));
        assert_eq!(plan.applied.base.cents(), 2000);
        assert_eq!(plan.change, Money::zero());
        assert_eq!(plan.pending, Money::zero());
        assert_eq!(plan.status, SalePaymentStatus::Paid);
    }

    #[test]
    fn test_over_tender_gives_change() {
        let plan = plan_settlement(
            Money::from_cents(2000),
            &[],
            Tender::of(Currency::Base, Money::from_cents(5000)),
            rate(),
            EPS,
        );
        assert_eq!(plan.applied.base.cents(), 2000);
        assert_eq!(plan.change.cents(), 3000);
        assert_eq!(plan.status, SalePaymentStatus::Paid);
    }

    #[test]
    fn test_secondary_tender_change_in_secondary() {
        // 20.00 base = 730.00 secondary; customer hands 800.00
        let plan = plan_settlement(
            Money::from_cents(2000),
            &[],
            Tender::of(Currency::Secondary, Money::from_cents(80_000)),
            rate(),
            EPS,
        );
        assert_eq!(plan.applied_in_tender().cents(), 73_000);
        assert_eq!(plan.change.cents(), 7_000);
        assert_eq!(plan.applied.base.cents(), 2000);
        assert_eq!(plan.status, SalePaymentStatus::Paid);
    }

    #[test]
    fn test_rounding_within_epsilon_counts_as_paid() {
        // 10.01 base at 3.0 = 30.03 secondary; 30.02 back is 10.0067 -> 10.01
        // 30.01 back is 10.0033 -> 10.00, one cent short
        let rate = Rate::from_micros(3_000_000);
        let plan = plan_settlement(
            Money::from_cents(1001),
            &[],
            Tender::of(Currency::Secondary, Money::from_cents(3001)),
            rate,
            EPS,
        );
        assert_eq!(plan.applied.base.cents(), 1000);
        assert_eq!(plan.pending, Money::zero());
        assert_eq!(plan.status, SalePaymentStatus::Paid);
    }

    #[test]
    fn test_zero_tender_is_full_credit() {
        let plan = plan_settlement(
            Money::from_cents(2000),
            &[],
            Tender::of(Currency::Base, Money::zero()),
            rate(),
            EPS,
        );
        assert_eq!(plan.pending.cents(), 2000);
        assert!(plan.applied.base.is_zero());
        assert_eq!(plan.status, SalePaymentStatus::Partial);
    }

    #[test]
    fn test_full_payment_settles_every_ticket() {
        let tickets = [ticket("t1", 3000), ticket("t2", 1500)];
        let exact = Tender::exact(Currency::Base);
        let plan = plan_settlement(Money::from_cents(1000), &tickets, exact, rate(), EPS);
        assert_eq!(plan.total.base.cents(), 5500);
        assert_eq!(plan.allocations.len(), 2);
        assert!(plan.allocations.iter().all(|a| a.settles));
        assert_eq!(plan.allocations[1].amount.cents(), 1500);
    }

    #[test]
    fn test_partial_payment_allocates_in_input_order() {
        let tickets = [ticket("t1", 3000), ticket("t2", 1500), ticket("t3", 800)];
        let plan = plan_settlement(
            Money::zero(),
            &tickets,
            Tender::of(Currency::Base, Money::from_cents(3500)),
            rate(),
            EPS,
        );
        assert_eq!(plan.status, SalePaymentStatus::Partial);
        assert_eq!(plan.pending.cents(), 1800);
        assert_eq!(plan.allocations.len(), 2);
        assert_eq!(plan.allocations[0].ticket_id, "t1");
        assert_eq!(plan.allocations[0].amount.cents(), 3000);
        assert!(plan.allocations[0].settles);
        assert_eq!(plan.allocations[1].ticket_id, "t2");
        assert_eq!(plan.allocations[1].amount.cents(), 500);
        assert!(!plan.allocations[1].settles);
    }

    #[test]
    fn test_needs_settlement() {
        assert!(!needs_settlement(Money::zero(), EPS));
        assert!(!needs_settlement(Money::from_cents(1), EPS));
        assert!(needs_settlement(Money::from_cents(2), EPS));
    }
}
