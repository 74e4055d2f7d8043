//! # Service Tickets
//!
//! Repair-shop tickets as far as settlement is concerned: what the repair
//! costs, what has been paid, and the delivery/warranty stamp once it is
//! paid in full.
//!
//! ## Total Cost
//! ```text
//! final_cost > 0      → final_cost
//! estimated_cost > 0  → estimated_cost
//! otherwise           → labor_cost + Σ(part.unit_cost × part.quantity)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Received,
    InProgress,
    Ready,
    Delivered,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Received => "received",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Ready => "ready",
            TicketStatus::Delivered => "delivered",
            TicketStatus::Cancelled => "cancelled",
        }
    }
}

/// A repair ticket with its settlement fields.
///
/// `parts_cost_cents` is aggregated from `ticket_parts` when the row is
/// loaded; it is not a stored column.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ServiceTicket {
    pub id: String,
    pub ticket_number: String,
    pub customer_id: Option<String>,
    pub device_description: String,
    pub status: TicketStatus,
    pub estimated_cost_cents: i64,
    pub final_cost_cents: i64,
    pub labor_cost_cents: i64,
    pub parts_cost_cents: i64,
    pub paid_cents: i64,
    #[ts(as = "Option<String>")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub warranty_expires_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ServiceTicket {
    /// What the customer owes for the repair in total.
    pub fn total_cost(&self) -> Money {
        total_cost(
            Money::from_cents(self.final_cost_cents),
            Money::from_cents(self.estimated_cost_cents),
            Money::from_cents(self.labor_cost_cents),
            Money::from_cents(self.parts_cost_cents),
        )
    }

    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    /// Remaining balance, never negative.
    pub fn outstanding(&self) -> Money {
        (self.total_cost() - self.paid()).floor_zero()
    }

    pub fn can_take_payment(&self) -> bool {
        self.status != TicketStatus::Cancelled
    }
}

/// Total cost precedence: final, then estimate, then labor plus parts.
pub fn total_cost(final_cost: Money, estimated: Money, labor: Money, parts: Money) -> Money {
    if final_cost.is_positive() {
        final_cost
    } else if estimated.is_positive() {
        estimated
    } else {
        labor + parts
    }
}

/// A part used in a repair.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TicketPart {
    pub id: String,
    pub ticket_id: String,
    pub product_id: Option<String>,
    pub description: String,
    pub unit_cost_cents: i64,
    pub quantity: i64,
}

impl TicketPart {
    pub fn line_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents).multiply_quantity(self.quantity)
    }
}

/// Sum of part costs.
pub fn parts_cost(parts: &[TicketPart]) -> Money {
    parts.iter().map(TicketPart::line_cost).sum()
}

/// Append-only record of a ticket status change.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TicketStatusLogEntry {
    pub id: String,
    pub ticket_id: String,
    pub from_status: Option<TicketStatus>,
    pub to_status: TicketStatus,
    pub actor_id: String,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// How much of one checkout's tender a ticket absorbed.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TicketAllocation {
    pub id: String,
    pub sale_id: String,
    pub ticket_id: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(final_cost: i64, estimated: i64, labor: i64, parts: i64, paid: i64) -> ServiceTicket {
        ServiceTicket {
            id: "t-1".to_string(),
            ticket_number: "REP-0001".to_string(),
            customer_id: None,
            device_description: "Phone, cracked screen".to_string(),
            status: TicketStatus::Ready,
            estimated_cost_cents: estimated,
            final_cost_cents: final_cost,
            labor_cost_cents: labor,
            parts_cost_cents: parts,
            paid_cents: paid,
            delivered_at: None,
            warranty_expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_total_cost_precedence() {
        assert_eq!(ticket(5000, 4000, 1000, 1500, 0).total_cost().cents(), 5000);
        assert_eq!(ticket(0, 4000, 1000, 1500, 0).total_cost().cents(), 4000);
        assert_eq!(ticket(0, 0, 1000, 1500, 0).total_cost().cents(), 2500);
    }

    #[test]
    fn test_outstanding_never_negative() {
        assert_eq!(ticket(5000, 0, 0, 0, 2000).outstanding().cents(), 3000);
        assert_eq!(ticket(5000, 0, 0, 0, 6000).outstanding(), Money::zero());
    }

    #[test]
    fn test_parts_cost() {
        let parts = vec![
            TicketPart {
                id: "p1".to_string(),
                ticket_id: "t-1".to_string(),
                product_id: None,
                description: "Screen".to_string(),
                unit_cost_cents: 1200,
                quantity: 1,
            },
            TicketPart {
                id: "p2".to_string(),
                ticket_id: "t-1".to_string(),
                product_id: None,
                description: "Screws".to_string(),
                unit_cost_cents: 25,
                quantity: 4,
            },
        ];
        assert_eq!(parts_cost(&parts).cents(), 1300);
    }
}
