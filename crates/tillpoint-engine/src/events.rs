//! # Domain Events
//!
//! Facts the engine announces once they are committed.
//!
//! ## Delivery
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  unit of work                                                           │
//! │  ├── business writes                                                    │
//! │  ├── outbox.enqueue(event)        persisted with the writes             │
//! │  └── COMMIT ───────────────┐                                           ─│
//! │                            ▼                                           │
//! │                  emitter.emit(event)   only after a successful commit  │
//! │                            │                                           │
//! │          ┌─────────────────┴──────────────────┐                        │
//! │          ▼                                    ▼                        │
//! │    NoOpEmitter                         BroadcastEmitter                │
//! │    (drops it)                          tokio broadcast → subscribe()   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A rolled-back operation never reaches an emitter and leaves no outbox
//! row. A subscriber that lags behind loses the oldest events; the outbox
//! still has them, and `Engine::publish_pending` hands them to the emitter
//! again (at-least-once).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use ts_rs::TS;

use tillpoint_core::{DualMoney, Money, SalePaymentStatus};

// =============================================================================
// Events
// =============================================================================

/// Which ledger a payment was registered against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum LedgerSide {
    Receivable,
    Payable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    SaleCompleted {
        sale_id: String,
        receipt_number: String,
        session_id: String,
        operator_id: String,
        customer_id: Option<String>,
        total: DualMoney,
        applied_base: Money,
        pending_base: Money,
        status: SalePaymentStatus,
        #[ts(as = "String")]
        occurred_at: DateTime<Utc>,
    },
    TicketDelivered {
        ticket_id: String,
        ticket_number: String,
        /// The checkout that paid it off; `None` for direct payment or
        /// manual delivery.
        sale_id: Option<String>,
        #[ts(as = "String")]
        warranty_expires_at: DateTime<Utc>,
        #[ts(as = "String")]
        occurred_at: DateTime<Utc>,
    },
    SessionClosed {
        session_id: String,
        session_code: String,
        operator_id: String,
        expected: DualMoney,
        actual: DualMoney,
        variance: DualMoney,
        #[ts(as = "String")]
        occurred_at: DateTime<Utc>,
    },
    PaymentRegistered {
        payment_id: String,
        account_id: String,
        side: LedgerSide,
        amount_base: Money,
        balance_after: Money,
        #[ts(as = "String")]
        occurred_at: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Outbox `event_type` value.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::SaleCompleted { .. } => "sale_completed",
            DomainEvent::TicketDelivered { .. } => "ticket_delivered",
            DomainEvent::SessionClosed { .. } => "session_closed",
            DomainEvent::PaymentRegistered { .. } => "payment_registered",
        }
    }

    /// Id of the record the event is about.
    pub fn aggregate_id(&self) -> &str {
        match self {
            DomainEvent::SaleCompleted { sale_id, .. } => sale_id,
            DomainEvent::TicketDelivered { ticket_id, .. } => ticket_id,
            DomainEvent::SessionClosed { session_id, .. } => session_id,
            DomainEvent::PaymentRegistered { account_id, .. } => account_id,
        }
    }
}

// =============================================================================
// Emitters
// =============================================================================

/// Receives events after their unit of work committed.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: &DomainEvent);

    /// A live feed of future events, when the emitter offers one.
    fn subscribe(&self) -> Option<broadcast::Receiver<DomainEvent>> {
        None
    }
}

/// Discards every event.
pub struct NoOpEmitter;

impl EventEmitter for NoOpEmitter {
    fn emit(&self, _event: &DomainEvent) {}
}

/// Fans events out to any number of in-process subscribers.
pub struct BroadcastEmitter {
    tx: broadcast::Sender<DomainEvent>,
}

impl BroadcastEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        BroadcastEmitter { tx }
    }
}

impl EventEmitter for BroadcastEmitter {
    fn emit(&self, event: &DomainEvent) {
        // No subscribers is not an error
        let receivers = self.tx.send(event.clone()).unwrap_or(0);
        trace!(event_type = event.event_type(), receivers, "Event broadcast");
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<DomainEvent>> {
        Some(self.tx.subscribe())
    }
}
