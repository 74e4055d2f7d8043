//! # tillpoint-engine: Settlement Engine for Tillpoint
//!
//! Turns till operations into consistent, all-or-nothing mutations across
//! stock, the dual-currency cash drawer, receivables/payables and repair
//! tickets.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tillpoint Architecture                           │
//! │                                                                         │
//! │  caller (till UI, API, batch job)                                       │
//! │       │  operator_id + request                                          │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │             ★ tillpoint-engine (THIS CRATE) ★                   │    │
//! │  │                                                                 │    │
//! │  │   Engine ── services::drawer    open / close / expense / summary│    │
//! │  │          ── services::checkout  sale, credit, ticket settlement │    │
//! │  │          ── services::accounts  receivable / payable payments   │    │
//! │  │          ── services::returns   refunds with stock restore      │    │
//! │  │          ── services::stock     adjustments, low stock          │    │
//! │  │          ── services::rates     active exchange rate            │    │
//! │  │          ── services::tickets   repair parts, desk payment      │    │
//! │  │          ── services::purchases supplier delivery → payable     │    │
//! │  │          ── services::outbox    replay of unpublished events    │    │
//! │  │                                                                 │    │
//! │  │   one UnitOfWork per call ─► commit ─► EventEmitter             │    │
//! │  └─────────────────────────────────────────────────────────────────┘   ─│
//! │       │                               │                                 │
//! │       ▼                               ▼                                 │
//! │  tillpoint-core (pure math)      tillpoint-db (SQLite)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tillpoint_engine::{CheckoutLine, CheckoutRequest, Engine, EngineConfig};
//! use tillpoint_core::{DualMoney, Money};
//!
//! let engine = Engine::connect(EngineConfig::from_env()?).await?;
//!
//! engine.open_session("ana", DualMoney::from_cents(10_000, 0), None).await?;
//! let receipt = engine
//!     .checkout(CheckoutRequest::new("ana").line(product_id, 2))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod events;
pub mod services;
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, EngineConfig};
pub use error::{EngineError, EngineResult};
pub use events::{BroadcastEmitter, DomainEvent, EventEmitter, LedgerSide, NoOpEmitter};
pub use services::checkout::{CheckoutLine, CheckoutReceipt, CheckoutRequest};
pub use services::accounts::Statement;
pub use services::drawer::SessionSummary;
pub use services::purchases::{PurchaseLine, PurchaseReceipt};
pub use services::returns::{ReturnItem, ReturnReceipt};
pub use services::tickets::TicketPaymentReceipt;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use tillpoint_core::{CashSession, CommerceError, ExchangeRate};
use tillpoint_db::{Database, UnitOfWork};

// =============================================================================
// Engine
// =============================================================================

/// Entry point for every business operation.
///
/// Cheap to clone; clones share the pool, configuration and emitter.
#[derive(Clone)]
pub struct Engine {
    db: Database,
    config: Arc<EngineConfig>,
    emitter: Arc<dyn EventEmitter>,
}

impl Engine {
    /// Creates an engine over an existing database, broadcasting events.
    pub fn new(db: Database, config: EngineConfig) -> Self {
        let emitter = Arc::new(BroadcastEmitter::new(config.event_channel_capacity));
        Engine {
            db,
            config: Arc::new(config),
            emitter,
        }
    }

    /// Opens (and migrates) the configured database.
    pub async fn connect(config: EngineConfig) -> EngineResult<Self> {
        let db = Database::new(config.db_config()).await?;
        info!(path = %config.database_path.display(), "Engine ready");
        Ok(Engine::new(db, config))
    }

    /// Replaces the event emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Live feed of committed events. `None` if the emitter has no feed.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<DomainEvent>> {
        self.emitter.subscribe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Shared steps
    // =========================================================================

    /// The operator's open drawer, or `NoOpenSession`.
    pub(crate) async fn require_open_session(
        uow: &mut UnitOfWork,
        operator_id: &str,
    ) -> EngineResult<CashSession> {
        uow.cash().find_open(operator_id).await?.ok_or_else(|| {
            CommerceError::NoOpenSession {
                operator_id: operator_id.to_string(),
            }
            .into()
        })
    }

    /// The active rate row, or `NoActiveRate`.
    pub(crate) async fn require_rate(uow: &mut UnitOfWork) -> EngineResult<ExchangeRate> {
        uow.rates()
            .active()
            .await?
            .ok_or_else(|| CommerceError::NoActiveRate.into())
    }

    /// Persists events next to the writes that produced them.
    pub(crate) async fn enqueue(uow: &mut UnitOfWork, events: &[DomainEvent]) -> EngineResult<()> {
        for event in events {
            uow.outbox()
                .enqueue(event.event_type(), event.aggregate_id(), event)
                .await?;
        }
        Ok(())
    }

    /// Commits, then hands the events to the emitter.
    pub(crate) async fn commit_and_publish(
        &self,
        uow: UnitOfWork,
        events: Vec<DomainEvent>,
    ) -> EngineResult<()> {
        uow.commit().await?;
        for event in &events {
            self.emitter.emit(event);
        }
        Ok(())
    }
}
