//! # tillpoint-db: Database Layer for Tillpoint
//!
//! SQLite persistence for the commerce engine, on sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tillpoint Data Flow                              │
//! │                                                                         │
//! │  Engine operation (checkout, close_session, ...)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                  tillpoint-db (THIS CRATE)                      │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │      │
//! │  │   │   Database    │    │  UnitOfWork   │    │  Migrations  │  │      │
//! │  │   │   (pool.rs)   │───►│ write lock +  │    │  (embedded)  │  │      │
//! │  │   │               │    │ repositories  │    │              │  │      │
//! │  │   │ SqlitePool    │    │ StockRepo     │    │ 001_init.sql │  │      │
//! │  │   │ busy_timeout  │    │ CashRepo ...  │    │              │  │      │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │      │
//! │  │                                                                 │    │
//! │  └─────────────────────────────────────────────────────────────────┘   ─│
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`unit_of_work`] - Transaction scope with repository accessors
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tillpoint_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("shop.db")).await?;
//!
//! let mut uow = db.begin().await?;
//! let rate = uow.rates().active().await?;
//! uow.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod unit_of_work;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use unit_of_work::UnitOfWork;

pub use repository::accounts::{NewPayable, NewReceivable};
pub use repository::cash::SessionClosing;
pub use repository::ticket::NewTicket;
pub use repository::{
    CashRepository, CustomerRepository, OutboxRepository, PayableRepository, ProductRepository,
    RateRepository, ReceivableRepository, SaleRepository, StockOutcome, StockRepository,
    SupplierRepository, TicketRepository,
};
