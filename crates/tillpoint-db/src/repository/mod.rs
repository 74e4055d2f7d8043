//! # Repository Module
//!
//! Database repositories for Tillpoint.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories inside a Unit of Work                   │
//! │                                                                         │
//! │  Engine operation                                                       │
//! │       │                                                                 │
//! │       │  let mut uow = db.begin().await?;                               │
//! │       │  uow.stock().reserve(..)                                        │
//! │       ▼                                                                 │
//! │  StockRepository<'_>  ── borrows the transaction's connection           │
//! │  ├── reserve / restore / adjust                                         │
//! │  ├── get / low_stock                                                    │
//! │  └── log_for                                                           ─│
//! │       │                                                                 │
//! │       │  SQL on &mut SqliteConnection                                  │
//! │       ▼                                                                 │
//! │  SQLite (same transaction for every repository)                        │
//! │                                                                         │
//! │  A repository cannot outlive its unit of work, so nothing can write    │
//! │  outside a transaction.                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Catalog rows
//! - [`StockRepository`] - Quantities and the inventory log
//! - [`RateRepository`] - The active exchange rate
//! - [`CashRepository`] - Drawer sessions and the cash ledger
//! - [`SaleRepository`] - Sales, lines, allocations and returns
//! - [`TicketRepository`] - Repair tickets
//! - [`CustomerRepository`] / [`SupplierRepository`] - Parties and debt counters
//! - [`ReceivableRepository`] / [`PayableRepository`] - Accounts and payments
//! - [`OutboxRepository`] - Domain event outbox

pub mod accounts;
pub mod cash;
pub mod outbox;
pub mod party;
pub mod product;
pub mod rate;
pub mod sale;
pub mod stock;
pub mod ticket;

pub use accounts::{PayableRepository, ReceivableRepository};
pub use cash::CashRepository;
pub use outbox::OutboxRepository;
pub use party::{CustomerRepository, SupplierRepository};
pub use product::ProductRepository;
pub use rate::RateRepository;
pub use sale::SaleRepository;
pub use stock::{StockOutcome, StockRepository};
pub use ticket::TicketRepository;
