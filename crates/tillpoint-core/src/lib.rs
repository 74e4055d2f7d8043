//! # tillpoint-core: Pure Business Logic for Tillpoint
//!
//! Everything that can be decided without touching storage lives here:
//! integer money, exchange-rate conversion, the domain model, input
//! validation, the drawer reconciliation calculator and checkout settlement
//! math.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tillpoint Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                  tillpoint-engine (orchestration)               │    │
//! │  │   checkout, open/close drawer, receivable/payable payments      │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘   ─│
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ tillpoint-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌────────────────┐ ┌────────────┐  │   │
//! │  │   │  money   │ │  types   │ │ reconciliation │ │ settlement │  │   │
//! │  │   │ Money    │ │ Session  │ │ expected from  │ │ totals,    │  │   │
//! │  │   │ Rate     │ │ Sale     │ │ ledger rows    │ │ allocation │  │   │
//! │  │   └──────────┘ └──────────┘ └────────────────┘ └────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 tillpoint-db (Database Layer)                   │   │
//! │  │        SQLite, migrations, unit of work, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - `Money`, `Currency`, `Rate` and `DualMoney` (integer arithmetic only)
//! - [`types`] - Catalog, stock, drawer, sale and outbox records
//! - [`accounts`] - Receivables, payables and the parties that owe or are owed
//! - [`ticket`] - Repair tickets and their settlement fields
//! - [`reconciliation`] - Drawer expected-balance calculator and variance rules
//! - [`settlement`] - Checkout totals, pending debt and ticket allocation
//! - [`calendar`] - Business-day arithmetic (Sundays skipped)
//! - [`validation`] - Input validation
//! - [`error`] - Domain error taxonomy
//!
//! ## Example Usage
//!
//! ```rust
//! use tillpoint_core::money::{Money, Rate};
//!
//! let price = Money::from_cents(1000);       // 10.00 base
//! let rate = Rate::from_micros(36_500_000);  // 36.5 secondary per base
//!
//! assert_eq!(rate.to_secondary(price).cents(), 36_500);
//! assert_eq!(rate.to_base(Money::from_cents(36_500)).cents(), 1000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod accounts;
pub mod calendar;
pub mod error;
pub mod money;
pub mod reconciliation;
pub mod settlement;
pub mod ticket;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use accounts::*;
pub use error::{CommerceError, CommerceResult, ErrorKind, ValidationError};
pub use money::{Currency, DualMoney, Money, Rate};
pub use ticket::*;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single checkout line.
///
/// Catches fat-fingered entries (1000 instead of 10) before stock is touched.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum number of lines plus tickets in one checkout.
pub const MAX_CHECKOUT_LINES: usize = 100;

/// Tolerance under which an outstanding amount counts as fully paid (0.01 base).
pub const SETTLED_EPSILON_CENTS: i64 = 1;

/// Close-out variance above which an explanatory note is mandatory (5.00 base).
pub const MATERIALITY_THRESHOLD_CENTS: i64 = 500;

/// Credit terms applied when a customer or supplier has none on file.
pub const DEFAULT_PAYMENT_TERMS_DAYS: u32 = 30;

/// Warranty length for delivered repairs, in business days.
pub const DEFAULT_WARRANTY_BUSINESS_DAYS: u32 = 7;
