//! # Domain Types
//!
//! Catalog, stock, exchange rate, cash drawer and sale records.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │    Product      │   │   StockItem     │   │ InventoryLog    │        │
//! │  │  sku, price,    │──►│  quantity ≥ 0   │──►│ old/new/delta   │        │
//! │  │  cost           │   │  reorder_level  │   │ (append-only)   │        │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       ─│
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  CashSession    │──►│ CashLedgerEntry │   │  ExchangeRate   │       │
//! │  │  open → closed  │   │ opening, sale,  │   │  one active row │       │
//! │  │  expected/actual│   │ payment, ...    │   │  rate_micros    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Sale       │──►│    SaleLine     │   │   SaleReturn    │       │
//! │  │  frozen totals, │   │  price & cost   │   │  refunded lines │       │
//! │  │  rate, tender   │   │  snapshots      │   │                 │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Monetary fields are stored as `*_cents: i64` (and rates as
//! `rate_micros: i64`) so rows map straight onto SQLite integers; accessor
//! methods lift them into [`Money`] / [`Rate`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Currency, DualMoney, Money, Rate};

// =============================================================================
// Product
// =============================================================================

/// A sellable catalog item. Read-only to the settlement engine.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    /// Unit price in base cents.
    pub price_cents: i64,
    /// Unit cost in base cents.
    pub cost_cents: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }
}

// =============================================================================
// Stock
// =============================================================================

/// Available quantity of one product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockItem {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    /// Never negative (CHECK constraint and conditional updates).
    pub quantity: i64,
    /// At or below this level the item shows up in low-stock reports.
    pub reorder_level: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    pub fn is_low(&self) -> bool {
        self.quantity <= self.reorder_level
    }
}

/// Why a stock quantity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockMovement {
    /// Reserved by a checkout.
    Sale,
    /// Restored by a customer return.
    Return,
    /// Manual correction with a reason.
    Adjustment,
    /// Goods received (initial load, purchase).
    Receipt,
}

/// Immutable record of one stock mutation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryLogEntry {
    pub id: String,
    pub product_id: String,
    pub movement: StockMovement,
    pub old_quantity: i64,
    pub new_quantity: i64,
    pub delta: i64,
    pub note: Option<String>,
    /// Sale, return or other business event that caused the change.
    pub reference_id: Option<String>,
    pub actor_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Quantities before and after a reservation or restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockChange {
    pub before: i64,
    pub after: i64,
}

// =============================================================================
// Exchange Rate
// =============================================================================

/// A stored conversion rate between the base and secondary currency.
///
/// Exactly one row is active at a time (partial unique index).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ExchangeRate {
    pub id: String,
    pub base_code: String,
    pub secondary_code: String,
    /// Secondary units per base unit × 1_000_000.
    pub rate_micros: i64,
    pub source: String,
    #[ts(as = "String")]
    pub effective_date: NaiveDate,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRate {
    #[inline]
    pub fn rate(&self) -> Rate {
        Rate::from_micros(self.rate_micros)
    }
}

// =============================================================================
// Cash Session
// =============================================================================

/// Drawer session lifecycle. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum CashSessionStatus {
    Open,
    Closed,
}

/// One operator's shift-scoped cash float in both currencies.
///
/// ## Lifecycle
/// ```text
///  (none) ──open──► Open ──close──► Closed (sealed)
///                    │
///                    └── every cash movement appends a ledger entry
///                        and moves expected_* in its tender currency
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashSession {
    pub id: String,
    /// Human-readable code, e.g. `DRW-20260314-ana-7F3A`.
    pub session_code: String,
    pub operator_id: String,
    pub status: CashSessionStatus,
    pub opening_base_cents: i64,
    pub opening_secondary_cents: i64,
    /// Running expected balance maintained by the engine.
    pub expected_base_cents: i64,
    pub expected_secondary_cents: i64,
    pub actual_base_cents: Option<i64>,
    pub actual_secondary_cents: Option<i64>,
    /// Signed actual - expected, set on close.
    pub variance_base_cents: Option<i64>,
    pub variance_secondary_cents: Option<i64>,
    /// Rate captured when the session was opened.
    pub opening_rate_micros: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl CashSession {
    pub fn is_open(&self) -> bool {
        self.status == CashSessionStatus::Open
    }

    pub fn opening(&self) -> DualMoney {
        DualMoney::from_cents(self.opening_base_cents, self.opening_secondary_cents)
    }

    pub fn expected(&self) -> DualMoney {
        DualMoney::from_cents(self.expected_base_cents, self.expected_secondary_cents)
    }

    pub fn actual(&self) -> Option<DualMoney> {
        match (self.actual_base_cents, self.actual_secondary_cents) {
            (Some(b), Some(s)) => Some(DualMoney::from_cents(b, s)),
            _ => None,
        }
    }

    pub fn variance(&self) -> Option<DualMoney> {
        match (self.variance_base_cents, self.variance_secondary_cents) {
            (Some(b), Some(s)) => Some(DualMoney::from_cents(b, s)),
            _ => None,
        }
    }

    /// Money missing from the drawer per currency (zero when not short).
    pub fn shortage(&self) -> DualMoney {
        let v = self.variance().unwrap_or_default();
        DualMoney::new((-v.base).floor_zero(), (-v.secondary).floor_zero())
    }

    /// Money in excess of expected per currency (zero when not over).
    pub fn overage(&self) -> DualMoney {
        let v = self.variance().unwrap_or_default();
        DualMoney::new(v.base.floor_zero(), v.secondary.floor_zero())
    }

    pub fn opening_rate(&self) -> Rate {
        Rate::from_micros(self.opening_rate_micros)
    }
}

// =============================================================================
// Cash Ledger
// =============================================================================

/// Kind of drawer movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Opening,
    Closing,
    Sale,
    Payment,
    Expense,
    Refund,
}

impl EntryType {
    /// Direction a cash entry of this type moves the drawer.
    ///
    /// ```rust
    /// use tillpoint_core::EntryType;
    ///
    /// assert_eq!(EntryType::Sale.drawer_sign(), 1);
    /// assert_eq!(EntryType::Refund.drawer_sign(), -1);
    /// assert_eq!(EntryType::Closing.drawer_sign(), 0);
    /// ```
    pub const fn drawer_sign(&self) -> i64 {
        match self {
            EntryType::Opening | EntryType::Sale | EntryType::Payment => 1,
            EntryType::Expense | EntryType::Refund => -1,
            EntryType::Closing => 0,
        }
    }
}

/// How money changed hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical notes and coins: the only method that moves the drawer.
    Cash,
    Card,
    Transfer,
    MobilePayment,
}

impl PaymentMethod {
    #[inline]
    pub fn is_cash(&self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

/// Append-only drawer movement.
///
/// Amounts are unsigned magnitudes in both currencies; the direction comes
/// from [`EntryType::drawer_sign`]. `currency` is the currency physically
/// handed over. `closing` rows carry the counted amounts and never move the
/// drawer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashLedgerEntry {
    pub id: String,
    pub session_id: String,
    pub entry_type: EntryType,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub amount_base_cents: i64,
    pub amount_secondary_cents: i64,
    pub rate_micros: i64,
    pub description: String,
    pub reference_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CashLedgerEntry {
    pub fn amount(&self) -> DualMoney {
        DualMoney::from_cents(self.amount_base_cents, self.amount_secondary_cents)
    }

    /// Amount in the currency actually tendered.
    pub fn tender_amount(&self) -> Money {
        self.amount().get(self.currency)
    }

    /// Signed effect on the drawer in the tender currency.
    pub fn drawer_effect(&self) -> Money {
        if !self.method.is_cash() {
            return Money::zero();
        }
        self.tender_amount() * self.entry_type.drawer_sign()
    }
}

/// Input for appending a ledger entry.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub session_id: String,
    pub entry_type: EntryType,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub amount: DualMoney,
    pub rate: Rate,
    pub description: String,
    pub reference_id: Option<String>,
}

// =============================================================================
// Sale
// =============================================================================

/// Whether a sale was fully paid at the till.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SalePaymentStatus {
    Paid,
    /// Part of the total was left as a receivable.
    Partial,
}

/// A completed checkout. Immutable apart from `status`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub receipt_number: String,
    pub session_id: String,
    pub operator_id: String,
    pub customer_id: Option<String>,
    /// Tender currency.
    pub currency: Currency,
    pub method: PaymentMethod,
    pub total_base_cents: i64,
    pub total_secondary_cents: i64,
    /// Rate captured once for the whole checkout.
    pub rate_micros: i64,
    /// Handed over, in the tender currency.
    pub tendered_cents: i64,
    /// Given back, in the tender currency.
    pub change_cents: i64,
    /// Part of the total covered at the till, in base.
    pub applied_base_cents: i64,
    /// Part of the total left on credit, in base.
    pub pending_base_cents: i64,
    pub status: SalePaymentStatus,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    pub fn total(&self) -> DualMoney {
        DualMoney::from_cents(self.total_base_cents, self.total_secondary_cents)
    }

    pub fn applied(&self) -> Money {
        Money::from_cents(self.applied_base_cents)
    }

    pub fn pending(&self) -> Money {
        Money::from_cents(self.pending_base_cents)
    }

    pub fn rate(&self) -> Rate {
        Rate::from_micros(self.rate_micros)
    }
}

/// A line item. Product data is frozen at checkout time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub unit_cost_cents: i64,
    pub line_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Returns
// =============================================================================

/// Goods brought back against an earlier sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleReturn {
    pub id: String,
    pub sale_id: String,
    pub session_id: String,
    pub operator_id: String,
    /// Currency the refund was paid out in.
    pub currency: Currency,
    pub refund_base_cents: i64,
    pub refund_secondary_cents: i64,
    pub rate_micros: i64,
    pub reason: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleReturn {
    pub fn refund(&self) -> DualMoney {
        DualMoney::from_cents(self.refund_base_cents, self.refund_secondary_cents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleReturnLine {
    pub id: String,
    pub return_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Price frozen on the original sale line.
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

// =============================================================================
// Event Outbox
// =============================================================================

/// A domain event persisted in the same transaction that produced it.
///
/// Downstream pollers read unpublished rows and mark them published.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct EventOutboxEntry {
    pub id: String,
    /// "sale_completed", "ticket_delivered", "session_closed", ...
    pub event_type: String,
    pub aggregate_id: String,
    /// The full event as JSON.
    pub payload: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub published_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================
