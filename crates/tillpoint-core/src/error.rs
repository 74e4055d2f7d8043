//! # Error Types
//!
//! Domain error taxonomy for tillpoint-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tillpoint-core errors (this file)                                      │
//! │  ├── CommerceError    - Business rule violations                        │
//! │  └── ValidationError  - Malformed input, caught before any mutation    ─│
//! │                                                                         │
//! │  tillpoint-db errors (separate crate)                                  │
//! │  └── DbError          - Storage failures (constraint, busy, ...)       │
//! │                                                                         │
//! │  tillpoint-engine errors                                               │
//! │  └── EngineError      - Either of the above, plus kind()/retryable     │
//! │                                                                         │
//! │  Every CommerceError belongs to exactly one ErrorKind:                 │
//! │    Validation │ Conflict │ Precondition │ Integrity │ NotFound          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Name the violated rule and the specific resource in every message
//! 3. Errors are enum variants, never String
//! 4. Nothing in the core retries; callers decide

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::money::{Currency, Money};

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input; nothing was touched.
    Validation,
    /// The request contradicts current state (stock, balances, sessions).
    Conflict,
    /// A prerequisite is missing (open session, active rate, customer).
    Precondition,
    /// Stored data disagrees with itself. Never resolved silently.
    Integrity,
    /// A referenced record does not exist.
    NotFound,
}

// =============================================================================
// Commerce Error
// =============================================================================

/// Business rule violations raised by the settlement engine.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Not enough stock for a reservation or a negative adjustment.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout line (qty: 5)
    ///      │
    ///      ▼
    /// reserve(): available = 3
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "SCREEN-A10", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Whole checkout rolls back; UI shows "Only 3 SCREEN-A10 in stock"
    /// ```
    #[error(
        "Insufficient stock for {sku} ({product_id}): \
         available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: String,
        sku: String,
        available: i64,
        requested: i64,
    },

    /// The operator already has an open drawer session.
    #[error("Operator {operator_id} already has an open cash session ({session_code})")]
    DuplicateOpenSession {
        operator_id: String,
        session_code: String,
    },

    /// The operation needs an open drawer session and there is none.
    #[error("Operator {operator_id} has no open cash session")]
    NoOpenSession { operator_id: String },

    /// No exchange rate is marked active.
    #[error("No active exchange rate is configured")]
    NoActiveRate,

    /// Part of the checkout would be left on credit but no customer was given.
    #[error("Pending balance of {pending} requires a customer to carry the debt")]
    CustomerRequiredForCredit { pending: Money },

    /// The account has nothing left to pay.
    #[error("Account {account_id} is already settled")]
    AccountAlreadySettled { account_id: String },

    /// A payment larger than the remaining balance.
    #[error("Payment of {amount} exceeds balance {balance} on account {account_id}")]
    OverPayment {
        account_id: String,
        amount: Money,
        balance: Money,
    },

    /// Close-out variance above the materiality threshold without a note.
    #[error(
        "Variance of {variance_base} base / {variance_secondary_in_base} secondary (in base) \
         on session {session_id} exceeds {threshold}; a closing note is required"
    )]
    ExplanationRequired {
        session_id: String,
        variance_base: Money,
        variance_secondary_in_base: Money,
        threshold: Money,
    },

    /// Running expected balance disagrees with the ledger-derived one.
    #[error(
        "Cash session {session_id} does not reconcile in {currency}: \
         running total {running}, ledger total {derived}"
    )]
    ReconciliationMismatch {
        session_id: String,
        currency: Currency,
        running: Money,
        derived: Money,
    },

    /// Returning more units than remain unreturned on a sale.
    #[error(
        "Cannot return {requested} of product {product_id} on sale {sale_id}: \
         sold {sold}, already returned {already_returned}"
    )]
    ReturnExceedsSold {
        sale_id: String,
        product_id: String,
        sold: i64,
        already_returned: i64,
        requested: i64,
    },

    /// The ticket is in a state that cannot take payments.
    #[error("Service ticket {ticket_id} is {status} and cannot be settled")]
    TicketNotSettleable { ticket_id: String, status: String },

    /// A delivered or cancelled ticket can no longer change.
    #[error("Service ticket {ticket_id} is {status} and can no longer change")]
    TicketClosed { ticket_id: String, status: String },

    /// Delivery asked for while a balance is still open.
    #[error("Service ticket {ticket_id} still has {outstanding} outstanding")]
    TicketNotPaid { ticket_id: String, outstanding: Money },

    /// The referenced tickets have nothing left to pay.
    #[error("Nothing to settle: all referenced tickets are already paid")]
    NothingToSettle,

    /// The supplier's purchase was already booked into stock.
    #[error("Purchase {purchase_reference} from supplier {supplier_id} was already received")]
    PurchaseAlreadyReceived {
        supplier_id: String,
        purchase_reference: String,
    },

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CommerceError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CommerceError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CommerceError::Validation(_) | CommerceError::ExplanationRequired { .. } => {
                ErrorKind::Validation
            }
            CommerceError::InsufficientStock { .. }
            | CommerceError::DuplicateOpenSession { .. }
            | CommerceError::AccountAlreadySettled { .. }
            | CommerceError::OverPayment { .. }
            | CommerceError::ReturnExceedsSold { .. }
            | CommerceError::TicketNotSettleable { .. }
            | CommerceError::TicketClosed { .. }
            | CommerceError::NothingToSettle
            | CommerceError::PurchaseAlreadyReceived { .. } => ErrorKind::Conflict,
            CommerceError::NoOpenSession { .. }
            | CommerceError::NoActiveRate
            | CommerceError::CustomerRequiredForCredit { .. }
            | CommerceError::TicketNotPaid { .. } => ErrorKind::Precondition,
            CommerceError::ReconciliationMismatch { .. } => ErrorKind::Integrity,
            CommerceError::NotFound { .. } => ErrorKind::NotFound,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any state is read or written.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid rate).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Same value listed twice where it must be unique.
    #[error("{field} '{value}' is listed more than once")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type CommerceResult<T> = Result<T, CommerceError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_resource() {
        let err = CommerceError::InsufficientStock {
            product_id: "p-1".to_string(),
            sku: "SCREEN-A10".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for SCREEN-A10 (p-1): available 3, requested 5"
        );

        let err = CommerceError::OverPayment {
            account_id: "ar-9".to_string(),
            amount: Money::from_cents(2000),
            balance: Money::from_cents(1500),
        };
        assert_eq!(
            err.to_string(),
            "Payment of 20.00 exceeds balance 15.00 on account ar-9"
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(CommerceError::NoActiveRate.kind(), ErrorKind::Precondition);
        assert_eq!(
            CommerceError::not_found("Product", "x").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CommerceError::ReconciliationMismatch {
                session_id: "s".to_string(),
                currency: Currency::Base,
                running: Money::from_cents(1),
                derived: Money::from_cents(2),
            }
            .kind(),
            ErrorKind::Integrity
        );
        assert_eq!(
            CommerceError::ExplanationRequired {
                session_id: "s".to_string(),
                variance_base: Money::from_cents(1000),
                variance_secondary_in_base: Money::zero(),
                threshold: Money::from_cents(500),
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(CommerceError::NothingToSettle.kind(), ErrorKind::Conflict);
        assert_eq!(
            CommerceError::TicketNotPaid {
                ticket_id: "t".to_string(),
                outstanding: Money::from_cents(100),
            }
            .kind(),
            ErrorKind::Precondition
        );
    }

    #[test]
    fn test_validation_converts_to_commerce_error() {
        let validation_err = ValidationError::Required {
            field: "operator".to_string(),
        };
        let err: CommerceError = validation_err.into();
        assert!(matches!(err, CommerceError::Validation(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
