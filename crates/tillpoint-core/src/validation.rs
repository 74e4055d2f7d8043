//! # Validation Module
//!
//! Input checks that run before a unit of work is opened.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Engine entry point                                            │
//! │  └── THIS MODULE: shape of the request (quantities, amounts, ids)      ─│
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engine inside the unit of work                               │
//! │  └── State rules (stock available, balance owed, session open)         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity >= 0), CHECK (paid <= total)                      │
//! │  ├── UNIQUE open session per operator, one active rate                 │
//! │  └── Append-only and sealed-session triggers                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::money::{DualMoney, Money};
use crate::{MAX_CHECKOUT_LINES, MAX_ITEM_QUANTITY};

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted free-text note or reason.
pub const MAX_NOTE_LENGTH: usize = 500;

// =============================================================================
// Identifiers and Text
// =============================================================================

/// Validates an identifier supplied by a collaborator (operator, account...).
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if id.len() > 64 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 64,
        });
    }
    Ok(())
}

/// Validates a mandatory free-text reason (adjustments, returns, expenses).
pub fn validate_reason(field: &str, reason: &str) -> ValidationResult<()> {
    if reason.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    validate_optional_note(field, Some(reason))
}

/// Validates an optional note: absent is fine, too long is not.
pub fn validate_optional_note(field: &str, note: Option<&str>) -> ValidationResult<()> {
    match note {
        Some(n) if n.len() > MAX_NOTE_LENGTH => Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NOTE_LENGTH,
        }),
        _ => Ok(()),
    }
}

/// True when a note carries actual text.
pub fn has_text(note: Option<&str>) -> bool {
    note.map(|n| !n.trim().is_empty()).unwrap_or(false)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a checkout or return quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a manual stock delta: any non-zero value.
pub fn validate_stock_delta(delta: i64) -> ValidationResult<()> {
    if delta == 0 {
        return Err(ValidationError::InvalidFormat {
            field: "delta".to_string(),
            reason: "must not be zero".to_string(),
        });
    }
    Ok(())
}

/// Validates a payment amount: must be positive.
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }
    Ok(())
}

/// Validates a tendered amount: zero (full credit) is allowed, negative is not.
pub fn validate_tender(amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "tendered amount".to_string(),
        });
    }
    Ok(())
}

/// Validates opening or counted drawer balances.
pub fn validate_drawer_amounts(field: &str, amounts: DualMoney) -> ValidationResult<()> {
    if amounts.base.is_negative() || amounts.secondary.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the size of a checkout.
pub fn validate_checkout_size(lines: usize, tickets: usize) -> ValidationResult<()> {
    if lines + tickets == 0 {
        return Err(ValidationError::Required {
            field: "line items or service tickets".to_string(),
        });
    }
    if lines + tickets > MAX_CHECKOUT_LINES {
        return Err(ValidationError::OutOfRange {
            field: "checkout lines".to_string(),
            min: 1,
            max: MAX_CHECKOUT_LINES as i64,
        });
    }
    Ok(())
}

/// Rejects the same id appearing twice (tickets may only be settled once per checkout).
pub fn validate_unique<'a>(
    field: &str,
    ids: impl IntoIterator<Item = &'a str>,
) -> ValidationResult<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ValidationError::Duplicate {
                field: field.to_string(),
                value: id.to_string(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_id_and_reason() {
        assert!(validate_id("operator", "ana").is_ok());
        assert!(validate_id("operator", "  ").is_err());
        assert!(validate_id("operator", &"x".repeat(65)).is_err());

        assert!(validate_reason("reason", "damaged in transit").is_ok());
        assert!(validate_reason("reason", "").is_err());
        assert!(validate_reason("reason", &"x".repeat(501)).is_err());
    }

    #[test]
    fn test_has_text() {
        assert!(has_text(Some("counted twice")));
        assert!(!has_text(Some("   ")));
        assert!(!has_text(None));
    }

    #[test]
    fn test_amounts() {
        assert!(validate_payment_amount(Money::from_cents(1)).is_ok());
        assert!(validate_payment_amount(Money::zero()).is_err());
        assert!(validate_tender(Money::zero()).is_ok());
        assert!(validate_tender(Money::from_cents(-1)).is_err());
        assert!(validate_drawer_amounts("opening", DualMoney::from_cents(0, 0)).is_ok());
        assert!(validate_drawer_amounts("opening", DualMoney::from_cents(0, -5)).is_err());
        assert!(validate_stock_delta(-3).is_ok());
        assert!(validate_stock_delta(0).is_err());
    }

    #[test]
    fn test_checkout_shape() {
        assert!(validate_checkout_size(0, 0).is_err());
        assert!(validate_checkout_size(1, 0).is_ok());
        assert!(validate_checkout_size(0, 2).is_ok());
        assert!(validate_checkout_size(100, 1).is_err());

        assert!(validate_unique("ticket", ["a", "b"]).is_ok());
        assert!(validate_unique("ticket", ["a", "b", "a"]).is_err());
    }
}
