//! # Receivables and Payables
//!
//! Debts owed *to* the business (receivables, by customers) and *by* the
//! business (payables, to suppliers).
//!
//! ## Balance Law
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   total = paid + balance          (balance is computed, never stored)   │
//! │   0 ≤ paid ≤ total                (CHECK constraint)                    │
//! │   status = f(total, paid)         (AccountStatus::derive)               │
//! │                                                                         │
//! │   paid == 0        → pending                                            │
//! │   0 < paid < total → partial                                            │
//! │   paid >= total    → paid                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Currency, DualMoney, Money, Rate};
use crate::types::PaymentMethod;

// =============================================================================
// Account Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Partial,
    Paid,
}

impl AccountStatus {
    /// Status as a pure function of the account's totals.
    ///
    /// ```rust
    /// use tillpoint_core::{AccountStatus, Money};
    ///
    /// let total = Money::from_cents(2000);
    /// assert_eq!(AccountStatus::derive(total, Money::zero()), AccountStatus::Pending);
    /// assert_eq!(AccountStatus::derive(total, Money::from_cents(500)), AccountStatus::Partial);
    /// assert_eq!(AccountStatus::derive(total, total), AccountStatus::Paid);
    /// ```
    pub fn derive(total: Money, paid: Money) -> Self {
        if paid >= total {
            AccountStatus::Paid
        } else if paid.is_positive() {
            AccountStatus::Partial
        } else {
            AccountStatus::Pending
        }
    }
}

// =============================================================================
// Parties
// =============================================================================

/// Customer credit data. Profile management lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub payment_terms_days: i64,
    /// Running debt counter in base cents. Never negative.
    pub current_debt_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub payment_terms_days: i64,
    /// What the business owes this supplier, in base cents.
    pub current_debt_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Receivable
// =============================================================================

/// A customer's debt, usually the unpaid part of one sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReceivableAccount {
    pub id: String,
    pub customer_id: String,
    pub sale_id: Option<String>,
    pub total_cents: i64,
    pub paid_cents: i64,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    pub status: AccountStatus,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ReceivableAccount {
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    pub fn balance(&self) -> Money {
        self.total() - self.paid()
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != AccountStatus::Paid && today > self.due_date
    }
}

/// A payment absorbed by a receivable.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CustomerPayment {
    pub id: String,
    pub account_id: String,
    pub customer_id: String,
    /// Drawer session that took the money.
    pub session_id: String,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub amount_base_cents: i64,
    pub amount_secondary_cents: i64,
    pub rate_micros: i64,
    pub balance_before_cents: i64,
    pub balance_after_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CustomerPayment {
    pub fn amount(&self) -> DualMoney {
        DualMoney::from_cents(self.amount_base_cents, self.amount_secondary_cents)
    }

    pub fn rate(&self) -> Rate {
        Rate::from_micros(self.rate_micros)
    }
}

// =============================================================================
// Payable
// =============================================================================

/// What the business owes a supplier, usually for a received purchase.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PayableAccount {
    pub id: String,
    pub supplier_id: String,
    pub purchase_reference: Option<String>,
    pub total_cents: i64,
    pub paid_cents: i64,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    pub status: AccountStatus,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl PayableAccount {
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    pub fn balance(&self) -> Money {
        self.total() - self.paid()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SupplierPayment {
    pub id: String,
    pub account_id: String,
    pub supplier_id: String,
    pub session_id: String,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub amount_base_cents: i64,
    pub amount_secondary_cents: i64,
    pub rate_micros: i64,
    pub balance_before_cents: i64,
    pub balance_after_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SupplierPayment {
    pub fn amount(&self) -> DualMoney {
        DualMoney::from_cents(self.amount_base_cents, self.amount_secondary_cents)
    }
}

// =============================================================================
// Payment Application
// =============================================================================

/// Outcome of applying a payment to a running balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedPayment {
    /// Amount actually credited (clamped to the balance within epsilon).
    pub amount: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    pub new_paid: Money,
    pub status: AccountStatus,
}

/// Applies `amount` (base) to an account with `total` and `paid`.
///
/// Returns `None` when the amount exceeds the balance by more than
/// `epsilon`. A payment within `epsilon` above the balance is clamped so
/// that `paid` never exceeds `total`.
///
/// ```rust
/// use tillpoint_core::{apply_payment, AccountStatus, Money};
///
/// let applied = apply_payment(
///     Money::from_cents(2000),
///     Money::from_cents(500),
///     Money::from_cents(1501),
///     Money::from_cents(1),
/// )
/// .unwrap();
/// assert_eq!(applied.amount.cents(), 1500);
/// assert_eq!(applied.balance_after, Money::zero());
/// assert_eq!(applied.status, AccountStatus::Paid);
/// ```
pub fn apply_payment(
    total: Money,
    paid: Money,
    amount: Money,
    epsilon: Money,
) -> Option<AppliedPayment> {
    let balance_before = total - paid;
    if amount > balance_before + epsilon {
        return None;
    }
    let credited = amount.min(balance_before);
    let new_paid = paid + credited;
    Some(AppliedPayment {
        amount: credited,
        balance_before,
        balance_after: total - new_paid,
        new_paid,
        status: AccountStatus::derive(total, new_paid),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_function_of_totals() {
        let total = Money::from_cents(2000);
        assert_eq!(AccountStatus::derive(total, Money::zero()), AccountStatus::Pending);
        assert_eq!(AccountStatus::derive(total, Money::from_cents(1)), AccountStatus::Partial);
        assert_eq!(AccountStatus::derive(total, Money::from_cents(1999)), AccountStatus::Partial);
        assert_eq!(AccountStatus::derive(total, total), AccountStatus::Paid);
    }

    #[test]
    fn test_apply_partial_payment_keeps_balance_law() {
        let total = Money::from_cents(2000);
        let eps = Money::from_cents(1);
        let applied =
            apply_payment(total, Money::from_cents(500), Money::from_cents(700), eps).unwrap();
        assert_eq!(applied.balance_before.cents(), 1500);
        assert_eq!(applied.balance_after.cents(), 800);
        assert_eq!(applied.new_paid + applied.balance_after, total);
        assert_eq!(applied.status, AccountStatus::Partial);
    }

    #[test]
    fn test_overpayment_rejected_beyond_epsilon() {
        let result = apply_payment(
            Money::from_cents(2000),
            Money::from_cents(500),
            Money::from_cents(1502),
            Money::from_cents(1),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_overdue() {
        let account = ReceivableAccount {
            id: "ar".to_string(),
            customer_id: "c".to_string(),
            sale_id: None,
            total_cents: 100,
            paid_cents: 0,
            due_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            status: AccountStatus::Pending,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(account.is_overdue(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()));
        assert!(!account.is_overdue(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()));
    }
}
