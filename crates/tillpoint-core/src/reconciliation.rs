//! # Reconciliation Calculator
//!
//! Derives what a drawer *should* hold from its ledger rows alone, and
//! judges the gap to what was counted.
//!
//! ## Formula (per currency)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  expected[c] =   Σ opening[c]                                           │
//! │                + Σ cash sale[c]      + Σ cash payment[c]                │
//! │                - Σ cash expense[c]   - Σ cash refund[c]                 │
//! │                                                                         │
//! │  [c]      → rows whose tender currency is c, amount in c                │
//! │  closing  → ignored (it records the count, not a movement)              │
//! │  non-cash → ignored (card/transfer never touch the drawer)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine keeps its own running `expected_*` columns. At close the two
//! must agree to the cent; any disagreement is an integrity failure.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CommerceError, CommerceResult};
use crate::money::{Currency, DualMoney, Money, Rate, RATE_SCALE};
use crate::types::{CashLedgerEntry, CashSession, EntryType};

// =============================================================================
// Breakdown
// =============================================================================

/// Drawer movements of one currency, grouped by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CurrencyBreakdown {
    pub opening: Money,
    pub sales: Money,
    pub receivable_payments: Money,
    /// Expenses and supplier payments paid out of the drawer.
    pub expenses: Money,
    pub refunds: Money,
}

impl CurrencyBreakdown {
    pub fn expected(&self) -> Money {
        self.opening + self.sales + self.receivable_payments - self.expenses - self.refunds
    }

    fn record(&mut self, entry_type: EntryType, amount: Money) {
        match entry_type {
            EntryType::Opening => self.opening += amount,
            EntryType::Sale => self.sales += amount,
            EntryType::Payment => self.receivable_payments += amount,
            EntryType::Expense => self.expenses += amount,
            EntryType::Refund => self.refunds += amount,
            EntryType::Closing => {}
        }
    }
}

/// Both currencies of a drawer, derived from ledger rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DrawerBreakdown {
    pub base: CurrencyBreakdown,
    pub secondary: CurrencyBreakdown,
}

impl DrawerBreakdown {
    pub fn expected(&self) -> DualMoney {
        DualMoney::new(self.base.expected(), self.secondary.expected())
    }

    pub fn currency(&self, currency: Currency) -> &CurrencyBreakdown {
        match currency {
            Currency::Base => &self.base,
            Currency::Secondary => &self.secondary,
        }
    }
}

/// Sums a session's ledger rows into a breakdown.
pub fn derive_expected(entries: &[CashLedgerEntry]) -> DrawerBreakdown {
    let mut breakdown = DrawerBreakdown::default();
    for entry in entries.iter().filter(|e| e.method.is_cash()) {
        let bucket = match entry.currency {
            Currency::Base => &mut breakdown.base,
            Currency::Secondary => &mut breakdown.secondary,
        };
        bucket.record(entry.entry_type, entry.tender_amount());
    }
    breakdown
}

/// Derives the expected balance and checks it against the session's
/// running totals.
///
/// ## Errors
/// `ReconciliationMismatch` naming the first currency that disagrees.
pub fn reconcile(
    session: &CashSession,
    entries: &[CashLedgerEntry],
) -> CommerceResult<DrawerBreakdown> {
    let breakdown = derive_expected(entries);
    let derived = breakdown.expected();
    let running = session.expected();

    for currency in Currency::ALL {
        if derived.get(currency) != running.get(currency) {
            return Err(CommerceError::ReconciliationMismatch {
                session_id: session.id.clone(),
                currency,
                running: running.get(currency),
                derived: derived.get(currency),
            });
        }
    }

    Ok(breakdown)
}

// =============================================================================
// Variance
// =============================================================================

/// Close-out variance and whether it needs an explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VarianceAssessment {
    /// Signed actual - expected per currency.
    pub variance: DualMoney,
    /// Secondary variance expressed in base, for the materiality test.
    pub secondary_in_base: Money,
    pub requires_explanation: bool,
}

/// Compares counted against expected.
///
/// A variance is material when either currency's absolute gap, measured in
/// base units, is strictly greater than `threshold`. The secondary gap is
/// compared unrounded; `secondary_in_base` is only for display.
///
/// ```rust
/// use tillpoint_core::money::{DualMoney, Money, Rate};
/// use tillpoint_core::reconciliation::assess_variance;
///
/// let a = assess_variance(
///     DualMoney::from_cents(12_000, 0),
///     DualMoney::from_cents(13_000, 0),
///     Rate::from_micros(36_500_000),
///     Money::from_cents(500),
/// );
/// assert_eq!(a.variance.base.cents(), 1000);
/// assert!(a.requires_explanation);
/// ```
pub fn assess_variance(
    expected: DualMoney,
    actual: DualMoney,
    rate: Rate,
    threshold: Money,
) -> VarianceAssessment {
    let variance = actual - expected;
    let secondary_in_base = rate.to_base(variance.secondary);
    let requires_explanation =
        variance.base.abs() > threshold || secondary_exceeds(variance.secondary, rate, threshold);

    VarianceAssessment {
        variance,
        secondary_in_base,
        requires_explanation,
    }
}

/// `|secondary| / rate > threshold`, cross-multiplied so nothing rounds.
fn secondary_exceeds(secondary: Money, rate: Rate, threshold: Money) -> bool {
    let scaled = i128::from(secondary.cents()).abs() * i128::from(RATE_SCALE);
    scaled > i128::from(threshold.cents()) * i128::from(rate.micros())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CashSessionStatus, PaymentMethod};
    use chrono::Utc;

    fn entry(
        entry_type: EntryType,
        currency: Currency,
        method: PaymentMethod,
        base: i64,
        secondary: i64,
    ) -> CashLedgerEntry {
        CashLedgerEntry {
            id: format!("e-{:?}-{}", entry_type, base),
            session_id: "s-1".to_string(),
            entry_type,
            currency,
            method,
            amount_base_cents: base,
            amount_secondary_cents: secondary,
            rate_micros: 40_000_000,
            description: String::new(),
            reference_id: None,
            created_at: Utc::now(),
        }
    }

    fn session(expected_base: i64, expected_secondary: i64) -> CashSession {
        CashSession {
            id: "s-1".to_string(),
            session_code: "DRW-TEST".to_string(),
            operator_id: "ana".to_string(),
            status: CashSessionStatus::Open,
            opening_base_cents: 10_000,
            opening_secondary_cents: 40_000,
            expected_base_cents: expected_base,
            expected_secondary_cents: expected_secondary,
            actual_base_cents: None,
            actual_secondary_cents: None,
            variance_base_cents: None,
            variance_secondary_cents: None,
            opening_rate_micros: 40_000_000,
            notes: None,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    fn ledger() -> Vec<CashLedgerEntry> {
        use Currency::*;
        use EntryType::*;
        use PaymentMethod::*;
        vec![
            entry(Opening, Base, Cash, 10_000, 400_000),
            entry(Opening, Secondary, Cash, 1_000, 40_000),
            entry(Sale, Base, Cash, 2_000, 80_000),
            entry(Sale, Secondary, Cash, 500, 20_000),
            entry(Sale, Base, Card, 9_999, 399_960),
            entry(Payment, Base, Cash, 300, 12_000),
            entry(Expense, Base, Cash, 150, 6_000),
            entry(Refund, Secondary, Cash, 100, 4_000),
            entry(Closing, Base, Cash, 99_999, 99_999),
        ]
    }

    #[test]
    fn test_derive_filters_by_tender_currency_and_method() {
        let b = derive_expected(&ledger());
        assert_eq!(b.base.opening.cents(), 10_000);
        assert_eq!(b.base.sales.cents(), 2_000);
        assert_eq!(b.base.expected().cents(), 10_000 + 2_000 + 300 - 150);
        assert_eq!(b.secondary.expected().cents(), 40_000 + 20_000 - 4_000);
        assert_eq!(b.currency(Currency::Secondary).refunds.cents(), 4_000);
    }

    #[test]
    fn test_reconcile_agrees() {
        let s = session(12_150, 56_000);
        let b = reconcile(&s, &ledger()).unwrap();
        assert_eq!(b.expected(), DualMoney::from_cents(12_150, 56_000));
    }

    #[test]
    fn test_reconcile_mismatch_names_currency() {
        let s = session(12_150, 56_001);
        match reconcile(&s, &ledger()) {
            Err(CommerceError::ReconciliationMismatch { currency, running, derived, .. }) => {
                assert_eq!(currency, Currency::Secondary);
                assert_eq!(running.cents(), 56_001);
                assert_eq!(derived.cents(), 56_000);
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_materiality_threshold_is_strict() {
        let rate = Rate::from_micros(40_000_000);
        let threshold = Money::from_cents(500);
        let expected = DualMoney::from_cents(10_000, 40_000);

        // Exactly 5.00 short is not material
        let a = assess_variance(expected, DualMoney::from_cents(9_500, 40_000), rate, threshold);
        assert!(!a.requires_explanation);

        // 5.01 base over is material
        let a = assess_variance(expected, DualMoney::from_cents(10_501, 40_000), rate, threshold);
        assert!(a.requires_explanation);

        // 240.00 secondary short = 6.00 base -> material
        let a = assess_variance(expected, DualMoney::from_cents(10_000, 16_000), rate, threshold);
        assert_eq!(a.secondary_in_base.cents(), -600);
        assert!(a.requires_explanation);
    }

    #[test]
    fn test_secondary_gap_is_not_rounded_away() {
        let rate = Rate::from_micros(36_500_000);
        let threshold = Money::from_cents(500);
        let expected = DualMoney::from_cents(10_000, 0);

        // 182.51 secondary is 5.0003 base: shown as 5.00, still material
        let a = assess_variance(expected, DualMoney::from_cents(10_000, 18_251), rate, threshold);
        assert_eq!(a.secondary_in_base.cents(), 500);
        assert!(a.requires_explanation);

        // 182.50 secondary is exactly 5.00 base
        let a = assess_variance(expected, DualMoney::from_cents(10_000, -18_250), rate, threshold);
        assert!(!a.requires_explanation);
    }
}
