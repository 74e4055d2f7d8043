//! # Money Module
//!
//! Integer money in two currencies and the exchange rate that links them.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌                                   │
//! │    36.5 * 0.1 = 3.6500000000000004  ❌ (rate conversion drifts too)      │
//! │                                                                         │
//! │  OUR SOLUTION                                                           │
//! │    Money  = i64 minor units (cents) per currency                        │
//! │    Rate   = i64 micro-units (rate × 1_000_000)                          │
//! │    Conversion = i128 multiply, then ONE round half away from zero       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual Currency
//! Every till has a *base* currency (prices, debts, reconciliation
//! thresholds) and a *secondary* currency customers may pay in. A `Rate`
//! says how many secondary units one base unit buys.
//!
//! ```rust
//! use tillpoint_core::money::{Currency, DualMoney, Money, Rate};
//!
//! let rate = Rate::parse("36.50").unwrap();
//! let total = Money::from_cents(2000);                 // 20.00 base
//! assert_eq!(rate.to_secondary(total).cents(), 73_000); // 730.00 secondary
//!
//! let drawer = DualMoney::new(Money::from_cents(10_000), Money::zero())
//!     .with_added(Currency::Secondary, Money::from_cents(73_000));
//! assert_eq!(drawer.get(Currency::Secondary).cents(), 73_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;

/// Micro-units per whole rate unit (6 decimal places).
pub const RATE_SCALE: i64 = 1_000_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest unit of its currency (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: negative values express variances and refunds
/// - **No currency tag**: the currency is carried by the field or the
///   accompanying [`Currency`], exactly like `*_base_cents` columns
/// - **No float constructor**: there is deliberately no `from_f64`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use tillpoint_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies a unit price by a quantity.
    ///
    /// ```rust
    /// use tillpoint_core::money::Money;
    ///
    /// let line = Money::from_cents(1000).multiply_quantity(2);
    /// assert_eq!(line.cents(), 2000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Clamps negative values to zero.
    ///
    /// Used for "pending debt = max(0, total - paid)" and for debt counters
    /// that must never go below zero.
    #[inline]
    pub const fn floor_zero(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// True when `self` and `other` differ by at most `epsilon`.
    #[inline]
    pub const fn within(&self, other: Money, epsilon: Money) -> bool {
        (self.0 - other.0).abs() <= epsilon.0
    }
}

/// Shows `12.34` / `-5.50`. No symbol: the same type carries both currencies.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Currency
// =============================================================================

/// Which of the two till currencies an amount is denominated in.
///
/// The ISO codes (e.g. USD / VES) are configuration, not part of the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    /// Currency of prices, debts and thresholds.
    Base,
    /// Alternative tender currency, converted through the active rate.
    Secondary,
}

impl Currency {
    pub const ALL: [Currency; 2] = [Currency::Base, Currency::Secondary];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Base => "base",
            Currency::Secondary => "secondary",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Rate
// =============================================================================

/// Secondary units per one base unit, stored as micro-units.
///
/// ## Rounding
/// ```text
/// to_secondary:  cents × micros / 1_000_000   (round half away from zero)
/// to_base:       cents × 1_000_000 / micros   (round half away from zero)
/// ```
/// Each conversion rounds exactly once, on the final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(i64);

impl Rate {
    /// Creates a rate from micro-units without validation.
    ///
    /// Values read back from storage are already guarded by a `CHECK`
    /// constraint; user input goes through [`Rate::new`] or [`Rate::parse`].
    #[inline]
    pub const fn from_micros(micros: i64) -> Self {
        Rate(micros)
    }

    /// Creates a rate, rejecting zero and negative values.
    pub fn new(micros: i64) -> Result<Self, ValidationError> {
        if micros <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "exchange rate".to_string(),
            });
        }
        Ok(Rate(micros))
    }

    /// Parses a decimal string with up to six fractional digits.
    ///
    /// ```rust
    /// use tillpoint_core::money::Rate;
    ///
    /// assert_eq!(Rate::parse("36.5").unwrap().micros(), 36_500_000);
    /// assert_eq!(Rate::parse("1").unwrap().micros(), 1_000_000);
    /// assert!(Rate::parse("0").is_err());
    /// assert!(Rate::parse("1.1234567").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "exchange rate".to_string(),
            reason: reason.to_string(),
        };

        let input = input.trim();
        let (whole, frac) = match input.split_once('.') {
            Some((w, f)) => (w, f),
            None => (input, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(invalid("empty value"));
        }
        if frac.len() > 6 {
            return Err(invalid("at most 6 decimal places"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("must be a positive decimal number"));
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("value too large"))?
        };
        let frac_micros: i64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<6}", frac);
            padded.parse().map_err(|_| invalid("bad fraction"))?
        };

        let micros = whole
            .checked_mul(RATE_SCALE)
            .and_then(|w| w.checked_add(frac_micros))
            .ok_or_else(|| invalid("value too large"))?;

        Rate::new(micros)
    }

    #[inline]
    pub const fn micros(&self) -> i64 {
        self.0
    }

    /// Converts a base amount to the secondary currency.
    pub fn to_secondary(&self, base: Money) -> Money {
        let scaled = base.cents() as i128 * self.0 as i128;
        Money::from_cents(div_round_half_away(scaled, RATE_SCALE as i128) as i64)
    }

    /// Converts a secondary amount to the base currency.
    pub fn to_base(&self, secondary: Money) -> Money {
        if self.0 <= 0 {
            // Only reachable through an unvalidated from_micros(0)
            return Money::zero();
        }
        let scaled = secondary.cents() as i128 * RATE_SCALE as i128;
        Money::from_cents(div_round_half_away(scaled, self.0 as i128) as i64)
    }

    /// Expresses an amount held in `currency` in base units.
    pub fn in_base(&self, amount: Money, currency: Currency) -> Money {
        match currency {
            Currency::Base => amount,
            Currency::Secondary => self.to_base(amount),
        }
    }

    /// Both-currency view of an amount held in `currency`.
    pub fn dual(&self, amount: Money, currency: Currency) -> DualMoney {
        match currency {
            Currency::Base => DualMoney::new(amount, self.to_secondary(amount)),
            Currency::Secondary => DualMoney::new(self.to_base(amount), amount),
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.0 / RATE_SCALE, (self.0 % RATE_SCALE).abs())
    }
}

/// Integer division rounding half away from zero. `d` must be positive.
fn div_round_half_away(n: i128, d: i128) -> i128 {
    if n >= 0 {
        (n + d / 2) / d
    } else {
        -((-n + d / 2) / d)
    }
}

// =============================================================================
// DualMoney
// =============================================================================

/// A pair of amounts, one per currency.
///
/// Used for drawer balances (opening, expected, counted, variance) where
/// each currency is physically separate cash and is never netted against
/// the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DualMoney {
    pub base: Money,
    pub secondary: Money,
}

impl DualMoney {
    pub const fn new(base: Money, secondary: Money) -> Self {
        DualMoney { base, secondary }
    }

    pub const fn from_cents(base: i64, secondary: i64) -> Self {
        DualMoney {
            base: Money::from_cents(base),
            secondary: Money::from_cents(secondary),
        }
    }

    pub const fn zero() -> Self {
        DualMoney::from_cents(0, 0)
    }

    pub fn get(&self, currency: Currency) -> Money {
        match currency {
            Currency::Base => self.base,
            Currency::Secondary => self.secondary,
        }
    }

    /// Returns a copy with `amount` added to one currency.
    pub fn with_added(mut self, currency: Currency, amount: Money) -> Self {
        match currency {
            Currency::Base => self.base += amount,
            Currency::Secondary => self.secondary += amount,
        }
        self
    }

    pub fn is_zero(&self) -> bool {
        self.base.is_zero() && self.secondary.is_zero()
    }
}

impl Sub for DualMoney {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        DualMoney::new(self.base - other.base, self.secondary - other.secondary)
    }
}

impl Add for DualMoney {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        DualMoney::new(self.base + other.base, self.secondary + other.secondary)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
