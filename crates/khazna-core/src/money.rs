//! # Money Module
//!
//! `Money`, `Currency` and `ExchangeRate`: every monetary figure in Khazna
//! flows through these three types.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004                                      │
//! │                                                                         │
//! │  A cashbox that is the sum of thousands of such values drifts, and     │
//! │  "balance == Σ transactions" stops holding exactly.                    │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units (cents / dirham-cents)              │
//! │    10.00 LYD  → 1000                                                    │
//! │    Exchange rates are fixed-point with 6 decimals (micros)             │
//! │    4.850000   → 4_850_000                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Currencies, No Implicit Conversion
//! ```text
//!   Sale (USD, rate 4.85) ──► cashbox.balance_usd      (no conversion)
//!                        └──► customer.balance_owed    (converted to base)
//! ```
//! Conversion only happens when a caller explicitly asks for it through
//! [`ExchangeRate::convert`] or [`to_base`].
//!
//! ## Usage
//! ```rust
//! use khazna_core::money::{Currency, ExchangeRate, Money};
//!
//! let price = Money::from_cents(1099);
//! let doubled = price * 2;
//! assert_eq!(doubled.cents(), 2198);
//!
//! let rate: ExchangeRate = "4.85".parse().unwrap();
//! assert_eq!(rate.convert(Money::from_cents(1000)).cents(), 4850);
//! assert_eq!(Currency::Lyd.format(Money::from_cents(4850)), "48.50 LYD");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest unit of its currency (two decimals).
///
/// Signed: refunds and negative balance deltas are ordinary values.
/// The currency is carried alongside (on the sale, on the cashbox column),
/// never inside the value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ```rust
    /// use khazna_core::money::Money;
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

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion, always 0-99.
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

    /// Multiplies a unit amount by a quantity.
    ///
    /// ```rust
    /// use khazna_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(1000);
    /// assert_eq!(unit_price.multiply_quantity(2).cents(), 2000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Parses a decimal string with at most two fractional digits.
    ///
    /// ```rust
    /// use khazna_core::money::Money;
    ///
    /// assert_eq!(Money::parse("10.5").unwrap().cents(), 1050);
    /// assert_eq!(Money::parse("-0.05").unwrap().cents(), -5);
    /// assert!(Money::parse("1.005").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Money, ValidationError> {
        parse_fixed_point(input, 2, "amount").map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor_part())
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

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Currency
// =============================================================================

/// The two currencies a cashbox tracks independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Currency {
    /// US dollar.
    Usd,
    /// Libyan dinar.
    Lyd,
}

impl Currency {
    /// ISO 4217 code.
    pub const fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Lyd => "LYD",
        }
    }

    /// Formats an amount for receipts and logs.
    ///
    /// ```rust
    /// use khazna_core::money::{Currency, Money};
    ///
    /// assert_eq!(Currency::Usd.format(Money::from_cents(-1234)), "-$12.34");
    /// assert_eq!(Currency::Lyd.format(Money::from_cents(1500)), "15.00 LYD");
    /// ```
    pub fn format(&self, amount: Money) -> String {
        match self {
            Currency::Usd => {
                let sign = if amount.is_negative() { "-" } else { "" };
                format!("{}${}", sign, amount.abs())
            }
            Currency::Lyd => format!("{} LYD", amount),
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::Lyd
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "LYD" => Ok(Currency::Lyd),
            _ => Err(ValidationError::NotAllowed {
                field: "currency".to_string(),
                allowed: vec!["USD".to_string(), "LYD".to_string()],
            }),
        }
    }
}

// =============================================================================
// Exchange Rate
// =============================================================================

/// Scale of [`ExchangeRate`]: six decimal places.
pub const RATE_SCALE: i64 = 1_000_000;

/// Fixed-point exchange rate: base-currency units per one unit of the
/// sale currency, with six decimal places.
///
/// Serialized as a decimal string (`"4.850000"`) so that no caller ever
/// routes a rate through a float.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExchangeRate(i64);

impl ExchangeRate {
    /// Creates a rate from micros (`4_850_000` = 4.85).
    pub fn from_micros(micros: i64) -> Result<Self, ValidationError> {
        if micros <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "exchange_rate".to_string(),
            });
        }
        Ok(ExchangeRate(micros))
    }

    #[inline]
    pub const fn micros(&self) -> i64 {
        self.0
    }

    /// Converts an amount in the sale currency to the base currency.
    ///
    /// Rounds half away from zero to the nearest minor unit, so a refund
    /// converts to exactly the negation of the matching charge.
    ///
    /// ```rust
    /// use khazna_core::money::{ExchangeRate, Money};
    ///
    /// let rate = ExchangeRate::from_micros(4_855_000).unwrap();
    /// assert_eq!(rate.convert(Money::from_cents(1)).cents(), 5);
    /// assert_eq!(rate.convert(Money::from_cents(-1)).cents(), -5);
    /// ```
    pub fn convert(&self, amount: Money) -> Money {
        let num = amount.cents() as i128 * self.0 as i128;
        let scale = RATE_SCALE as i128;
        let quotient = num / scale;
        let remainder = num % scale;
        let rounded = if remainder.abs() * 2 >= scale {
            quotient + num.signum()
        } else {
            quotient
        };
        Money::from_cents(rounded as i64)
    }
}

impl FromStr for ExchangeRate {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let micros = parse_fixed_point(s, 6, "exchange_rate")?;
        ExchangeRate::from_micros(micros)
    }
}

impl TryFrom<String> for ExchangeRate {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExchangeRate> for String {
    fn from(rate: ExchangeRate) -> Self {
        rate.to_string()
    }
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.0 / RATE_SCALE, self.0 % RATE_SCALE)
    }
}

/// Converts `amount` (denominated in `currency`) into `base`.
///
/// ## Rules
/// - Same currency: returned unchanged, `rate` must be absent
/// - Different currency: `rate` is required
pub fn to_base(
    amount: Money,
    currency: Currency,
    base: Currency,
    rate: Option<ExchangeRate>,
) -> CoreResult<Money> {
    check_rate_presence(currency, base, rate)?;
    match rate {
        Some(rate) => Ok(rate.convert(amount)),
        None => Ok(amount),
    }
}

/// An exchange rate is required iff the sale currency differs from base.
pub fn check_rate_presence(
    currency: Currency,
    base: Currency,
    rate: Option<ExchangeRate>,
) -> Result<(), ValidationError> {
    match (currency == base, rate.is_some()) {
        (true, true) => Err(ValidationError::Inconsistent {
            field: "exchange_rate".to_string(),
            reason: format!("must be omitted for {} sales (base currency)", currency),
        }),
        (false, false) => Err(ValidationError::Required {
            field: "exchange_rate".to_string(),
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Parsing
// =============================================================================

fn parse_fixed_point(input: &str, scale: u32, field: &str) -> Result<i64, ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = input.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("empty"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("expected a decimal number"));
    }
    if frac.len() > scale as usize {
        return Err(invalid(&format!("at most {} decimal places", scale)));
    }

    let unit = 10_i64.pow(scale);
    let whole_value: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("out of range"))?
    };
    let frac_value: i64 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = scale as usize);
        padded.parse().map_err(|_| invalid("out of range"))?
    };

    let value = whole_value
        .checked_mul(unit)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| invalid("out of range"))?;

    Ok(if negative { -value } else { value })
}

// =============================================================================
// Unit Tests
// =============================================================================
