use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use serde::{Deserialize, Serialize};

use crate::{ResultSettlement, SettlementError};

/// Number of fractional digits tracked by [`Money`].
pub const MINOR_DIGITS: u32 = 4;

/// Minor units in one major unit (`10^MINOR_DIGITS`).
pub const MINOR_PER_MAJOR: i64 = 10_000;

/// Signed money amount represented as **integer minor units**, where one
/// major unit is `10_000` minor units.
///
/// Four decimals instead of the usual two: unit prices in trade documents
/// regularly need sub-cent precision (`0.0001`). The minor unit here has
/// nothing to do with a currency's official subdivision.
///
/// Every sum, percentage split and conversion in the engine happens on this
/// integer. Decimals ([`Decimal`]) and floats only appear at the boundary.
///
/// # Examples
///
/// ```rust
/// use settlement::Money;
///
/// let amount = Money::new(12_3400);
/// assert_eq!(amount.minor(), 123_400);
/// assert_eq!(amount.to_string(), "12.3400");
/// assert_eq!(amount.format(2), "12.34");
/// ```
///
/// Strict parsing (accepts `.` or `,` as decimal separator; rejects more
/// than 4 decimals):
///
/// ```rust
/// use settlement::Money;
///
/// assert_eq!("10".parse::<Money>().unwrap().minor(), 100_000);
/// assert_eq!("10,5".parse::<Money>().unwrap().minor(), 105_000);
/// assert!("1.23456".parse::<Money>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Creates a new amount from integer minor units.
    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns `true` if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[must_use]
    pub const fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Converts a major-unit decimal, rounding half away from zero to the
    /// nearest minor unit.
    pub fn from_major(major: Decimal) -> ResultSettlement<Money> {
        round_to_minor(major.checked_mul(Decimal::from(MINOR_PER_MAJOR)))
            .ok_or_else(|| SettlementError::InvalidAmount(format!("amount out of range: {major}")))
    }

    /// Converts a float coming from a UI or a spreadsheet cell.
    pub fn from_f64(major: f64) -> ResultSettlement<Money> {
        if !major.is_finite() {
            return Err(SettlementError::InvalidAmount(format!(
                "amount is not finite: {major}"
            )));
        }
        let major = Decimal::from_f64(major)
            .ok_or_else(|| SettlementError::InvalidAmount(format!("amount out of range: {major}")))?;
        Self::from_major(major)
    }

    /// Lenient conversion used by import-style callers.
    ///
    /// `None`, empty and malformed input all yield [`Money::ZERO`]; malformed
    /// input is logged. Callers that validate should use `str::parse`.
    #[must_use]
    pub fn parse_lenient(input: Option<&str>) -> Money {
        let Some(raw) = input.map(str::trim).filter(|s| !s.is_empty()) else {
            return Money::ZERO;
        };
        match raw.parse::<Decimal>().map(Self::from_major) {
            Ok(Ok(money)) => money,
            _ => {
                tracing::warn!(input = raw, "non-numeric money input coerced to zero");
                Money::ZERO
            }
        }
    }

    /// Exact major-unit value (4 fractional digits).
    #[must_use]
    pub fn to_major(self) -> Decimal {
        Decimal::new(self.0, MINOR_DIGITS)
    }

    /// Renders the amount with thousands separators and `decimals`
    /// fractional digits (clamped to 4), rounding half away from zero.
    ///
    /// ```rust
    /// use settlement::Money;
    ///
    /// assert_eq!(Money::new(12_345_678_9012).format(2), "12,345,678.90");
    /// assert_eq!(Money::new(12_345_678_9012).format(4), "12,345,678.9012");
    /// ```
    #[must_use]
    pub fn format(self, decimals: u32) -> String {
        let decimals = decimals.min(MINOR_DIGITS);
        let divisor = 10_i128.pow(MINOR_DIGITS - decimals);
        let value = i128::from(self.0);
        let magnitude = (value.abs() + divisor / 2) / divisor;
        let unit = 10_i128.pow(decimals);
        let whole = group_thousands(magnitude / unit);
        let fraction = magnitude % unit;
        let sign = if value < 0 && magnitude != 0 { "-" } else { "" };
        if decimals == 0 {
            format!("{sign}{whole}")
        } else {
            format!("{sign}{whole}.{fraction:0width$}", width = decimals as usize)
        }
    }

    /// `round(self × percentage / 100)`, computed exactly.
    pub fn percent_of(self, percentage: Decimal) -> ResultSettlement<Money> {
        round_to_minor(
            Decimal::from(self.0)
                .checked_mul(percentage)
                .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED)),
        )
        .ok_or_else(|| {
            SettlementError::InvalidAmount(format!("{percentage}% of {self} is out of range"))
        })
    }

    /// `round(self × rate)`: the amount expressed in the target currency.
    pub fn convert(self, rate: Decimal) -> ResultSettlement<Money> {
        round_to_minor(Decimal::from(self.0).checked_mul(rate))
            .ok_or_else(|| SettlementError::InvalidAmount(format!("{self} × {rate} is out of range")))
    }
}

fn round_to_minor(value: Option<Decimal>) -> Option<Money> {
    value
        .map(|v| v.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|v| v.to_i64())
        .map(Money)
}

fn group_thousands(value: i128) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Lenient `to_minor`: `None`, empty or malformed input is 0.
#[must_use]
pub fn to_minor(input: Option<&str>) -> i64 {
    Money::parse_lenient(input).minor()
}

/// `to_major`: `None` is 0.
#[must_use]
pub fn to_major(minor: Option<i64>) -> Decimal {
    Money::new(minor.unwrap_or_default()).to_major()
}

/// `format`: `None` renders as zero.
#[must_use]
pub fn format(minor: Option<i64>, decimals: u32) -> String {
    Money::new(minor.unwrap_or_default()).format(decimals)
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / MINOR_PER_MAJOR.unsigned_abs();
        let fraction = abs % MINOR_PER_MAJOR.unsigned_abs();
        write!(f, "{sign}{whole}.{fraction:04}")
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl FromStr for Money {
    type Err = SettlementError;

    /// Strictly parses a major-unit decimal string.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    ///
    /// Validation rules:
    /// - max 4 fractional digits (rejects `1.23456`)
    /// - rejects empty/invalid strings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let empty = || SettlementError::InvalidAmount("empty amount".to_string());
        let invalid = || SettlementError::InvalidAmount(format!("invalid amount: {s}"));
        let overflow = || SettlementError::InvalidAmount("amount too large".to_string());

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(empty());
        }

        let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (true, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (false, stripped)
        } else {
            (false, trimmed)
        };

        let rest = rest.trim();
        if rest.is_empty() {
            return Err(empty());
        }

        let rest = rest.replace(',', ".");
        let mut parts = rest.split('.');
        let whole_str = parts.next().ok_or_else(invalid)?;
        let fraction_str = parts.next();

        if parts.next().is_some() {
            return Err(invalid());
        }

        if whole_str.is_empty() || !whole_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: i64 = whole_str.parse().map_err(|_| overflow())?;

        let fraction: i64 = match fraction_str {
            None | Some("") => 0,
            Some(frac) => {
                if !frac.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                let digits = u32::try_from(frac.len()).map_err(|_| invalid())?;
                if digits > MINOR_DIGITS {
                    return Err(SettlementError::InvalidAmount(
                        "too many decimals".to_string(),
                    ));
                }
                frac.parse::<i64>().map_err(|_| invalid())? * 10_i64.pow(MINOR_DIGITS - digits)
            }
        };

        let total = whole
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|v| v.checked_add(fraction))
            .ok_or_else(overflow)?;

        let signed = if negative {
            total.checked_neg().ok_or_else(overflow)?
        } else {
            total
        };

        Ok(Money(signed))
    }
}
