use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_CODE: &str = "IDR";
/// The number of minor units in one major currency unit.
pub const MINOR_UNITS: i64 = 100;

//--------------------------------------        Money         ---------------------------------------------------------
/// An amount of money, stored as a whole number of minor units (hundredths).
///
/// `Money` never holds fractional minor units. Every calculation that could produce one (commissions, percentage
/// discounts) goes through [`Percentage::apply`], which rounds half-up.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a currency amount: {0}")]
pub struct MoneyConversionError(String);

impl FromStr for Money {
    type Err = MoneyConversionError;

    /// Parses a decimal amount in major units, e.g. `"65000"`, `"65000.5"` or `"65000.50"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (major, minor) = digits.split_once('.').unwrap_or((digits, ""));
        if major.is_empty() || minor.len() > 2 || !minor.chars().all(|c| c.is_ascii_digit()) {
            return Err(MoneyConversionError(s.to_string()));
        }
        let major = major.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}. {e}")))?;
        let minor = match minor.len() {
            0 => 0,
            1 => minor.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}. {e}")))? * 10,
            _ => minor.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}. {e}")))?,
        };
        let value = major
            .checked_mul(MINOR_UNITS)
            .and_then(|v| v.checked_add(minor))
            .ok_or_else(|| MoneyConversionError(format!("{s} is out of range")))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let units = MINOR_UNITS.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / units, abs % units)
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major(units: i64) -> Self {
        Self(units * MINOR_UNITS)
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// `None` on overflow
    pub fn checked_mul(&self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }

    /// `None` on overflow
    pub fn checked_add(&self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }
}

//--------------------------------------      Percentage      ---------------------------------------------------------
/// A percentage with two decimal places, stored in hundredths of a percent. `Percentage::from(1000)` is 10%.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Percentage(i64);

impl From<i64> for Percentage {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, (self.0 % 100).abs())
    }
}

impl Percentage {
    const SCALE: i128 = 10_000;

    pub fn from_percent(percent: i64) -> Self {
        Self(percent * 100)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Returns this percentage of `amount`, rounded half-up (away from zero) to the nearest minor unit.
    pub fn apply(&self, amount: Money) -> Money {
        let product = i128::from(amount.value()) * i128::from(self.0);
        let half = Self::SCALE / 2;
        let rounded = if product >= 0 { (product + half) / Self::SCALE } else { (product - half) / Self::SCALE };
        // |amount * rate| / 10_000 fits back into i64 for any rate up to 100%
        #[allow(clippy::cast_possible_truncation)]
        Money::from(rounded as i64)
    }
}
