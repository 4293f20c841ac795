//! Money amounts backed by [Decimal].
//!
//! Every amount carries exactly two decimal places and fits in an `i64` of minor units
//! (hundredths), which is how it is stored in SQLite. Floating point is never used for money
//! in this crate, and arithmetic that would leave that range fails instead of wrapping.

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize, Serializer};

use crate::Error;

/// The number of decimal places every amount is kept at.
const SCALE: u32 = 2;

/// The number of minor units in one major unit.
const MINOR_PER_MAJOR: i64 = 100;

/// An amount of money with two decimal places of precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// No money at all.
    pub const ZERO: Money = Money::from_minor(0);

    /// The largest amount accepted from outside the ledger, one trillion.
    ///
    /// Balances are sums of many such amounts and may grow past it.
    pub const MAX_INPUT: Money = Money::from_major(1_000_000_000_000);

    /// Create an amount from a number of minor units, e.g. `Money::from_minor(12_345)` is 123.45.
    pub const fn from_minor(minor_units: i64) -> Self {
        let magnitude = minor_units.unsigned_abs();

        Self(Decimal::from_parts(
            magnitude as u32,
            (magnitude >> 32) as u32,
            0,
            minor_units < 0,
            SCALE,
        ))
    }

    /// Create an amount from a whole number of major units, e.g. `Money::from_major(110_000)`.
    pub const fn from_major(major_units: i64) -> Self {
        Self::from_minor(major_units * MINOR_PER_MAJOR)
    }

    /// The amount as a number of minor units, or `None` if it does not fit in an `i64`.
    pub fn minor_units(self) -> Option<i64> {
        i64::try_from(self.0.mantissa()).ok()
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(self) -> bool {
        !self.0.is_zero() && self.0.is_sign_negative()
    }

    pub fn is_positive(self) -> bool {
        !self.0.is_zero() && self.0.is_sign_positive()
    }

    /// # Errors
    /// Returns [Error::AmountOverflow] if the sum is too large to store.
    pub fn checked_add(self, rhs: Money) -> Result<Money, Error> {
        self.0
            .checked_add(rhs.0)
            .and_then(Self::from_decimal)
            .ok_or_else(|| Error::AmountOverflow(format!("{self} + {rhs}")))
    }

    /// # Errors
    /// Returns [Error::AmountOverflow] if the difference is too large to store.
    pub fn checked_sub(self, rhs: Money) -> Result<Money, Error> {
        self.0
            .checked_sub(rhs.0)
            .and_then(Self::from_decimal)
            .ok_or_else(|| Error::AmountOverflow(format!("{self} - {rhs}")))
    }

    /// Add up `amounts`, failing on the first partial sum that is too large to store.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Result<Money, Error> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |total, amount| total.checked_add(amount))
    }

    /// Scale the amount by `numerator / denominator`, rounding toward zero.
    ///
    /// Returns `None` if `denominator` is zero or the result does not fit.
    pub fn mul_ratio(self, numerator: u64, denominator: u64) -> Option<Self> {
        if denominator == 0 {
            return None;
        }

        self.0
            .checked_mul(Decimal::from(numerator))?
            .checked_div(Decimal::from(denominator))
            .map(|scaled| scaled.round_dp_with_strategy(SCALE, RoundingStrategy::ToZero))
            .and_then(Self::from_decimal)
    }

    /// Return the amount if it is no larger than [Money::MAX_INPUT] either way.
    ///
    /// # Errors
    /// Returns [Error::InvalidAmount] if it is.
    pub fn within_input_limit(self) -> Result<Self, Error> {
        if self.0.abs() > Self::MAX_INPUT.0 {
            return Err(Error::InvalidAmount(format!(
                "{self} is larger than the limit of {}",
                Self::MAX_INPUT
            )));
        }

        Ok(self)
    }

    /// The amount equal to `value`, or `None` if it has more than two decimal places or
    /// does not fit in an `i64` of minor units.
    fn from_decimal(value: Decimal) -> Option<Self> {
        let mut scaled = value;
        scaled.rescale(SCALE);
        if scaled.scale() != SCALE || scaled != value {
            return None;
        }

        i64::try_from(scaled.mantissa()).ok().map(Self::from_minor)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = Error;

    /// Accepts amounts with at most two decimal places, up to [Money::MAX_INPUT].
    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value.normalize().scale() > SCALE {
            return Err(Error::InvalidAmount(format!(
                "{value} has more than {SCALE} decimal places"
            )));
        }

        Self::from_decimal(value)
            .ok_or_else(|| Error::InvalidAmount(value.to_string()))?
            .within_input_limit()
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl FromStr for Money {
    type Err = Error;

    /// Parse a decimal string with at most two decimal places, e.g. "110000", "-12.5", "0.05".
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidAmount(text.to_owned());

        let value = Decimal::from_str_exact(text.trim()).map_err(|_| invalid())?;

        Self::try_from(value).map_err(|_| invalid())
    }
}

impl ToSql for Money {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.minor_units()
            .map(ToSqlOutput::from)
            .ok_or_else(|| {
                rusqlite::Error::ToSqlConversionFailure(
                    Error::AmountOverflow(self.to_string()).into(),
                )
            })
    }
}

impl FromSql for Money {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Money::from_minor)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::str::serialize(&self.0, serializer)
    }
}
