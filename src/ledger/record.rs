//! The per-period balance record and the arithmetic that ties it together.

use serde::Serialize;
use time::OffsetDateTime;

use crate::{Error, bucket::FundBucket, money::Money, period::Period};

/// The money that came in and went out of a bucket during one period.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PeriodTotals {
    pub income: Money,
    pub expense: Money,
}

/// The balance of one bucket for one period.
///
/// `closing` is always `opening + income - expense`, and `opening` is the previous period's
/// `closing` whenever both records exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceRecord {
    pub bucket: FundBucket,
    pub period: Period,
    pub opening: Money,
    pub income: Money,
    pub expense: Money,
    pub closing: Money,
    /// When the amounts were last written.
    #[serde(with = "time::serde::rfc3339")]
    pub recomputed_at: OffsetDateTime,
}

impl BalanceRecord {
    /// Build a record from its opening balance and the period's totals.
    ///
    /// # Errors
    /// Returns [Error::AmountOverflow] if the closing balance is too large to store.
    pub fn derive(
        bucket: FundBucket,
        period: Period,
        opening: Money,
        totals: PeriodTotals,
        recomputed_at: OffsetDateTime,
    ) -> Result<Self, Error> {
        let closing = closing_balance(opening, totals.income, totals.expense)?;

        Ok(Self {
            bucket,
            period,
            opening,
            income: totals.income,
            expense: totals.expense,
            closing,
            recomputed_at,
        })
    }

    /// The closing balance implied by the other amounts.
    pub fn expected_closing(&self) -> Result<Money, Error> {
        closing_balance(self.opening, self.income, self.expense)
    }

    pub fn is_consistent(&self) -> bool {
        self.expected_closing()
            .is_ok_and(|expected| expected == self.closing)
    }

    /// Whether `other` holds the same amounts, ignoring when it was written.
    pub fn same_amounts(&self, other: &BalanceRecord) -> bool {
        self.opening == other.opening
            && self.income == other.income
            && self.expense == other.expense
            && self.closing == other.closing
    }

    /// The error describing why this record is inconsistent.
    pub fn violation(&self) -> Error {
        match self.expected_closing() {
            Ok(expected) => Error::IntegrityViolation {
                bucket: self.bucket,
                period: self.period,
                closing: self.closing,
                expected,
            },
            Err(error) => error,
        }
    }

    /// Return the record if its closing balance adds up.
    ///
    /// # Errors
    /// Returns [Error::IntegrityViolation] if it does not.
    pub fn verified(self) -> Result<Self, Error> {
        if self.is_consistent() {
            Ok(self)
        } else {
            let violation = self.violation();
            tracing::error!(
                "balance record {} {} is corrupt: {violation}",
                self.bucket,
                self.period
            );
            Err(violation)
        }
    }
}

fn closing_balance(opening: Money, income: Money, expense: Money) -> Result<Money, Error> {
    opening.checked_add(income)?.checked_sub(expense)
}
