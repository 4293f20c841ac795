//! Totals over a range of balance records.

use serde::Serialize;

use crate::{Error, bucket::FundBucket, ledger::record::BalanceRecord, money::Money, period::Period};

/// The income and expenses of a bucket over a range of periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSummary {
    pub bucket: FundBucket,
    /// The requested start of the range, if any.
    pub start: Option<Period>,
    /// The requested end of the range, if any.
    pub end: Option<Period>,
    /// The number of records in the range.
    pub periods: usize,
    pub total_income: Money,
    pub total_expense: Money,
    /// The opening balance of the first record in the range.
    pub opening: Option<Money>,
    /// The closing balance of the last record in the range.
    pub closing: Option<Money>,
}

/// Summarize `records`, which must be in chronological order.
///
/// # Errors
/// Returns [Error::AmountOverflow] if a total is too large to represent.
pub fn summarize(
    bucket: FundBucket,
    start: Option<Period>,
    end: Option<Period>,
    records: &[BalanceRecord],
) -> Result<BalanceSummary, Error> {
    Ok(BalanceSummary {
        bucket,
        start,
        end,
        periods: records.len(),
        total_income: Money::checked_sum(records.iter().map(|record| record.income))?,
        total_expense: Money::checked_sum(records.iter().map(|record| record.expense))?,
        opening: records.first().map(|record| record.opening),
        closing: records.last().map(|record| record.closing),
    })
}
