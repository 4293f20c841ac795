//! Income and expense totals for one bucket and period, read from the source tables.

use rusqlite::Connection;

use crate::{
    Error,
    bucket::FundBucket,
    ledger::record::PeriodTotals,
    money::Money,
    period::Period,
    sources::{
        earliest_donation_period, earliest_paid_period, earliest_usage_period, sum_bucket_usage,
        sum_donations, sum_paid_tuition, sum_total_usage,
    },
};

/// Sum the income and expenses of `bucket` in `period`.
///
/// Nothing is written, so calling this twice without source changes in between gives the same
/// totals.
pub fn aggregate(
    bucket: FundBucket,
    period: Period,
    connection: &Connection,
) -> Result<PeriodTotals, Error> {
    Ok(PeriodTotals {
        income: income(bucket, period, connection)?,
        expense: expense(bucket, period, connection)?,
    })
}

fn income(bucket: FundBucket, period: Period, connection: &Connection) -> Result<Money, Error> {
    match bucket {
        FundBucket::Tuition => sum_paid_tuition(period, connection),
        FundBucket::Donation => sum_donations(period, connection),
        FundBucket::Combined => {
            let incomes = FundBucket::concrete()
                .map(|concrete| income(concrete, period, connection))
                .collect::<Result<Vec<_>, _>>()?;

            Money::checked_sum(incomes)
        }
    }
}

fn expense(bucket: FundBucket, period: Period, connection: &Connection) -> Result<Money, Error> {
    if bucket.is_derived() {
        sum_total_usage(period, connection)
    } else {
        sum_bucket_usage(bucket, period, connection)
    }
}

/// The earliest period in which any source transaction touches `bucket`.
pub fn earliest_activity(
    bucket: FundBucket,
    connection: &Connection,
) -> Result<Option<Period>, Error> {
    let candidates = match bucket {
        FundBucket::Tuition => vec![
            earliest_paid_period(connection)?,
            earliest_usage_period(bucket, connection)?,
        ],
        FundBucket::Donation => vec![
            earliest_donation_period(connection)?,
            earliest_usage_period(bucket, connection)?,
        ],
        FundBucket::Combined => FundBucket::concrete()
            .map(|concrete| earliest_activity(concrete, connection))
            .collect::<Result<Vec<_>, _>>()?,
    };

    Ok(candidates.into_iter().flatten().min())
}
