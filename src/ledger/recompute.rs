//! The chain walk: recompute one period and carry its closing balance forward.

use std::sync::Mutex;

use rusqlite::Connection;
use serde::Serialize;

use crate::{
    Error,
    bucket::FundBucket,
    clock::Clock,
    db::lock_connection,
    ledger::{
        aggregate::{aggregate, earliest_activity},
        record::BalanceRecord,
        store::{get_balance_unchecked, get_seed, latest_balance_before, upsert_balance},
    },
    money::Money,
    period::Period,
};

/// How a walk treats a stored record whose closing balance does not add up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    /// Stop with [Error::IntegrityViolation].
    Incremental,
    /// Overwrite it with the recomputed amounts.
    Repair,
}

/// What a finished walk did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WalkReport {
    pub bucket: FundBucket,
    /// The first period recomputed. This can be earlier than the requested period.
    pub start: Period,
    pub end: Period,
    /// How many records were inserted or changed.
    pub written: usize,
    /// How many records already held the recomputed amounts.
    pub unchanged: usize,
}

/// Recompute `bucket` from `from` through the current period.
///
/// The connection is locked for one period at a time. Callers must hold the bucket's walk lock.
///
/// # Errors
/// Returns [Error::FuturePeriod] if `from` is after the current period, or
/// [Error::IntegrityViolation] when an existing record is corrupt and `mode` is
/// [WalkMode::Incremental].
pub fn walk_chain(
    connection: &Mutex<Connection>,
    clock: &dyn Clock,
    bucket: FundBucket,
    from: Period,
    mode: WalkMode,
) -> Result<WalkReport, Error> {
    let now = clock.now();
    let current = Period::containing_timestamp(now)?;
    if from > current {
        return Err(Error::FuturePeriod(from));
    }

    let (start, mut opening) = {
        let connection = lock_connection(connection)?;
        resolve_start(bucket, from, &connection)?
    };

    let mut report = WalkReport {
        bucket,
        start,
        end: current,
        written: 0,
        unchanged: 0,
    };

    for period in start.through(current) {
        let connection = lock_connection(connection)?;
        let totals = aggregate(bucket, period, &connection)?;
        let record = BalanceRecord::derive(bucket, period, opening, totals, now)?;

        if save_if_changed(&record, mode, &connection)? {
            tracing::debug!(
                "{bucket} {period}: opening {} income {} expense {} closing {}",
                record.opening,
                record.income,
                record.expense,
                record.closing
            );
            report.written += 1;
        } else {
            report.unchanged += 1;
        }

        opening = record.closing;
    }

    tracing::info!(
        "walked {bucket} from {start} to {current}: {} written, {} unchanged",
        report.written,
        report.unchanged
    );

    Ok(report)
}

/// Work out where a walk requested from `from` has to start and the opening balance there.
fn resolve_start(
    bucket: FundBucket,
    from: Period,
    connection: &Connection,
) -> Result<(Period, Money), Error> {
    let seed = get_seed(bucket, connection)?;
    if let Some(seed) = seed
        && from <= seed.period
    {
        return Ok((seed.period, seed.opening));
    }

    if let Some(previous) = latest_balance_before(bucket, from, connection)? {
        // Months with no record between the previous record and `from` are filled in.
        let start = previous.period.next().map_or(from, |next| next.min(from));
        return Ok((start, previous.closing));
    }

    if let Some(seed) = seed {
        return Ok((seed.period, seed.opening));
    }

    let start = match earliest_activity(bucket, connection)? {
        Some(earliest) if earliest < from => earliest,
        _ => from,
    };

    Ok((start, Money::ZERO))
}

/// Write `record` unless the stored record already holds the same amounts.
///
/// Returns whether anything was written.
fn save_if_changed(
    record: &BalanceRecord,
    mode: WalkMode,
    connection: &Connection,
) -> Result<bool, Error> {
    if let Some(existing) = get_balance_unchecked(record.bucket, record.period, connection)? {
        if !existing.is_consistent() {
            match mode {
                WalkMode::Incremental => {
                    tracing::error!(
                        "refusing to recompute over the corrupt record {} {}",
                        existing.bucket,
                        existing.period
                    );
                    return Err(existing.violation());
                }
                WalkMode::Repair => tracing::warn!(
                    "repairing {} {}: closing was {}, recomputed {}",
                    existing.bucket,
                    existing.period,
                    existing.closing,
                    record.closing
                ),
            }
        } else if existing.same_amounts(record) {
            return Ok(false);
        }
    }

    upsert_balance(record, connection)?;

    Ok(true)
}
