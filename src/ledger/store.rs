//! Persistence for balance records and opening seeds.
//!
//! Every read that hands a record to a caller checks that its closing balance adds up.

use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::{
    Error, bucket::FundBucket, ledger::record::BalanceRecord, money::Money, period::Period,
};

pub fn create_balance_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS balance_record (
            bucket TEXT NOT NULL,
            period TEXT NOT NULL,
            opening INTEGER NOT NULL,
            income INTEGER NOT NULL,
            expense INTEGER NOT NULL,
            closing INTEGER NOT NULL,
            recomputed_at TEXT NOT NULL,
            PRIMARY KEY (bucket, period)
        )",
        (),
    )?;

    connection.execute(
        "CREATE TABLE IF NOT EXISTS opening_seed (
            bucket TEXT PRIMARY KEY,
            period TEXT NOT NULL,
            opening INTEGER NOT NULL
        )",
        (),
    )?;

    Ok(())
}

const BALANCE_COLUMNS: &str = "bucket, period, opening, income, expense, closing, recomputed_at";

fn map_balance_row(row: &Row) -> Result<BalanceRecord, rusqlite::Error> {
    Ok(BalanceRecord {
        bucket: row.get(0)?,
        period: row.get(1)?,
        opening: row.get(2)?,
        income: row.get(3)?,
        expense: row.get(4)?,
        closing: row.get(5)?,
        recomputed_at: row.get(6)?,
    })
}

/// Get the record for `bucket` and `period` without checking it.
pub fn get_balance_unchecked(
    bucket: FundBucket,
    period: Period,
    connection: &Connection,
) -> Result<Option<BalanceRecord>, Error> {
    connection
        .prepare(&format!(
            "SELECT {BALANCE_COLUMNS} FROM balance_record WHERE bucket = ?1 AND period = ?2"
        ))?
        .query_row((bucket, period), map_balance_row)
        .optional()
        .map_err(Error::from)
}

/// # Errors
/// Returns [Error::IntegrityViolation] if the stored record does not add up.
pub fn get_balance(
    bucket: FundBucket,
    period: Period,
    connection: &Connection,
) -> Result<Option<BalanceRecord>, Error> {
    get_balance_unchecked(bucket, period, connection)?
        .map(BalanceRecord::verified)
        .transpose()
}

/// The most recent record for `bucket` strictly before `period`.
pub fn latest_balance_before(
    bucket: FundBucket,
    period: Period,
    connection: &Connection,
) -> Result<Option<BalanceRecord>, Error> {
    connection
        .prepare(&format!(
            "SELECT {BALANCE_COLUMNS} FROM balance_record
             WHERE bucket = ?1 AND period < ?2
             ORDER BY period DESC LIMIT 1"
        ))?
        .query_row((bucket, period), map_balance_row)
        .optional()?
        .map(BalanceRecord::verified)
        .transpose()
}

/// The most recent record for `bucket`.
pub fn latest_balance(
    bucket: FundBucket,
    connection: &Connection,
) -> Result<Option<BalanceRecord>, Error> {
    connection
        .prepare(&format!(
            "SELECT {BALANCE_COLUMNS} FROM balance_record
             WHERE bucket = ?1
             ORDER BY period DESC LIMIT 1"
        ))?
        .query_row([bucket], map_balance_row)
        .optional()?
        .map(BalanceRecord::verified)
        .transpose()
}

/// The records for `bucket` in chronological order, optionally limited to an inclusive range.
pub fn list_balances(
    bucket: FundBucket,
    start: Option<Period>,
    end: Option<Period>,
    connection: &Connection,
) -> Result<Vec<BalanceRecord>, Error> {
    connection
        .prepare(&format!(
            "SELECT {BALANCE_COLUMNS} FROM balance_record
             WHERE bucket = ?1
               AND (?2 IS NULL OR period >= ?2)
               AND (?3 IS NULL OR period <= ?3)
             ORDER BY period"
        ))?
        .query_map((bucket, start, end), map_balance_row)?
        .map(|maybe_record| maybe_record.map_err(Error::from)?.verified())
        .collect()
}

/// Every record in bucket then period order, without checking them.
pub fn all_balances_unchecked(connection: &Connection) -> Result<Vec<BalanceRecord>, Error> {
    connection
        .prepare(&format!(
            "SELECT {BALANCE_COLUMNS} FROM balance_record ORDER BY bucket, period"
        ))?
        .query_map([], map_balance_row)?
        .map(|maybe_record| maybe_record.map_err(Error::from))
        .collect()
}

pub fn earliest_balance_period(
    bucket: FundBucket,
    connection: &Connection,
) -> Result<Option<Period>, Error> {
    connection
        .prepare("SELECT MIN(period) FROM balance_record WHERE bucket = ?1")?
        .query_row([bucket], |row| row.get(0))
        .map_err(Error::from)
}

/// Whether any bucket has a record earlier than `period`.
pub fn has_balances_before(period: Period, connection: &Connection) -> Result<bool, Error> {
    connection
        .prepare("SELECT EXISTS (SELECT 1 FROM balance_record WHERE period < ?1)")?
        .query_row([period], |row| row.get(0))
        .map_err(Error::from)
}

/// Insert the record or replace the stored amounts for its bucket and period.
pub fn upsert_balance(record: &BalanceRecord, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO balance_record
            (bucket, period, opening, income, expense, closing, recomputed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (bucket, period) DO UPDATE SET
            opening = excluded.opening,
            income = excluded.income,
            expense = excluded.expense,
            closing = excluded.closing,
            recomputed_at = excluded.recomputed_at",
        (
            record.bucket,
            record.period,
            record.opening,
            record.income,
            record.expense,
            record.closing,
            record.recomputed_at,
        ),
    )?;

    Ok(())
}

/// An explicit starting balance for a bucket.
///
/// Walks for the bucket never start before `period`, and the record for `period` opens with
/// `opening` instead of a previous closing balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpeningSeed {
    pub bucket: FundBucket,
    pub period: Period,
    pub opening: Money,
}

fn map_seed_row(row: &Row) -> Result<OpeningSeed, rusqlite::Error> {
    Ok(OpeningSeed {
        bucket: row.get(0)?,
        period: row.get(1)?,
        opening: row.get(2)?,
    })
}

/// The stored seeds, one per concrete bucket.
pub fn list_seeds(connection: &Connection) -> Result<Vec<OpeningSeed>, Error> {
    connection
        .prepare("SELECT bucket, period, opening FROM opening_seed ORDER BY bucket")?
        .query_map([], map_seed_row)?
        .map(|maybe_seed| maybe_seed.map_err(Error::from))
        .collect()
}

/// The seed for `bucket`. A derived bucket's seed is the sum of the concrete seeds.
pub fn get_seed(bucket: FundBucket, connection: &Connection) -> Result<Option<OpeningSeed>, Error> {
    let seeds = list_seeds(connection)?;

    if !bucket.is_derived() {
        return Ok(seeds.into_iter().find(|seed| seed.bucket == bucket));
    }

    let Some(first) = seeds.first() else {
        return Ok(None);
    };

    Ok(Some(OpeningSeed {
        bucket,
        period: first.period,
        opening: Money::checked_sum(seeds.iter().map(|seed| seed.opening))?,
    }))
}

/// Replace every stored seed with `balances` starting at `period`.
pub fn replace_seeds(
    period: Period,
    balances: &[(FundBucket, Money)],
    connection: &Connection,
) -> Result<Vec<OpeningSeed>, Error> {
    let tx = connection.unchecked_transaction()?;

    tx.execute("DELETE FROM opening_seed", ())?;

    let seeds = {
        let mut statement = tx.prepare(
            "INSERT INTO opening_seed (bucket, period, opening) VALUES (?1, ?2, ?3)
             RETURNING bucket, period, opening",
        )?;

        balances
            .iter()
            .map(|(bucket, opening)| {
                statement
                    .query_row((bucket, period, opening), map_seed_row)
                    .map_err(Error::from)
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    tx.commit()?;

    Ok(seeds)
}
