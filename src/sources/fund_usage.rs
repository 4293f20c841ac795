//! Fund usage: money spent from one or more buckets.
//!
//! Every usage is stored with its total and one share row per concrete bucket it draws from,
//! so expenses for any bucket are a single sum over the share table.

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    str::FromStr,
};

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error, bucket::FundBucket, config::SplitPolicy, database_id::DatabaseId, money::Money,
    period::Period,
};

pub type FundUsageId = DatabaseId;

/// What the money was spent on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageCategory {
    Operational,
    Investment,
    Other,
}

impl UsageCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            UsageCategory::Operational => "operational",
            UsageCategory::Investment => "investment",
            UsageCategory::Other => "other",
        }
    }
}

impl ToSql for UsageCategory {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for UsageCategory {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "operational" => Ok(UsageCategory::Operational),
            "investment" => Ok(UsageCategory::Investment),
            "other" => Ok(UsageCategory::Other),
            other => Err(FromSqlError::Other(
                format!("invalid usage category \"{other}\"").into(),
            )),
        }
    }
}

/// How a fund usage says it should be paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Allocation {
    /// Paid from one bucket. A derived bucket is divided with the configured [SplitPolicy].
    Single { bucket: FundBucket, amount: Money },
    /// Paid from explicit per-bucket shares.
    Split { shares: BTreeMap<FundBucket, Money> },
}

impl Allocation {
    /// The declared source as stored with the usage.
    pub fn source(&self) -> UsageSource {
        match self {
            Allocation::Single { bucket, .. } => UsageSource::Bucket(*bucket),
            Allocation::Split { .. } => UsageSource::Split,
        }
    }

    /// Work out the total and the share each concrete bucket pays.
    ///
    /// Zero shares are dropped.
    ///
    /// # Errors
    /// Returns [Error::InvalidAllocation] if the total is not positive, a share is negative,
    /// or an explicit split names a derived bucket. Returns [Error::InvalidAmount] for an
    /// amount over [Money::MAX_INPUT].
    pub fn resolve(&self, policy: &SplitPolicy) -> Result<ResolvedAllocation, Error> {
        let shares: Vec<(FundBucket, Money)> = match self {
            Allocation::Single { bucket, amount } if bucket.is_derived() => {
                policy.split(amount.within_input_limit()?)?
            }
            Allocation::Single { bucket, amount } => vec![(*bucket, *amount)],
            Allocation::Split { shares } => {
                if let Some(bucket) = shares.keys().find(|bucket| bucket.is_derived()) {
                    return Err(Error::InvalidAllocation(format!(
                        "{bucket} is derived, split the amount across concrete buckets instead"
                    )));
                }

                shares.iter().map(|(bucket, amount)| (*bucket, *amount)).collect()
            }
        };

        if let Some((bucket, amount)) = shares.iter().find(|(_, amount)| amount.is_negative()) {
            return Err(Error::InvalidAllocation(format!(
                "the {bucket} share {amount} is negative"
            )));
        }

        for (_, amount) in &shares {
            amount.within_input_limit()?;
        }

        let total = Money::checked_sum(shares.iter().map(|(_, amount)| *amount))?;
        if !total.is_positive() {
            return Err(Error::InvalidAllocation(format!(
                "the total {total} must be greater than zero"
            )));
        }

        Ok(ResolvedAllocation {
            total,
            shares: shares
                .into_iter()
                .filter(|(_, amount)| !amount.is_zero())
                .collect(),
        })
    }
}

/// An [Allocation] broken down into concrete bucket shares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAllocation {
    pub total: Money,
    /// One entry per concrete bucket with a non-zero share, in bucket order.
    pub shares: Vec<(FundBucket, Money)>,
}

impl ResolvedAllocation {
    /// The share paid by `bucket`. For a derived bucket this is the total.
    pub fn share_of(&self, bucket: FundBucket) -> Money {
        if bucket.is_derived() {
            return self.total;
        }

        self.shares
            .iter()
            .find(|(share_bucket, _)| *share_bucket == bucket)
            .map_or(Money::ZERO, |(_, amount)| *amount)
    }

    /// Every bucket whose balance this allocation changes, in lock order.
    pub fn affected_buckets(&self) -> Vec<FundBucket> {
        let mut buckets: Vec<FundBucket> = self
            .shares
            .iter()
            .flat_map(|(bucket, _)| bucket.affected_buckets())
            .collect();
        buckets.sort();
        buckets.dedup();
        buckets
    }
}

/// The source a usage was declared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UsageSource {
    Bucket(FundBucket),
    Split,
}

const SPLIT_SOURCE: &str = "split";

impl Display for UsageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageSource::Bucket(bucket) => bucket.fmt(f),
            UsageSource::Split => f.write_str(SPLIT_SOURCE),
        }
    }
}

impl FromStr for UsageSource {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text == SPLIT_SOURCE {
            Ok(UsageSource::Split)
        } else {
            text.parse().map(UsageSource::Bucket)
        }
    }
}

impl TryFrom<String> for UsageSource {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UsageSource> for String {
    fn from(source: UsageSource) -> Self {
        source.to_string()
    }
}

impl ToSql for UsageSource {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for UsageSource {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// Money spent by the institution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundUsage {
    pub id: FundUsageId,
    pub title: String,
    pub description: String,
    pub category: UsageCategory,
    pub used_on: Date,
    /// The calendar month containing `used_on`.
    pub period: Period,
    pub source: UsageSource,
    pub amount: Money,
    /// The amount drawn from each concrete bucket. The shares add up to `amount`.
    pub shares: BTreeMap<FundBucket, Money>,
}

impl FundUsage {
    /// The allocation this usage was stored with, as shares.
    pub fn resolved(&self) -> ResolvedAllocation {
        ResolvedAllocation {
            total: self.amount,
            shares: self.shares.iter().map(|(b, a)| (*b, *a)).collect(),
        }
    }
}

/// The data needed to create or replace a [FundUsage].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewFundUsage {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: UsageCategory,
    pub used_on: Date,
    pub allocation: Allocation,
}

impl NewFundUsage {
    /// # Errors
    /// Returns [Error::InvalidPeriod] if `used_on` is outside the four-digit years.
    pub fn period(&self) -> Result<Period, Error> {
        Period::containing(self.used_on)
    }
}

pub fn create_fund_usage_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS fund_usage (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            category TEXT NOT NULL,
            used_on TEXT NOT NULL,
            period TEXT NOT NULL,
            source TEXT NOT NULL,
            amount INTEGER NOT NULL CHECK (amount > 0)
        )",
        (),
    )?;

    connection.execute(
        "CREATE TABLE IF NOT EXISTS fund_usage_share (
            usage_id INTEGER NOT NULL,
            bucket TEXT NOT NULL,
            amount INTEGER NOT NULL CHECK (amount >= 0),
            PRIMARY KEY (usage_id, bucket),
            FOREIGN KEY(usage_id) REFERENCES fund_usage(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_fund_usage_period ON fund_usage(period)",
        (),
    )?;

    Ok(())
}

type UsageRow = (FundUsageId, String, String, UsageCategory, Date, Period, UsageSource, Money);

fn map_usage_row(row: &Row) -> Result<UsageRow, rusqlite::Error> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn load_shares(
    usage_id: FundUsageId,
    connection: &Connection,
) -> Result<BTreeMap<FundBucket, Money>, Error> {
    connection
        .prepare("SELECT bucket, amount FROM fund_usage_share WHERE usage_id = ?1")?
        .query_map([usage_id], |row| {
            Ok((row.get::<_, FundBucket>(0)?, row.get::<_, Money>(1)?))
        })?
        .map(|maybe_share| maybe_share.map_err(Error::from))
        .collect()
}

fn with_shares(row: UsageRow, connection: &Connection) -> Result<FundUsage, Error> {
    let (id, title, description, category, used_on, period, source, amount) = row;

    Ok(FundUsage {
        id,
        title,
        description,
        category,
        used_on,
        period,
        source,
        amount,
        shares: load_shares(id, connection)?,
    })
}

fn insert_shares(
    usage_id: FundUsageId,
    resolved: &ResolvedAllocation,
    connection: &Connection,
) -> Result<(), Error> {
    let mut statement = connection
        .prepare("INSERT INTO fund_usage_share (usage_id, bucket, amount) VALUES (?1, ?2, ?3)")?;

    for (bucket, amount) in &resolved.shares {
        statement.execute((usage_id, bucket, amount))?;
    }

    Ok(())
}

/// Insert a fund usage with its already resolved shares.
///
/// This only writes the source rows: callers go through the balance guard so the bucket
/// balances are checked and recomputed.
///
/// # Errors
/// Returns [Error::InvalidAllocation] if the title is empty, [Error::InvalidPeriod] if `used_on`
/// is outside the four-digit years, or [Error::SqlError] if a write fails.
pub fn insert_fund_usage(
    new_usage: &NewFundUsage,
    resolved: &ResolvedAllocation,
    connection: &Connection,
) -> Result<FundUsage, Error> {
    validate_title(&new_usage.title)?;
    let period = new_usage.period()?;

    let tx = connection.unchecked_transaction()?;

    let row = tx
        .prepare(
            "INSERT INTO fund_usage (title, description, category, used_on, period, source, amount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING id, title, description, category, used_on, period, source, amount",
        )?
        .query_row(
            (
                new_usage.title.trim(),
                &new_usage.description,
                new_usage.category,
                new_usage.used_on,
                period,
                new_usage.allocation.source(),
                resolved.total,
            ),
            map_usage_row,
        )?;

    insert_shares(row.0, resolved, &tx)?;
    let usage = with_shares(row, &tx)?;

    tx.commit()?;

    Ok(usage)
}

/// Replace the details and shares of an existing fund usage.
///
/// # Errors
/// Returns [Error::UpdateMissingFundUsage] if there is no usage with `id`.
pub fn update_fund_usage(
    id: FundUsageId,
    new_usage: &NewFundUsage,
    resolved: &ResolvedAllocation,
    connection: &Connection,
) -> Result<FundUsage, Error> {
    validate_title(&new_usage.title)?;
    let period = new_usage.period()?;

    let tx = connection.unchecked_transaction()?;

    let row = tx
        .prepare(
            "UPDATE fund_usage
             SET title = ?1, description = ?2, category = ?3, used_on = ?4, period = ?5,
                 source = ?6, amount = ?7
             WHERE id = ?8
             RETURNING id, title, description, category, used_on, period, source, amount",
        )?
        .query_row(
            (
                new_usage.title.trim(),
                &new_usage.description,
                new_usage.category,
                new_usage.used_on,
                period,
                new_usage.allocation.source(),
                resolved.total,
                id,
            ),
            map_usage_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UpdateMissingFundUsage,
            error => error.into(),
        })?;

    tx.execute("DELETE FROM fund_usage_share WHERE usage_id = ?1", [id])?;
    insert_shares(id, resolved, &tx)?;
    let usage = with_shares(row, &tx)?;

    tx.commit()?;

    Ok(usage)
}

/// Delete a fund usage and its shares.
///
/// # Errors
/// Returns [Error::DeleteMissingFundUsage] if there is no usage with `id`.
pub fn delete_fund_usage(id: FundUsageId, connection: &Connection) -> Result<(), Error> {
    let tx = connection.unchecked_transaction()?;

    tx.execute("DELETE FROM fund_usage_share WHERE usage_id = ?1", [id])?;
    let rows_affected = tx.execute("DELETE FROM fund_usage WHERE id = ?1", [id])?;
    if rows_affected == 0 {
        return Err(Error::DeleteMissingFundUsage);
    }

    tx.commit()?;

    Ok(())
}

/// # Errors
/// Returns [Error::NotFound] if there is no usage with `id`.
pub fn get_fund_usage(id: FundUsageId, connection: &Connection) -> Result<FundUsage, Error> {
    let row = connection
        .prepare(
            "SELECT id, title, description, category, used_on, period, source, amount
             FROM fund_usage WHERE id = ?1",
        )?
        .query_row([id], map_usage_row)?;

    with_shares(row, connection)
}

/// List fund usage ordered by date, optionally only for one period.
pub fn list_fund_usage(
    period: Option<Period>,
    connection: &Connection,
) -> Result<Vec<FundUsage>, Error> {
    let rows: Vec<UsageRow> = connection
        .prepare(
            "SELECT id, title, description, category, used_on, period, source, amount
             FROM fund_usage
             WHERE ?1 IS NULL OR period = ?1
             ORDER BY used_on, id",
        )?
        .query_map([period], map_usage_row)?
        .collect::<Result<_, _>>()?;

    rows.into_iter()
        .map(|row| with_shares(row, connection))
        .collect()
}

/// Which fund usage a [FundUsageSummary] covers. Every field that is set must match.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageFilter {
    /// The first day to include.
    pub start: Option<Date>,
    /// The last day to include.
    pub end: Option<Date>,
    pub category: Option<UsageCategory>,
}

/// How much was spent by the fund usage matching a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundUsageSummary {
    #[serde(flatten)]
    pub filter: UsageFilter,
    /// The number of matching usages.
    pub count: u64,
    pub total: Money,
    /// `total / count`, rounded toward zero. Zero when nothing matches.
    pub average: Money,
    /// The largest single usage. Zero when nothing matches.
    pub largest: Money,
}

/// Count and total the fund usage matching `filter` by the day it was used on.
///
/// # Errors
/// Returns [Error::SqlError] if the totals do not fit in the database's integers.
pub fn summarize_fund_usage(
    filter: &UsageFilter,
    connection: &Connection,
) -> Result<FundUsageSummary, Error> {
    let (count, total, largest): (u64, Money, Money) = connection
        .prepare(
            "SELECT COUNT(*), COALESCE(SUM(amount), 0), COALESCE(MAX(amount), 0)
             FROM fund_usage
             WHERE (?1 IS NULL OR used_on >= ?1)
               AND (?2 IS NULL OR used_on <= ?2)
               AND (?3 IS NULL OR category = ?3)",
        )?
        .query_row((filter.start, filter.end, filter.category), |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?;

    let average = if count == 0 {
        Money::ZERO
    } else {
        total
            .mul_ratio(1, count)
            .ok_or_else(|| Error::AmountOverflow(format!("{total} / {count}")))?
    };

    Ok(FundUsageSummary {
        filter: *filter,
        count,
        total,
        average,
        largest,
    })
}

/// The total drawn from the concrete `bucket` by usage in `period`.
pub fn sum_bucket_usage(
    bucket: FundBucket,
    period: Period,
    connection: &Connection,
) -> Result<Money, Error> {
    connection
        .prepare(
            "SELECT COALESCE(SUM(s.amount), 0)
             FROM fund_usage_share s INNER JOIN fund_usage u ON u.id = s.usage_id
             WHERE u.period = ?1 AND s.bucket = ?2",
        )?
        .query_row((period, bucket), |row| row.get(0))
        .map_err(Error::from)
}

/// The total amount of all usage in `period`.
pub fn sum_total_usage(period: Period, connection: &Connection) -> Result<Money, Error> {
    connection
        .prepare("SELECT COALESCE(SUM(amount), 0) FROM fund_usage WHERE period = ?1")?
        .query_row([period], |row| row.get(0))
        .map_err(Error::from)
}

/// The earliest period in which `bucket` paid for any usage.
pub fn earliest_usage_period(
    bucket: FundBucket,
    connection: &Connection,
) -> Result<Option<Period>, Error> {
    connection
        .prepare(
            "SELECT MIN(u.period)
             FROM fund_usage_share s INNER JOIN fund_usage u ON u.id = s.usage_id
             WHERE s.bucket = ?1",
        )?
        .query_row([bucket], |row| row.get(0))
        .map_err(Error::from)
}

fn validate_title(title: &str) -> Result<(), Error> {
    if title.trim().is_empty() {
        return Err(Error::InvalidAllocation(
            "a fund usage needs a title".to_owned(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rusqlite::Connection;
    use time::macros::date;

    use crate::{Error, bucket::FundBucket, config::SplitPolicy, money::Money, period::Period};

    use super::{
        Allocation, NewFundUsage, UsageCategory, UsageFilter, UsageSource,
        create_fund_usage_tables, delete_fund_usage, earliest_usage_period, get_fund_usage,
        insert_fund_usage, list_fund_usage, sum_bucket_usage, sum_total_usage,
        summarize_fund_usage, update_fund_usage,
    };

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        create_fund_usage_tables(&connection).unwrap();
        connection
    }

    fn new_usage(allocation: Allocation) -> NewFundUsage {
        NewFundUsage {
            title: "Whiteboard markers".to_owned(),
            description: String::new(),
            category: UsageCategory::Operational,
            used_on: date!(2024 - 05 - 10),
            allocation,
        }
    }

    fn single(bucket: FundBucket, major: i64) -> Allocation {
        Allocation::Single {
            bucket,
            amount: Money::from_major(major),
        }
    }

    #[test]
    fn combined_allocation_uses_the_split_policy() {
        let resolved = single(FundBucket::Combined, 100)
            .resolve(&SplitPolicy::default())
            .unwrap();

        assert_eq!(resolved.total, Money::from_major(100));
        assert_eq!(resolved.share_of(FundBucket::Tuition), Money::from_major(50));
        assert_eq!(resolved.share_of(FundBucket::Donation), Money::from_major(50));
        assert_eq!(resolved.affected_buckets(), FundBucket::ALL);
    }

    #[test]
    fn split_allocation_drops_zero_shares() {
        let allocation = Allocation::Split {
            shares: BTreeMap::from([
                (FundBucket::Tuition, Money::ZERO),
                (FundBucket::Donation, Money::from_major(3)),
            ]),
        };

        let resolved = allocation.resolve(&SplitPolicy::default()).unwrap();

        assert_eq!(resolved.shares, [(FundBucket::Donation, Money::from_major(3))]);
        assert_eq!(
            resolved.affected_buckets(),
            [FundBucket::Donation, FundBucket::Combined]
        );
    }

    #[test]
    fn invalid_allocations_are_rejected() {
        let policy = SplitPolicy::default();

        assert!(matches!(
            single(FundBucket::Tuition, 0).resolve(&policy),
            Err(Error::InvalidAllocation(_))
        ));
        assert!(matches!(
            single(FundBucket::Tuition, -5).resolve(&policy),
            Err(Error::InvalidAllocation(_))
        ));
        assert!(matches!(
            Allocation::Split {
                shares: BTreeMap::from([(FundBucket::Combined, Money::from_major(1))])
            }
            .resolve(&policy),
            Err(Error::InvalidAllocation(_))
        ));
    }

    #[test]
    fn insert_stores_shares_and_sums_by_bucket() {
        let connection = get_test_connection();
        let policy = SplitPolicy::default();
        let may = Period::new(2024, 5).unwrap();
        for allocation in [single(FundBucket::Tuition, 30), single(FundBucket::Combined, 20)] {
            let usage = new_usage(allocation);
            let resolved = usage.allocation.resolve(&policy).unwrap();
            insert_fund_usage(&usage, &resolved, &connection).unwrap();
        }

        assert_eq!(
            sum_bucket_usage(FundBucket::Tuition, may, &connection),
            Ok(Money::from_major(40))
        );
        assert_eq!(
            sum_bucket_usage(FundBucket::Donation, may, &connection),
            Ok(Money::from_major(10))
        );
        assert_eq!(sum_total_usage(may, &connection), Ok(Money::from_major(50)));
        assert_eq!(
            earliest_usage_period(FundBucket::Donation, &connection),
            Ok(Some(may))
        );
    }

    #[test]
    fn update_replaces_shares() {
        let connection = get_test_connection();
        let policy = SplitPolicy::default();
        let usage = new_usage(single(FundBucket::Tuition, 30));
        let created =
            insert_fund_usage(&usage, &usage.allocation.resolve(&policy).unwrap(), &connection)
                .unwrap();

        let replacement = NewFundUsage {
            used_on: date!(2024 - 06 - 01),
            ..new_usage(single(FundBucket::Donation, 12))
        };
        let updated = update_fund_usage(
            created.id,
            &replacement,
            &replacement.allocation.resolve(&policy).unwrap(),
            &connection,
        )
        .unwrap();

        assert_eq!(updated.period, Period::new(2024, 6).unwrap());
        assert_eq!(updated.source, UsageSource::Bucket(FundBucket::Donation));
        assert_eq!(
            updated.shares,
            BTreeMap::from([(FundBucket::Donation, Money::from_major(12))])
        );
        assert_eq!(get_fund_usage(created.id, &connection), Ok(updated));
    }

    #[test]
    fn delete_removes_usage_and_shares() {
        let connection = get_test_connection();
        let usage = new_usage(single(FundBucket::Tuition, 30));
        let created = insert_fund_usage(
            &usage,
            &usage.allocation.resolve(&SplitPolicy::default()).unwrap(),
            &connection,
        )
        .unwrap();

        delete_fund_usage(created.id, &connection).unwrap();

        assert_eq!(list_fund_usage(None, &connection), Ok(vec![]));
        assert_eq!(
            sum_bucket_usage(FundBucket::Tuition, created.period, &connection),
            Ok(Money::ZERO)
        );
        assert_eq!(
            delete_fund_usage(created.id, &connection),
            Err(Error::DeleteMissingFundUsage)
        );
    }

    #[test]
    fn list_filters_by_period() {
        let connection = get_test_connection();
        let policy = SplitPolicy::default();
        for used_on in [date!(2024 - 05 - 02), date!(2024 - 06 - 02)] {
            let usage = NewFundUsage {
                used_on,
                ..new_usage(single(FundBucket::Tuition, 1))
            };
            insert_fund_usage(&usage, &usage.allocation.resolve(&policy).unwrap(), &connection)
                .unwrap();
        }

        let june = list_fund_usage(Some(Period::new(2024, 6).unwrap()), &connection).unwrap();

        assert_eq!(june.len(), 1);
        assert_eq!(june[0].used_on, date!(2024 - 06 - 02));
        assert_eq!(list_fund_usage(None, &connection).unwrap().len(), 2);
    }

    #[test]
    fn rejects_blank_titles() {
        let connection = get_test_connection();
        let usage = NewFundUsage {
            title: " ".to_owned(),
            ..new_usage(single(FundBucket::Tuition, 1))
        };

        let result = insert_fund_usage(
            &usage,
            &usage.allocation.resolve(&SplitPolicy::default()).unwrap(),
            &connection,
        );

        assert!(matches!(result, Err(Error::InvalidAllocation(_))));
    }

    #[test]
    fn summary_filters_by_day_and_category() {
        let connection = get_test_connection();
        let policy = SplitPolicy::default();
        for (used_on, category, allocation) in [
            (date!(2024 - 04 - 30), UsageCategory::Operational, single(FundBucket::Tuition, 500)),
            (date!(2024 - 05 - 01), UsageCategory::Operational, single(FundBucket::Tuition, 10)),
            (date!(2024 - 05 - 15), UsageCategory::Investment, single(FundBucket::Combined, 90)),
            (date!(2024 - 05 - 31), UsageCategory::Operational, single(FundBucket::Donation, 5)),
        ] {
            let usage = NewFundUsage {
                used_on,
                category,
                ..new_usage(allocation)
            };
            insert_fund_usage(&usage, &usage.allocation.resolve(&policy).unwrap(), &connection)
                .unwrap();
        }
        let may = UsageFilter {
            start: Some(date!(2024 - 05 - 01)),
            end: Some(date!(2024 - 05 - 31)),
            category: None,
        };

        let summary = summarize_fund_usage(&may, &connection).unwrap();
        let operational = summarize_fund_usage(
            &UsageFilter {
                category: Some(UsageCategory::Operational),
                ..may
            },
            &connection,
        )
        .unwrap();

        assert_eq!(summary.count, 3);
        assert_eq!(summary.total, Money::from_major(105));
        assert_eq!(summary.average, Money::from_major(35));
        assert_eq!(summary.largest, Money::from_major(90));
        assert_eq!(operational.count, 2);
        assert_eq!(operational.total, Money::from_major(15));
        assert_eq!(operational.average, Money::from_minor(750));
        assert_eq!(operational.largest, Money::from_major(10));
    }

    #[test]
    fn summary_without_usage_is_zero() {
        let connection = get_test_connection();

        let summary = summarize_fund_usage(&UsageFilter::default(), &connection).unwrap();

        assert_eq!(summary.count, 0);
        assert_eq!(summary.total, Money::ZERO);
        assert_eq!(summary.average, Money::ZERO);
        assert_eq!(summary.largest, Money::ZERO);
    }

    #[test]
    fn oversized_shares_are_rejected() {
        let over = Money::MAX_INPUT.checked_add(Money::from_minor(1)).unwrap();

        assert!(matches!(
            Allocation::Single {
                bucket: FundBucket::Combined,
                amount: over
            }
            .resolve(&SplitPolicy::default()),
            Err(Error::InvalidAmount(_))
        ));
        assert_eq!(
            Allocation::Split {
                shares: BTreeMap::from([
                    (FundBucket::Tuition, Money::MAX_INPUT),
                    (FundBucket::Donation, Money::MAX_INPUT),
                ])
            }
            .resolve(&SplitPolicy::default())
            .map(|resolved| resolved.total),
            Ok(Money::from_major(2_000_000_000_000))
        );
    }
}
