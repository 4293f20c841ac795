//! The balance guard: check that a bucket can pay before fund usage is written.
//!
//! A [Reservation] holds the walk locks of every bucket it touches from the balance check
//! until the chain walks after the write have finished, so two submissions against the same
//! bucket can never both pass the check on the same balance.

use std::collections::BTreeMap;

use rusqlite::Connection;

use crate::{
    Error,
    bucket::FundBucket,
    db::lock_connection,
    ledger::{
        Ledger,
        lanes::LaneGuards,
        record::BalanceRecord,
        recompute::{WalkMode, walk_chain},
        store::list_balances,
    },
    money::Money,
    period::Period,
    sources::{Allocation, FundUsage, ResolvedAllocation},
};

/// Walk locks on a set of buckets, held until the reservation is committed or dropped.
#[derive(Debug)]
pub struct Reservation<'a> {
    ledger: &'a Ledger,
    guards: LaneGuards<'a>,
    /// Where each held bucket has to be walked from after the write.
    starts: BTreeMap<FundBucket, Period>,
}

impl Ledger {
    /// Check that `bucket` can pay `amount` in `period` and hold its lock until the returned
    /// reservation is committed or dropped.
    ///
    /// An amount drawn from a derived bucket is split across the concrete buckets with the
    /// configured split policy, and every one of them has to be able to pay its share.
    ///
    /// # Errors
    /// Returns [Error::InsufficientFunds] if the balance is too low, or [Error::FuturePeriod]
    /// if `period` is after the current period.
    pub fn reserve(
        &self,
        bucket: FundBucket,
        period: Period,
        amount: Money,
    ) -> Result<Reservation<'_>, Error> {
        let resolved = Allocation::Single { bucket, amount }.resolve(&self.config.split_policy)?;

        let reservation = self.hold(&resolved.affected_buckets(), period)?;
        reservation.check(period, &resolved, None)?;

        Ok(reservation)
    }

    /// Lock `buckets` and bring their records up to date, including walks that were queued
    /// while the locks were held elsewhere.
    pub(super) fn hold(
        &self,
        buckets: &[FundBucket],
        from: Period,
    ) -> Result<Reservation<'_>, Error> {
        let current = self.clock.current_period()?;
        if from > current {
            return Err(Error::FuturePeriod(from));
        }

        let guards = self.lanes.lock_many(buckets);

        for bucket in guards.buckets() {
            if let Some(pending) = self.lanes.take_pending(*bucket) {
                self.walk_held(*bucket, pending)?;
            }
        }

        let starts = guards
            .buckets()
            .iter()
            .map(|bucket| (*bucket, from))
            .collect();

        Ok(Reservation {
            ledger: self,
            guards,
            starts,
        })
    }

    /// Walk a bucket whose lock the caller holds. A failed walk is queued for the next one.
    pub(super) fn walk_held(&self, bucket: FundBucket, from: Period) -> Result<(), Error> {
        walk_chain(
            &self.connection,
            self.clock.as_ref(),
            bucket,
            from,
            WalkMode::Incremental,
        )
        .map(|_| ())
        .inspect_err(|error| {
            if error.is_retryable() {
                tracing::warn!("walk of {bucket} from {from} failed and will be retried: {error}");
            }
            self.lanes.queue(bucket, from);
        })
    }
}

impl Reservation<'_> {
    /// The buckets this reservation holds.
    pub fn buckets(&self) -> &[FundBucket] {
        self.guards.buckets()
    }

    /// Also walk every held bucket from `period` after the write.
    pub(super) fn include(&mut self, period: Period) {
        for start in self.starts.values_mut() {
            *start = (*start).min(period);
        }
    }

    /// Check that every bucket touched by `resolved` can pay its share in `period`.
    ///
    /// `replaced` is the usage being edited: its shares are credited back from its period on.
    pub(super) fn check(
        &self,
        period: Period,
        resolved: &ResolvedAllocation,
        replaced: Option<&FundUsage>,
    ) -> Result<(), Error> {
        let current = self.ledger.clock.current_period()?;
        if period > current {
            return Err(Error::FuturePeriod(period));
        }

        for bucket in resolved.affected_buckets() {
            let requested = resolved.share_of(bucket);
            let credit = replaced.map(|usage| (usage.period, usage.resolved().share_of(bucket)));
            let available = self.available(bucket, period, current, credit)?;

            if requested > available {
                tracing::warn!(
                    "rejected {requested} from {bucket} in {period}: only {available} available"
                );
                return Err(Error::InsufficientFunds {
                    bucket,
                    period,
                    requested,
                    available,
                });
            }
        }

        Ok(())
    }

    /// The most that can be drawn from `bucket` in `period` without any closing balance from
    /// `period` through `current` going negative.
    fn available(
        &self,
        bucket: FundBucket,
        period: Period,
        current: Period,
        credit: Option<(Period, Money)>,
    ) -> Result<Money, Error> {
        let mut records = self.records_between(bucket, period, current)?;
        if records.len() != period.through(current).count() {
            self.ledger.walk_held(bucket, period)?;
            records = self.records_between(bucket, period, current)?;
        }

        let credit_at = |record_period: Period| match credit {
            Some((from, amount)) if record_period >= from => amount,
            _ => Money::ZERO,
        };

        let closings = records
            .iter()
            .map(|record| record.closing.checked_add(credit_at(record.period)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(closings.into_iter().min().unwrap_or(Money::ZERO))
    }

    fn records_between(
        &self,
        bucket: FundBucket,
        start: Period,
        end: Period,
    ) -> Result<Vec<BalanceRecord>, Error> {
        let connection = lock_connection(&self.ledger.connection)?;
        list_balances(bucket, Some(start), Some(end), &connection)
    }

    /// Run `write` against the database, then walk every held bucket before releasing the
    /// locks.
    ///
    /// If a walk fails after `write` succeeded, the write stays and the walk is queued for the
    /// next request on that bucket.
    pub fn commit<T>(
        self,
        write: impl FnOnce(&Connection) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let value = {
            let connection = lock_connection(&self.ledger.connection)?;
            write(&connection)?
        };

        let mut first_error = None;
        for (bucket, start) in &self.starts {
            if let Err(error) = self.ledger.walk_held(*bucket, *start) {
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(value),
        }
    }
}
