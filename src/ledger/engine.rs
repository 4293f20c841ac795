//! The ledger: the entry point for source writes, recompute triggers and balance queries.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    Error,
    bucket::FundBucket,
    clock::{Clock, SystemClock},
    config::LedgerConfig,
    db::{initialize, lock_connection},
    ledger::{
        aggregate::earliest_activity,
        integrity::{IntegrityReport, check_records},
        lanes::BucketLanes,
        record::BalanceRecord,
        recompute::{WalkMode, WalkReport, walk_chain},
        store::{
            OpeningSeed, all_balances_unchecked, earliest_balance_period, get_balance,
            has_balances_before, latest_balance, list_balances, replace_seeds,
        },
        summary::{BalanceSummary, summarize},
    },
    money::Money,
    period::Period,
    sources::{
        Donation, DonationId, FundUsage, FundUsageId, FundUsageSummary, NewDonation,
        NewFundUsage, NewTuitionDue, TuitionDue, TuitionId, TuitionStatus, UsageFilter,
        create_tuition_due, delete_donation, delete_fund_usage, get_fund_usage, insert_donation,
        insert_fund_usage, list_fund_usage, summarize_fund_usage, update_fund_usage,
        update_tuition_status,
    },
};

/// Derives and maintains the per-period balances of every fund bucket.
#[derive(Debug)]
pub struct Ledger {
    pub(super) connection: Arc<Mutex<Connection>>,
    pub(super) lanes: BucketLanes,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) config: LedgerConfig,
}

impl Ledger {
    /// Create a ledger over an initialized database.
    pub fn new(
        connection: Arc<Mutex<Connection>>,
        clock: Arc<dyn Clock>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            connection,
            lanes: BucketLanes::default(),
            clock,
            config,
        }
    }

    /// Initialize the database behind `connection` and create a ledger that uses the system
    /// clock in the configured timezone.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized or the timezone is unknown.
    pub fn open(connection: Connection, config: LedgerConfig) -> Result<Self, Error> {
        initialize(&connection)?;
        let clock = SystemClock::new(&config.local_timezone)?;

        Ok(Self::new(
            Arc::new(Mutex::new(connection)),
            Arc::new(clock),
            config,
        ))
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// The calendar month walks stop at.
    pub fn current_period(&self) -> Result<Period, Error> {
        self.clock.current_period()
    }

    /// Recompute `bucket` from `from` through the current period.
    ///
    /// Concurrent requests for the same bucket are folded into one walk from the earliest
    /// requested period. Returns `None` if another walk already covered this request.
    ///
    /// # Errors
    /// Returns [Error::FuturePeriod] if `from` is after the current period.
    pub fn recompute(
        &self,
        bucket: FundBucket,
        from: Period,
    ) -> Result<Option<WalkReport>, Error> {
        if from > self.current_period()? {
            return Err(Error::FuturePeriod(from));
        }

        self.lanes.request(bucket, from, |start| {
            walk_chain(
                &self.connection,
                self.clock.as_ref(),
                bucket,
                start,
                WalkMode::Incremental,
            )
        })
    }

    /// Recompute `bucket` from `from`, overwriting records whose closing balance does not add
    /// up instead of stopping at them.
    pub fn repair(&self, bucket: FundBucket, from: Period) -> Result<WalkReport, Error> {
        let _guards = self.lanes.lock_many(&[bucket]);
        let start = self
            .lanes
            .take_pending(bucket)
            .map_or(from, |pending| pending.min(from));

        tracing::warn!("repairing {bucket} from {start}");

        walk_chain(
            &self.connection,
            self.clock.as_ref(),
            bucket,
            start,
            WalkMode::Repair,
        )
        .inspect_err(|_| self.lanes.queue(bucket, start))
    }

    /// Recompute every bucket from the start of its history.
    pub fn sync_all(&self) -> Result<Vec<WalkReport>, Error> {
        let current = self.current_period()?;
        let mut reports = Vec::new();

        for bucket in FundBucket::ALL {
            let from = {
                let connection = lock_connection(&self.connection)?;
                [
                    earliest_balance_period(bucket, &connection)?,
                    earliest_activity(bucket, &connection)?,
                ]
                .into_iter()
                .flatten()
                .min()
                .unwrap_or(current)
                .min(current)
            };

            reports.extend(self.recompute(bucket, from)?);
        }

        Ok(reports)
    }

    /// Recompute `bucket` and the buckets derived from it after a source change in `period`.
    ///
    /// Periods after the current one have no records yet; they are picked up by the first walk
    /// that reaches them.
    fn recompute_affected(&self, bucket: FundBucket, period: Period) -> Result<(), Error> {
        if period > self.current_period()? {
            tracing::debug!("{bucket} changed in the future period {period}, nothing to walk yet");
            return Ok(());
        }

        for affected in bucket.affected_buckets() {
            self.recompute(affected, period)?;
        }

        Ok(())
    }

    /// A tuition due in `period` was paid or unpaid.
    pub fn on_tuition_status_changed(&self, period: Period) -> Result<(), Error> {
        self.recompute_affected(FundBucket::Tuition, period)
    }

    /// A donation received at `recorded_at` was added or removed.
    pub fn on_donation_recorded(&self, recorded_at: OffsetDateTime) -> Result<(), Error> {
        let period = Period::containing_timestamp(self.clock.to_local(recorded_at))?;
        self.recompute_affected(FundBucket::Donation, period)
    }

    /// Fund usage paid from `bucket` in `period` changed by `amount_delta`.
    ///
    /// Only needed for usage written without going through [Ledger::submit_fund_usage] and
    /// friends. Every source in the period is summed again, so the delta is only logged.
    pub fn on_fund_usage_changed(
        &self,
        period: Period,
        bucket: FundBucket,
        amount_delta: Money,
    ) -> Result<(), Error> {
        tracing::debug!("fund usage from {bucket} in {period} changed by {amount_delta}");
        self.recompute_affected(bucket, period)
    }

    pub fn create_tuition_due(&self, new_due: &NewTuitionDue) -> Result<TuitionDue, Error> {
        let due = {
            let connection = lock_connection(&self.connection)?;
            create_tuition_due(new_due, &connection)?
        };

        tracing::info!("created tuition due {} for {} in {}", due.id, due.student, due.period);

        if due.status == TuitionStatus::Paid {
            self.on_tuition_status_changed(due.period)?;
        }

        Ok(due)
    }

    pub fn set_tuition_status(
        &self,
        id: TuitionId,
        status: TuitionStatus,
    ) -> Result<TuitionDue, Error> {
        let due = {
            let connection = lock_connection(&self.connection)?;
            update_tuition_status(id, status, &connection)?
        };

        tracing::info!("tuition due {id} for {} is now {}", due.period, status.as_str());
        self.on_tuition_status_changed(due.period)?;

        Ok(due)
    }

    /// Record a donation, received now unless the donation says otherwise.
    pub fn record_donation(&self, new_donation: &NewDonation) -> Result<Donation, Error> {
        let recorded_at = self
            .clock
            .to_local(new_donation.recorded_at.unwrap_or_else(|| self.clock.now()));

        let donation = {
            let connection = lock_connection(&self.connection)?;
            insert_donation(
                new_donation.donor.as_deref().unwrap_or_default(),
                new_donation.amount,
                recorded_at,
                &connection,
            )?
        };

        tracing::info!(
            "recorded donation {} of {} for {}",
            donation.id,
            donation.amount,
            donation.period
        );
        self.on_donation_recorded(donation.recorded_at)?;

        Ok(donation)
    }

    pub fn delete_donation(&self, id: DonationId) -> Result<Donation, Error> {
        let donation = {
            let connection = lock_connection(&self.connection)?;
            delete_donation(id, &connection)?
        };

        tracing::info!("deleted donation {id} of {}", donation.amount);
        self.on_donation_recorded(donation.recorded_at)?;

        Ok(donation)
    }

    /// Check that the buckets can pay for `new_usage`, then store it and recompute them.
    ///
    /// # Errors
    /// Returns [Error::InsufficientFunds] if a bucket cannot pay its share, in which case
    /// nothing is written.
    pub fn submit_fund_usage(&self, new_usage: &NewFundUsage) -> Result<FundUsage, Error> {
        let period = new_usage.period()?;
        let resolved = new_usage.allocation.resolve(&self.config.split_policy)?;

        let reservation = self.hold(&resolved.affected_buckets(), period)?;
        reservation.check(period, &resolved, None)?;
        let usage = reservation.commit(|connection| {
            insert_fund_usage(new_usage, &resolved, connection)
        })?;

        tracing::info!(
            "submitted fund usage {} of {} from {}",
            usage.id,
            usage.amount,
            usage.source
        );

        Ok(usage)
    }

    /// Replace a fund usage, checking the new amounts with the old ones credited back.
    pub fn edit_fund_usage(
        &self,
        id: FundUsageId,
        new_usage: &NewFundUsage,
    ) -> Result<FundUsage, Error> {
        let period = new_usage.period()?;
        let resolved = new_usage.allocation.resolve(&self.config.split_policy)?;

        let mut reservation = self.hold(&FundBucket::ALL, period)?;
        let existing = {
            let connection = lock_connection(&self.connection)?;
            get_fund_usage(id, &connection).map_err(|error| match error {
                Error::NotFound => Error::UpdateMissingFundUsage,
                error => error,
            })?
        };

        reservation.include(existing.period);
        reservation.check(period, &resolved, Some(&existing))?;
        let usage = reservation.commit(|connection| {
            update_fund_usage(id, new_usage, &resolved, connection)
        })?;

        tracing::info!(
            "edited fund usage {id}: {} in {} is now {} in {}",
            existing.amount,
            existing.period,
            usage.amount,
            usage.period
        );

        Ok(usage)
    }

    /// Delete a fund usage. Removing an expense can only raise balances, so nothing is checked.
    pub fn delete_fund_usage(&self, id: FundUsageId) -> Result<FundUsage, Error> {
        let mut reservation = self.hold(&FundBucket::ALL, self.current_period()?)?;
        let existing = {
            let connection = lock_connection(&self.connection)?;
            get_fund_usage(id, &connection).map_err(|error| match error {
                Error::NotFound => Error::DeleteMissingFundUsage,
                error => error,
            })?
        };

        reservation.include(existing.period);
        reservation.commit(|connection| delete_fund_usage(id, connection))?;

        tracing::info!("deleted fund usage {id} of {}", existing.amount);

        Ok(existing)
    }

    /// # Errors
    /// Returns [Error::NotFound] if the period has no record yet.
    pub fn get_balance(&self, bucket: FundBucket, period: Period) -> Result<BalanceRecord, Error> {
        let connection = lock_connection(&self.connection)?;
        get_balance(bucket, period, &connection)?.ok_or(Error::NotFound)
    }

    /// # Errors
    /// Returns [Error::NotFound] if the bucket has no records yet.
    pub fn get_latest_balance(&self, bucket: FundBucket) -> Result<BalanceRecord, Error> {
        let connection = lock_connection(&self.connection)?;
        latest_balance(bucket, &connection)?.ok_or(Error::NotFound)
    }

    pub fn list_balances(
        &self,
        bucket: FundBucket,
        start: Option<Period>,
        end: Option<Period>,
    ) -> Result<Vec<BalanceRecord>, Error> {
        check_range(start, end)?;

        let connection = lock_connection(&self.connection)?;
        list_balances(bucket, start, end, &connection)
    }

    /// Totals for `bucket` over the inclusive range, or over all records when no bound is given.
    pub fn get_summary(
        &self,
        bucket: FundBucket,
        start: Option<Period>,
        end: Option<Period>,
    ) -> Result<BalanceSummary, Error> {
        let records = self.list_balances(bucket, start, end)?;

        summarize(bucket, start, end, &records)
    }

    pub fn list_fund_usage(&self, period: Option<Period>) -> Result<Vec<FundUsage>, Error> {
        let connection = lock_connection(&self.connection)?;
        list_fund_usage(period, &connection)
    }

    /// Count, total, average and largest amount of the fund usage matching `filter`.
    ///
    /// # Errors
    /// Returns [Error::InvalidDateRange] if the filter ends before it starts.
    pub fn summarize_fund_usage(&self, filter: &UsageFilter) -> Result<FundUsageSummary, Error> {
        if let (Some(start), Some(end)) = (filter.start, filter.end)
            && start > end
        {
            return Err(Error::InvalidDateRange { start, end });
        }

        let connection = lock_connection(&self.connection)?;
        summarize_fund_usage(filter, &connection)
    }

    /// Set explicit opening balances for the concrete buckets at `period` and recompute every
    /// bucket from there. Buckets missing from `balances` start at zero.
    ///
    /// # Errors
    /// Returns [Error::InvalidSeed] for a derived bucket or when records already exist before
    /// `period`, and [Error::FuturePeriod] if `period` is after the current period.
    pub fn seed_opening_balances(
        &self,
        period: Period,
        balances: &BTreeMap<FundBucket, Money>,
    ) -> Result<Vec<OpeningSeed>, Error> {
        if let Some(bucket) = balances.keys().find(|bucket| bucket.is_derived()) {
            return Err(Error::InvalidSeed(format!(
                "{bucket} is derived from the other buckets and cannot be seeded"
            )));
        }

        if period > self.current_period()? {
            return Err(Error::FuturePeriod(period));
        }

        let seeded: Vec<(FundBucket, Money)> = FundBucket::concrete()
            .map(|bucket| {
                let opening = balances.get(&bucket).copied().unwrap_or_default();
                opening.within_input_limit().map(|opening| (bucket, opening))
            })
            .collect::<Result<_, _>>()?;

        let reservation = self.hold(&FundBucket::ALL, period)?;
        let seeds = reservation.commit(|connection| {
            if has_balances_before(period, connection)? {
                return Err(Error::InvalidSeed(format!(
                    "balances before {period} already exist, seed an earlier period instead"
                )));
            }

            replace_seeds(period, &seeded, connection)
        })?;

        tracing::info!("seeded opening balances at {period}");

        Ok(seeds)
    }

    /// Scan every record for closing balances that do not add up and broken chains.
    pub fn verify_integrity(&self) -> Result<IntegrityReport, Error> {
        let records = {
            let connection = lock_connection(&self.connection)?;
            all_balances_unchecked(&connection)?
        };

        let report = check_records(&records);
        if !report.is_clean() {
            tracing::error!(
                "found {} integrity issues in {} balance records",
                report.issues.len(),
                report.checked
            );
        }

        Ok(report)
    }
}

fn check_range(start: Option<Period>, end: Option<Period>) -> Result<(), Error> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(Error::InvalidRange { start, end }),
        _ => Ok(()),
    }
}

#[cfg(test)]
impl Ledger {
    /// Run raw SQL against the ledger's database, e.g. to damage records on purpose.
    pub(crate) fn corrupt_for_test(&self, sql: &str) {
        self.connection
            .lock()
            .unwrap()
            .execute(sql, ())
            .expect("Could not run test SQL");
    }
}
