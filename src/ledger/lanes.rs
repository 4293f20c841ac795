//! Per-bucket serialization of chain walks.
//!
//! Each bucket has a lane: a walk lock and a slot holding the earliest period that still needs
//! a walk. Requests fold their start period into the slot before waiting for the lock, so the
//! walk that runs next covers every request queued behind it.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{Error, bucket::FundBucket, period::Period};

#[derive(Debug, Default)]
struct Lane {
    walk: Mutex<()>,
    pending: Mutex<Option<Period>>,
}

impl Lane {
    fn lock_walk(&self, bucket: FundBucket) -> MutexGuard<'_, ()> {
        // The lock guards no data, every record can be derived again.
        self.walk.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("recovering the poisoned walk lock for {bucket}");
            poisoned.into_inner()
        })
    }

    fn pending(&self) -> MutexGuard<'_, Option<Period>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fold_pending(&self, from: Period) {
        let mut pending = self.pending();
        *pending = Some(pending.map_or(from, |queued| queued.min(from)));
    }

    fn take_pending(&self) -> Option<Period> {
        self.pending().take()
    }
}

/// The walk lanes for every bucket.
#[derive(Debug, Default)]
pub struct BucketLanes {
    lanes: [Lane; 3],
}

/// Walk locks held on several buckets.
///
/// The locks are released when this is dropped.
#[derive(Debug)]
pub struct LaneGuards<'a> {
    buckets: Vec<FundBucket>,
    _guards: Vec<MutexGuard<'a, ()>>,
}

impl LaneGuards<'_> {
    pub fn buckets(&self) -> &[FundBucket] {
        &self.buckets
    }
}

impl BucketLanes {
    fn lane(&self, bucket: FundBucket) -> &Lane {
        // `FundBucket::ALL` lists the buckets in declaration order.
        &self.lanes[bucket as usize]
    }

    /// Queue a walk of `bucket` from `from` and run it unless a walk that started after the
    /// request was queued already covered it.
    ///
    /// `walk` receives the earliest queued period. If it fails, that period is queued again
    /// so the next request for the bucket retries it.
    ///
    /// Returns `None` when the request was folded into another walk.
    pub fn request<T>(
        &self,
        bucket: FundBucket,
        from: Period,
        walk: impl FnOnce(Period) -> Result<T, Error>,
    ) -> Result<Option<T>, Error> {
        let lane = self.lane(bucket);
        lane.fold_pending(from);

        let _guard = lane.lock_walk(bucket);

        let Some(start) = lane.take_pending() else {
            tracing::debug!("walk of {bucket} from {from} was covered by an earlier walk");
            return Ok(None);
        };

        walk(start).map(Some).inspect_err(|_| lane.fold_pending(start))
    }

    /// Take the walk locks of `buckets` in ascending bucket order.
    pub fn lock_many(&self, buckets: &[FundBucket]) -> LaneGuards<'_> {
        let mut buckets = buckets.to_vec();
        buckets.sort();
        buckets.dedup();

        let guards = buckets
            .iter()
            .map(|bucket| self.lane(*bucket).lock_walk(*bucket))
            .collect();

        LaneGuards {
            buckets,
            _guards: guards,
        }
    }

    /// Remove and return the queued start period for `bucket`.
    ///
    /// Callers should hold the bucket's walk lock and walk from the returned period.
    pub fn take_pending(&self, bucket: FundBucket) -> Option<Period> {
        self.lane(bucket).take_pending()
    }

    /// Queue `from` for the next walk of `bucket`.
    pub fn queue(&self, bucket: FundBucket, from: Period) {
        self.lane(bucket).fold_pending(from);
    }
}
