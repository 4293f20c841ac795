//! A full scan of the stored records for broken arithmetic or broken chains.

use serde::Serialize;

use crate::{bucket::FundBucket, ledger::record::BalanceRecord, money::Money, period::Period};

/// A problem found in the stored records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// The closing balance is not `opening + income - expense`.
    ///
    /// `expected` is `None` when that sum is too large to store.
    ClosingMismatch {
        bucket: FundBucket,
        period: Period,
        closing: Money,
        expected: Option<Money>,
    },
    /// The opening balance differs from the previous month's closing balance.
    BrokenChain {
        bucket: FundBucket,
        period: Period,
        opening: Money,
        previous_closing: Money,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// How many records were scanned.
    pub checked: usize,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check `records`, which must be sorted by bucket and then period.
pub fn check_records(records: &[BalanceRecord]) -> IntegrityReport {
    let mismatches = records
        .iter()
        .filter(|record| !record.is_consistent())
        .map(|record| IntegrityIssue::ClosingMismatch {
            bucket: record.bucket,
            period: record.period,
            closing: record.closing,
            expected: record.expected_closing().ok(),
        });

    let broken_links = records
        .windows(2)
        .filter_map(|pair| match pair {
            [previous, record]
                if previous.bucket == record.bucket
                    && previous.period.next() == Some(record.period)
                    && previous.closing != record.opening =>
            {
                Some(IntegrityIssue::BrokenChain {
                    bucket: record.bucket,
                    period: record.period,
                    opening: record.opening,
                    previous_closing: previous.closing,
                })
            }
            _ => None,
        });

    IntegrityReport {
        checked: records.len(),
        issues: mismatches.chain(broken_links).collect(),
    }
}
