//! The fund buckets that the ledger keeps balances for.

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::Error;

/// A named sub-ledger.
///
/// The concrete buckets receive income and pay expenses directly. [FundBucket::Combined] is
/// derived: its income and expenses are the sums over the concrete buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundBucket {
    /// Monthly tuition dues paid by students.
    Tuition,
    /// Donations from the public.
    Donation,
    /// All money held by the institution.
    Combined,
}

impl FundBucket {
    /// Every bucket, concrete buckets first.
    ///
    /// Locks over several buckets are always taken in this order.
    pub const ALL: [FundBucket; 3] = [
        FundBucket::Tuition,
        FundBucket::Donation,
        FundBucket::Combined,
    ];

    /// The buckets that hold money directly.
    pub fn concrete() -> impl Iterator<Item = FundBucket> {
        Self::ALL.into_iter().filter(|bucket| !bucket.is_derived())
    }

    /// The buckets whose balances are sums over the concrete buckets.
    pub fn derived() -> impl Iterator<Item = FundBucket> {
        Self::ALL.into_iter().filter(|bucket| bucket.is_derived())
    }

    pub fn is_derived(self) -> bool {
        matches!(self, FundBucket::Combined)
    }

    /// The buckets whose balances change when money moves in or out of `self`.
    ///
    /// For a concrete bucket this is the bucket itself plus every derived bucket; a derived
    /// bucket touches every bucket.
    pub fn affected_buckets(self) -> Vec<FundBucket> {
        if self.is_derived() {
            Self::ALL.to_vec()
        } else {
            std::iter::once(self).chain(Self::derived()).collect()
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FundBucket::Tuition => "tuition",
            FundBucket::Donation => "donation",
            FundBucket::Combined => "combined",
        }
    }
}

impl Display for FundBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FundBucket {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|bucket| bucket.as_str() == text)
            .ok_or_else(|| Error::UnknownBucket(text.to_owned()))
    }
}

impl ToSql for FundBucket {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for FundBucket {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}
