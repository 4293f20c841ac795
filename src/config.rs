//! Ledger configuration.

use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use crate::{Error, bucket::FundBucket, money::Money};

/// The default institution timezone.
pub const DEFAULT_TIMEZONE: &str = "Asia/Jakarta";

/// Settings that change how the ledger derives balances.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// The canonical timezone name used to map timestamps to periods, e.g. "Asia/Jakarta".
    pub local_timezone: String,

    /// How fund usage declared against a derived bucket is split across concrete buckets.
    pub split_policy: SplitPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            local_timezone: DEFAULT_TIMEZONE.to_owned(),
            split_policy: SplitPolicy::default(),
        }
    }
}

/// Relative weights for dividing an amount across the concrete buckets.
///
/// The default splits evenly. Shares are rounded down and any remainder goes to the last
/// weighted bucket, so the shares always add up to the original amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPolicy {
    weights: BTreeMap<FundBucket, u32>,
}

impl SplitPolicy {
    /// # Errors
    /// Returns [Error::InvalidSplitPolicy] if a weight is given for a derived bucket or all the
    /// weights are zero.
    pub fn new(weights: BTreeMap<FundBucket, u32>) -> Result<Self, Error> {
        if let Some(bucket) = weights.keys().find(|bucket| bucket.is_derived()) {
            return Err(Error::InvalidSplitPolicy(format!(
                "{bucket} is derived and cannot receive a share"
            )));
        }

        if weights.values().all(|weight| *weight == 0) {
            return Err(Error::InvalidSplitPolicy(
                "at least one weight must be positive".to_owned(),
            ));
        }

        Ok(Self { weights })
    }

    /// Divide `amount` into per-bucket shares.
    ///
    /// # Errors
    /// Returns [Error::AmountOverflow] if a share cannot be represented.
    pub fn split(&self, amount: Money) -> Result<Vec<(FundBucket, Money)>, Error> {
        let total_weight: u64 = self.weights.values().copied().map(u64::from).sum();
        let weighted: Vec<_> = self
            .weights
            .iter()
            .filter(|(_, weight)| **weight > 0)
            .collect();

        let mut remaining = amount;
        let mut shares = Vec::with_capacity(weighted.len());

        for (index, (bucket, weight)) in weighted.iter().enumerate() {
            let share = if index + 1 == weighted.len() {
                remaining
            } else {
                amount
                    .mul_ratio(u64::from(**weight), total_weight)
                    .ok_or_else(|| {
                        Error::AmountOverflow(format!("{weight}/{total_weight} of {amount}"))
                    })?
            };

            remaining = remaining.checked_sub(share)?;
            shares.push((**bucket, share));
        }

        Ok(shares)
    }
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self {
            weights: FundBucket::concrete().map(|bucket| (bucket, 1)).collect(),
        }
    }
}

impl FromStr for SplitPolicy {
    type Err = Error;

    /// Parse weights written as `tuition=50,donation=50`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut weights = BTreeMap::new();

        for pair in text.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
            let (bucket, weight) = pair.split_once('=').ok_or_else(|| {
                Error::InvalidSplitPolicy(format!("expected bucket=weight, got \"{pair}\""))
            })?;

            let bucket: FundBucket = bucket.trim().parse()?;
            let weight: u32 = weight.trim().parse().map_err(|_| {
                Error::InvalidSplitPolicy(format!("invalid weight \"{weight}\" for {bucket}"))
            })?;

            weights.insert(bucket, weight);
        }

        Self::new(weights)
    }
}

impl Display for SplitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pairs: Vec<String> = self
            .weights
            .iter()
            .map(|(bucket, weight)| format!("{bucket}={weight}"))
            .collect();

        f.write_str(&pairs.join(","))
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, bucket::FundBucket, money::Money};

    use super::SplitPolicy;

    #[test]
    fn default_policy_splits_evenly() {
        let shares = SplitPolicy::default().split(Money::from_major(100)).unwrap();

        assert_eq!(
            shares,
            [
                (FundBucket::Tuition, Money::from_major(50)),
                (FundBucket::Donation, Money::from_major(50))
            ]
        );
    }

    #[test]
    fn remainder_goes_to_the_last_bucket() {
        let policy: SplitPolicy = "tuition=1,donation=2".parse().unwrap();

        let shares = policy.split(Money::from_minor(100)).unwrap();

        assert_eq!(
            shares,
            [
                (FundBucket::Tuition, Money::from_minor(33)),
                (FundBucket::Donation, Money::from_minor(67))
            ]
        );
    }

    #[test]
    fn zero_weight_buckets_get_no_share() {
        let policy: SplitPolicy = "tuition=0,donation=3".parse().unwrap();

        assert_eq!(
            policy.split(Money::from_major(9)),
            Ok(vec![(FundBucket::Donation, Money::from_major(9))])
        );
    }

    #[test]
    fn the_largest_weights_do_not_overflow() {
        let policy: SplitPolicy = format!("tuition={max},donation={max}", max = u32::MAX)
            .parse()
            .unwrap();

        assert_eq!(
            policy.split(Money::from_major(100)),
            Ok(vec![
                (FundBucket::Tuition, Money::from_major(50)),
                (FundBucket::Donation, Money::from_major(50))
            ])
        );
    }

    #[test]
    fn rejects_derived_buckets_and_all_zero_weights() {
        assert!(matches!(
            "combined=1".parse::<SplitPolicy>(),
            Err(Error::InvalidSplitPolicy(_))
        ));
        assert!(matches!(
            "tuition=0,donation=0".parse::<SplitPolicy>(),
            Err(Error::InvalidSplitPolicy(_))
        ));
        assert_eq!(
            "savings=1".parse::<SplitPolicy>(),
            Err(Error::UnknownBucket("savings".to_owned()))
        );
    }

    #[test]
    fn displays_as_parseable_text() {
        let policy = SplitPolicy::default();

        assert_eq!(policy.to_string(), "tuition=1,donation=1");
        assert_eq!(policy.to_string().parse(), Ok(policy));
    }
}
