//! Where the ledger gets "now" from.
//!
//! The chain walk stops at the current calendar period, so the clock decides how far forward
//! balances are materialized. Tests and backfills use [FixedClock].

use std::fmt::{self, Debug};

use time::OffsetDateTime;
use time_tz::Tz;

use crate::{Error, period::Period, timezone};

/// A source of the current local time.
pub trait Clock: Debug + Send + Sync {
    /// The current date and time in the institution's local timezone.
    fn now(&self) -> OffsetDateTime;

    /// The period that contains [Clock::now].
    ///
    /// # Errors
    /// Returns [Error::InvalidPeriod] if the clock reads a year without four digits.
    fn current_period(&self) -> Result<Period, Error> {
        Period::containing_timestamp(self.now())
    }

    /// Convert `instant` to the institution's local offset.
    fn to_local(&self, instant: OffsetDateTime) -> OffsetDateTime;
}

/// The system clock, shifted to a canonical timezone such as "Asia/Jakarta".
#[derive(Clone)]
pub struct SystemClock {
    name: String,
    timezone: &'static Tz,
}

impl Debug for SystemClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemClock")
            .field("timezone", &self.name)
            .finish()
    }
}

impl SystemClock {
    /// # Errors
    /// Returns [Error::InvalidTimezoneError] if `canonical_timezone` is not a known timezone.
    pub fn new(canonical_timezone: &str) -> Result<Self, Error> {
        timezone::get_timezone(canonical_timezone)
            .map(|timezone| Self {
                name: canonical_timezone.to_owned(),
                timezone,
            })
            .ok_or_else(|| Error::InvalidTimezoneError(canonical_timezone.to_owned()))
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        self.to_local(OffsetDateTime::now_utc())
    }

    fn to_local(&self, instant: OffsetDateTime) -> OffsetDateTime {
        instant.to_offset(timezone::offset_at(self.timezone, instant))
    }
}

/// A clock that always reads the same time.
///
/// Local time is the fixed time's offset.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }

    fn to_local(&self, instant: OffsetDateTime) -> OffsetDateTime {
        instant.to_offset(self.0.offset())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use crate::{Error, period::Period};

    use super::{Clock, FixedClock, SystemClock};

    #[test]
    fn system_clock_rejects_unknown_timezones() {
        assert_eq!(
            SystemClock::new("Mars/Olympus").unwrap_err(),
            Error::InvalidTimezoneError("Mars/Olympus".to_owned())
        );
    }

    #[test]
    fn system_clock_converts_to_local_time() {
        let clock = SystemClock::new("Asia/Jakarta").unwrap();

        let local = clock.to_local(datetime!(2024-04-30 18:30 UTC));

        assert_eq!(Period::containing_timestamp(local), Period::new(2024, 5));
    }

    #[test]
    fn fixed_clock_reports_its_period() {
        let clock = FixedClock(datetime!(2024-06-15 09:00 +07:00));

        assert_eq!(clock.current_period(), Period::new(2024, 6));
        assert_eq!(
            clock.to_local(datetime!(2024-06-30 20:00 UTC)),
            datetime!(2024-07-01 03:00 +07:00)
        );
    }
}
