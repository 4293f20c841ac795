//! Canonical timezone lookups through `time-tz`.

use time::{OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone, Tz};

pub fn get_timezone(canonical_timezone: &str) -> Option<&'static Tz> {
    time_tz::timezones::get_by_name(canonical_timezone)
}

/// The UTC offset that `tz` had at `instant`, which matters for zones with daylight saving.
pub fn offset_at(tz: &Tz, instant: OffsetDateTime) -> UtcOffset {
    tz.get_offset_utc(&instant).to_utc()
}
