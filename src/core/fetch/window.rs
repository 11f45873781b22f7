//! Selection window
//!
//! The window is expressed as wall-clock times in a reference zone. Each
//! fair's `ends_at` is interpreted in the fair's own zone, converted into the
//! reference zone and compared against the bounds inclusively.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Inclusive `[start, end]` range in the reference zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub timezone: Tz,
    pub days: u32,
}

impl TimeWindow {
    /// Window covering the `days` days before `now`
    pub fn ending_at(now: DateTime<Utc>, days: u32, timezone: Tz) -> Self {
        let end = now.with_timezone(&timezone).naive_local();
        let start = end - Duration::days(i64::from(days));
        Self {
            start,
            end,
            timezone,
            days,
        }
    }

    /// Window ending at the current time
    pub fn ending_now(days: u32, timezone: Tz) -> Self {
        Self::ending_at(Utc::now(), days, timezone)
    }

    /// Whether a reference-zone wall-clock time falls inside the window
    pub fn contains(&self, local: NaiveDateTime) -> bool {
        self.start <= local && local <= self.end
    }

    /// Converts a fair end time recorded in `fair_zone` into the reference zone
    ///
    /// Returns `None` when the wall-clock time does not exist in `fair_zone`
    /// (inside a spring-forward gap).
    pub fn to_reference(&self, ends_at: NaiveDateTime, fair_zone: Tz) -> Option<NaiveDateTime> {
        fair_zone
            .from_local_datetime(&ends_at)
            .earliest()
            .map(|dt| dt.with_timezone(&self.timezone).naive_local())
    }

    /// Whether a fair ending at `ends_at` in `fair_zone` is selected
    pub fn selects(&self, ends_at: NaiveDateTime, fair_zone: Tz) -> bool {
        self.to_reference(ends_at, fair_zone)
            .map(|local| self.contains(local))
            .unwrap_or(false)
    }

    /// Name of the reference zone, as bound into the query
    pub fn timezone_name(&self) -> &'static str {
        self.timezone.name()
    }
}
