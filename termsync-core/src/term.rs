//! Sync window ("term") computation.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::SyncError;

/// The inclusive time range `[start, end]` whose destination events are
/// replaced on each run. Computed fresh from the current time; never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    /// Compute the replacement window from a reference instant.
    ///
    /// The window starts at the first instant of `now`'s month and spans
    /// exactly `months` whole calendar months, ending at 23:59:59 on the
    /// last day of the final month. Boundaries are wall-clock month edges
    /// in `now`'s timezone, converted once to UTC instants so that event
    /// filtering and the remote list query can never disagree.
    pub fn compute<Tz: TimeZone>(now: &DateTime<Tz>, months: u32) -> Result<Self, SyncError> {
        if months == 0 {
            return Err(SyncError::Config(
                "sync_months must be at least 1".to_string(),
            ));
        }

        // Day 1 always exists, so from_ymd_opt cannot fail here.
        let first_of_month =
            NaiveDate::from_ymd_opt(now.year(), now.month(), 1).expect("day 1 of a valid month");

        // One day before the first day of the month `months` months later,
        // i.e. the last day of the window's final month. `Months` carries
        // the year rollover (November + 3 months ends in January).
        let last_day = first_of_month
            .checked_add_months(Months::new(months))
            .and_then(|d| d.pred_opt())
            .ok_or_else(|| {
                SyncError::Config(format!(
                    "sync window of {months} months overflows the calendar"
                ))
            })?;

        let tz = now.timezone();
        let start = resolve_local(&tz, first_of_month.and_hms_opt(0, 0, 0).unwrap())?;
        let end = resolve_local(&tz, last_day.and_hms_opt(23, 59, 59).unwrap())?;

        Ok(SyncWindow { start, end })
    }

    /// Whether an instant falls inside the window, inclusive on both ends.
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        *instant >= self.start && *instant <= self.end
    }

    pub fn start_rfc3339(&self) -> String {
        self.start.to_rfc3339()
    }

    pub fn end_rfc3339(&self) -> String {
        self.end.to_rfc3339()
    }
}

/// Interpret a wall-clock time in `tz`, taking the earlier instant when a
/// DST transition makes it ambiguous.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Result<DateTime<Utc>, SyncError> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            SyncError::Config(format!(
                "{naive} does not exist in the configured timezone"
            ))
        })
}
