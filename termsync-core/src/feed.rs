//! Parsing of the portal's ICS schedule export.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::{
    DatePerhapsTime,
    parser::{Property, read_calendar, unfold},
};

use crate::error::SyncError;
use crate::event::FeedEntry;

/// Parse the feed into entries.
///
/// A feed that does not parse at all is fatal; no partial parse is
/// attempted. The portal export carries the occasional VEVENT stub without
/// DTSTART/DTEND (to-do placeholders), and those are skipped rather than
/// rejected. Missing SUMMARY/LOCATION/DESCRIPTION default to empty strings.
pub fn parse_feed(content: &str) -> Result<Vec<FeedEntry>, SyncError> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(SyncError::MalformedFeed)?;

    let mut entries = Vec::new();

    for vevent in calendar.components.iter().filter(|c| c.name == "VEVENT") {
        let (Some(start_prop), Some(end_prop)) =
            (vevent.find_prop("DTSTART"), vevent.find_prop("DTEND"))
        else {
            continue;
        };
        let (Some(start), Some(end)) = (resolve_time(start_prop), resolve_time(end_prop)) else {
            continue;
        };

        let prop_text = |name: &str| {
            vevent
                .find_prop(name)
                .map(|p| p.val.to_string())
                .unwrap_or_default()
        };

        entries.push(FeedEntry {
            summary: prop_text("SUMMARY"),
            location: prop_text("LOCATION"),
            description: prop_text("DESCRIPTION"),
            start,
            end,
        });
    }

    Ok(entries)
}

/// Resolve a DTSTART/DTEND property to a UTC instant.
///
/// UTC times pass through; floating and all-day values are interpreted in
/// the local timezone (the portal publishes local wall-clock times); TZID
/// values go through chrono-tz, falling back to local for ids the IANA
/// database does not know.
fn resolve_time(prop: &Property) -> Option<DateTime<Utc>> {
    match DatePerhapsTime::try_from(prop).ok()? {
        DatePerhapsTime::Date(d) => to_local_instant(d.and_hms_opt(0, 0, 0)?),
        DatePerhapsTime::DateTime(dt) => match dt {
            icalendar::CalendarDateTime::Utc(dt) => Some(dt),
            icalendar::CalendarDateTime::Floating(naive) => to_local_instant(naive),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => {
                match tzid.parse::<Tz>() {
                    Ok(tz) => tz
                        .from_local_datetime(&date_time)
                        .earliest()
                        .map(|dt| dt.with_timezone(&Utc)),
                    Err(_) => to_local_instant(date_time),
                }
            }
        },
    }
}

fn to_local_instant(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
