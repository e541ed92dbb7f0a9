//! Day-grouping labels for the message list.
//!
//! Backend timestamps are wall-clock strings in the viewer's zone, so they are
//! parsed as naive local times. RFC 3339 values are converted into the viewer
//! zone first.

use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime};

pub const TODAY_LABEL: &str = "today";
pub const YESTERDAY_LABEL: &str = "yesterday";
pub const INVALID_DATE_LABEL: &str = "Invalid date";

/// Format used for timestamps the client generates itself (optimistic sends).
pub const LOCAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NAIVE_FORMATS: [&str; 4] = [
    LOCAL_TIMESTAMP_FORMAT,
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Current time in the viewer's time zone.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock pinned to one instant. Used for transcript replay and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

pub fn parse_created_at(raw: &str, zone: &FixedOffset) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
        return Some(value.with_timezone(zone).naive_local());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

pub fn day_label(created_at: Option<NaiveDateTime>, today: NaiveDate) -> String {
    let Some(created_at) = created_at else {
        return INVALID_DATE_LABEL.to_owned();
    };

    let date = created_at.date();
    if date == today {
        return TODAY_LABEL.to_owned();
    }

    if today.pred_opt() == Some(date) {
        return YESTERDAY_LABEL.to_owned();
    }

    if date.year() == today.year() {
        date.format("%-d %B").to_string()
    } else {
        date.format("%-d %B %Y").to_string()
    }
}

/// Ordering key: parsed timestamps ascending, unparsable values after all of them.
pub fn sort_key(created_at: Option<NaiveDateTime>) -> (bool, Option<NaiveDateTime>) {
    (created_at.is_none(), created_at)
}
