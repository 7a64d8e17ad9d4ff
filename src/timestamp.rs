use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::{Error, Result};

/// Naive layouts tried, in order, after RFC 3339 and offset layouts.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const ZONED_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M%:z"];

/// The requested moment, as handed in by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampInput {
    /// Parsed on use, e.g. `"2021-07-04T18:00"` or `"2021-07-04T18:00:00Z"`.
    Text(String),
    /// Wall-clock time, compared against local "now".
    Naive(NaiveDateTime),
    /// Time with a UTC offset.
    Zoned(DateTime<FixedOffset>),
}

impl From<&str> for TimestampInput {
    fn from(s: &str) -> Self {
        TimestampInput::Text(s.to_string())
    }
}

impl From<String> for TimestampInput {
    fn from(s: String) -> Self {
        TimestampInput::Text(s)
    }
}

impl From<NaiveDateTime> for TimestampInput {
    fn from(dt: NaiveDateTime) -> Self {
        TimestampInput::Naive(dt)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for TimestampInput {
    fn from(dt: DateTime<Tz>) -> Self {
        TimestampInput::Zoned(dt.fixed_offset())
    }
}

/// A validated-shape timestamp. Only the hour is ever used downstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timestamp {
    wall: NaiveDateTime,
    offset: Option<FixedOffset>,
}

impl Timestamp {
    pub fn resolve(input: TimestampInput) -> Result<Self> {
        match input {
            TimestampInput::Text(text) => parse(&text),
            TimestampInput::Naive(wall) => Ok(Self { wall, offset: None }),
            TimestampInput::Zoned(dt) => Ok(Self {
                wall: dt.naive_local(),
                offset: Some(*dt.offset()),
            }),
        }
    }

    /// Rejects moments at or after `now` and anything before 1940.
    pub fn check_range(&self, now: DateTime<Utc>) -> Result<()> {
        let in_future = match self.offset {
            Some(offset) => {
                let instant = self.wall - offset;
                instant >= now.naive_utc()
            }
            None => self.wall >= now.with_timezone(&Local).naive_local(),
        };
        if in_future {
            return Err(Error::validation(format!(
                "date is in the future: {}",
                self.wall
            )));
        }

        if self.wall < earliest() {
            return Err(Error::validation(format!(
                "date is before earliest supported year (1940): {}",
                self.wall
            )));
        }
        Ok(())
    }

    /// `YYYY-MM-DD`
    pub fn date_param(&self) -> String {
        self.wall.format("%Y-%m-%d").to_string()
    }

    /// `HH:00`; minutes and seconds are dropped.
    pub fn time_param(&self) -> String {
        self.wall.format("%H:00").to_string()
    }

    /// Hour-resolution label used in output filenames.
    pub fn file_label(&self) -> String {
        self.wall.format("%Y-%m-%dT%H:00").to_string()
    }
}

fn earliest() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1940, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

fn parse(text: &str) -> Result<Timestamp> {
    let s = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Timestamp::resolve(TimestampInput::Zoned(dt));
    }
    for fmt in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Timestamp::resolve(TimestampInput::Zoned(dt));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(wall) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Timestamp { wall, offset: None });
        }
    }
    if let Some(wall) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(Timestamp { wall, offset: None });
    }

    Err(Error::validation(format!(
        "could not parse '{}' as a date/time",
        text
    )))
}
