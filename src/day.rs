//! Calendar-day values and the simulated clock.
//!
//! Every scheduling computation works on [`Day`], a date with no time-of-day
//! component, so two moments on the same calendar day compare equal. The wall
//! clock is read in exactly one place: [`SimClock::today`].

use std::fmt;

use chrono::{DateTime, Days, Local, NaiveDate};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

/// Label rendered for input that cannot be read as a date.
pub const INVALID_DATE_LABEL: &str = "invalid date";

const KEY_FORMAT: &str = "%Y-%m-%d";

/// A canonical start-of-day value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Day(NaiveDate);

impl Day {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Strip all sub-day precision from a local moment.
    pub fn start_of(moment: DateTime<Local>) -> Self {
        Self(moment.date_naive())
    }

    /// Interpret a millisecond epoch timestamp in local time.
    pub fn from_timestamp_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(|utc| Self::start_of(utc.with_timezone(&Local)))
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }

    /// Add (or, for negative `n`, subtract) whole calendar days.
    ///
    /// Arithmetic happens on dates, never on 24 hour increments, so month and
    /// year boundaries and daylight-saving changes cannot shift the result.
    pub fn add_days(self, n: i64) -> Self {
        let step = Days::new(n.unsigned_abs());
        let shifted = if n >= 0 {
            self.0.checked_add_days(step)
        } else {
            self.0.checked_sub_days(step)
        };

        match shifted {
            Some(date) => Self(date),
            None => {
                warn!(day = %self, n, "day arithmetic out of range, keeping original day");
                self
            }
        }
    }

    /// Signed number of days from `earlier` to `self`.
    pub fn days_since(self, earlier: Day) -> i64 {
        self.0.signed_duration_since(earlier.0).num_days()
    }

    /// Stable string key (`YYYY-MM-DD`), also the serialized form.
    pub fn key(self) -> String {
        self.0.format(KEY_FORMAT).to_string()
    }

    /// "Today", "Tomorrow", "Day after tomorrow", or a weekday/day/month label.
    pub fn relative_label(self, reference: Day) -> String {
        match self.days_since(reference) {
            0 => "Today".to_string(),
            1 => "Tomorrow".to_string(),
            2 => "Day after tomorrow".to_string(),
            _ => self.0.format("%A, %-d %b").to_string(),
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(KEY_FORMAT))
    }
}

/// Read a day from an ISO date, an RFC 3339 moment, or a millisecond timestamp.
pub fn parse_day(input: &str) -> Option<Day> {
    let trimmed = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, KEY_FORMAT) {
        return Some(Day(date));
    }
    if let Ok(moment) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(Day::start_of(moment.with_timezone(&Local)));
    }
    trimmed.parse::<i64>().ok().and_then(Day::from_timestamp_millis)
}

/// Like [`parse_day`], but unreadable input degrades to `fallback`.
pub fn parse_moment(input: &str, fallback: Day) -> Day {
    parse_day(input).unwrap_or_else(|| {
        warn!(input, "unparseable moment, using current day");
        fallback
    })
}

/// Relative label for raw text; unreadable input yields [`INVALID_DATE_LABEL`].
pub fn relative_label(input: &str, reference: Day) -> String {
    parse_day(input)
        .map(|day| day.relative_label(reference))
        .unwrap_or_else(|| INVALID_DATE_LABEL.to_string())
}

impl Serialize for Day {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Day {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DayVisitor)
    }
}

struct DayVisitor;

impl de::Visitor<'_> for DayVisitor {
    type Value = Day;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a YYYY-MM-DD date or a millisecond timestamp")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Day, E> {
        parse_day(value).ok_or_else(|| E::invalid_value(de::Unexpected::Str(value), &self))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Day, E> {
        Day::from_timestamp_millis(value)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(value), &self))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Day, E> {
        i64::try_from(value)
            .ok()
            .and_then(Day::from_timestamp_millis)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(value), &self))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Day, E> {
        if !value.is_finite() {
            return Err(E::invalid_value(de::Unexpected::Float(value), &self));
        }
        self.visit_i64(value.round() as i64)
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Simulated Clock
// ══════════════════════════════════════════════════════════════════════════

/// The single source of truth for "today".
///
/// Holds a day offset applied on top of the real current day; the offset is
/// how the debug surface fast-forwards time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimClock {
    offset_days: i64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(offset_days: i64) -> Self {
        Self { offset_days }
    }

    pub fn offset(&self) -> i64 {
        self.offset_days
    }

    pub fn is_simulated(&self) -> bool {
        self.offset_days != 0
    }

    /// Effective today: the real local day plus the offset.
    pub fn today(&self) -> Day {
        self.today_from(Day::start_of(Local::now()))
    }

    /// Effective today relative to a given real day.
    pub fn today_from(&self, real_today: Day) -> Day {
        real_today.add_days(self.offset_days)
    }

    pub fn advance_day(&mut self) {
        self.offset_days += 1;
    }

    pub fn reset(&mut self) {
        self.offset_days = 0;
    }
}
