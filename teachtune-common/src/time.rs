//! Time sources and the scheduling time zone
//!
//! Lesson times are entered as wall-clock times of the teacher's device.
//! [`SchedulingZone`] makes that zone explicit so nothing depends on the
//! ambient system zone unless `Local` is configured on purpose.

use crate::{Error, Result};
use chrono::{
    DateTime, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

/// Source of "now"
///
/// Injected into the generator, reconciliation and the monitor so they can
/// be driven without real wall-clock waits.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Zone in which recurrence slots and manual bookings are interpreted
///
/// Configured in TOML as `"local"`, `"utc"` or a fixed offset such as
/// `"-03:00"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SchedulingZone {
    /// Zone of the machine running the scheduler
    #[default]
    Local,
    /// Fixed UTC offset
    Fixed(FixedOffset),
}

impl SchedulingZone {
    pub fn utc() -> Self {
        SchedulingZone::Fixed(Utc.fix())
    }

    /// Convert a local wall-clock time to an absolute instant
    ///
    /// Ambiguous times (DST fall-back) take the earliest instant; times in a
    /// DST gap are moved forward by one hour.
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match self {
            SchedulingZone::Local => resolve_local(&chrono::Local, local),
            SchedulingZone::Fixed(offset) => resolve_local(offset, local),
        }
    }

    /// Wall-clock time of an instant in this zone
    pub fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            SchedulingZone::Local => instant.with_timezone(&chrono::Local).naive_local(),
            SchedulingZone::Fixed(offset) => instant.with_timezone(offset).naive_local(),
        }
    }

    /// Calendar date of an instant in this zone
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.to_local(instant).date()
    }

    /// Instant of local midnight starting `date`
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        self.to_utc(date.and_time(NaiveTime::MIN))
    }
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(t) => t.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = local + Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&local))
        }
    }
}

impl fmt::Display for SchedulingZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulingZone::Local => write!(f, "local"),
            SchedulingZone::Fixed(offset) if offset.local_minus_utc() == 0 => write!(f, "utc"),
            SchedulingZone::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

impl FromStr for SchedulingZone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "local" => return Ok(SchedulingZone::Local),
            "utc" | "z" => return Ok(SchedulingZone::utc()),
            _ => {}
        }

        let (sign, rest) = match s.chars().next() {
            Some('+') => (1, &s[1..]),
            Some('-') => (-1, &s[1..]),
            _ => return Err(Error::Config(format!("Unrecognized time zone: {:?}", s))),
        };

        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::Config(format!("Offset must look like +HH:MM, got {:?}", s)));
        }
        let hours: i32 = digits[..2].parse().map_err(|_| Error::Config(s.to_string()))?;
        let minutes: i32 = digits[2..].parse().map_err(|_| Error::Config(s.to_string()))?;
        if minutes >= 60 {
            return Err(Error::Config(format!("Offset minutes out of range: {:?}", s)));
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(SchedulingZone::Fixed)
            .ok_or_else(|| Error::Config(format!("Offset out of range: {:?}", s)))
    }
}

impl TryFrom<String> for SchedulingZone {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SchedulingZone> for String {
    fn from(zone: SchedulingZone) -> Self {
        zone.to_string()
    }
}

/// Parse a lesson time entered by the teacher
///
/// Accepts RFC 3339 with an explicit offset, or a zone-less
/// `YYYY-MM-DDTHH:MM[:SS]` which is read as wall-clock time in `zone`.
pub fn parse_lesson_time(input: &str, zone: &SchedulingZone) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(input) {
        return Ok(instant.with_timezone(&Utc));
    }

    const LOCAL_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for format in LOCAL_FORMATS {
        if let Ok(local) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(zone.to_utc(local));
        }
    }

    Err(Error::InvalidInput(format!(
        "Unrecognized lesson time {:?} (expected YYYY-MM-DDTHH:MM)",
        input
    )))
}
