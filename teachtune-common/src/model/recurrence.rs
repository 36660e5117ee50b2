//! Recurrence model: a student's standing lesson pattern

use crate::{Error, Result};
use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// How often the weekly slot pattern repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
}

impl Frequency {
    /// Cycle length in days for the day-stepped frequencies
    ///
    /// `None` for Monthly, which steps by calendar month.
    pub fn cycle_days(&self) -> Option<i64> {
        match self {
            Frequency::Weekly => Some(7),
            Frequency::Biweekly => Some(14),
            Frequency::Monthly => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
            Frequency::Monthly => "monthly",
        }
    }
}

/// One weekday/time pair of a recurrence
///
/// `weekday` counts from Sunday (0) to Saturday (6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeeklySlot {
    pub weekday: u8,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
}

impl WeeklySlot {
    pub fn new(weekday: u8, time: NaiveTime) -> Self {
        Self { weekday, time }
    }

    /// Parse `"HH:MM"` for the time of day
    pub fn parse(weekday: u8, time: &str) -> Result<Self> {
        let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
            .map_err(|_| Error::Validation(format!("Slot time must be HH:MM, got {:?}", time)))?;
        let slot = Self { weekday, time };
        slot.validate()?;
        Ok(slot)
    }

    pub fn validate(&self) -> Result<()> {
        if self.weekday > 6 {
            return Err(Error::Validation(format!(
                "Slot weekday must be 0 (Sunday) through 6 (Saturday), got {}",
                self.weekday
            )));
        }
        Ok(())
    }

    /// Days after Sunday
    pub fn days_from_sunday(&self) -> i64 {
        i64::from(self.weekday)
    }

    /// chrono weekday for this slot
    pub fn chrono_weekday(&self) -> Weekday {
        match self.weekday {
            0 => Weekday::Sun,
            1 => Weekday::Mon,
            2 => Weekday::Tue,
            3 => Weekday::Wed,
            4 => Weekday::Thu,
            5 => Weekday::Fri,
            _ => Weekday::Sat,
        }
    }
}

/// A student's recurring lesson configuration
///
/// Replacing a student's recurrence is always a full replace; there is no
/// merge of slot lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub frequency: Frequency,
    /// Inclusive lower bound for every generated lesson
    pub start_date: NaiveDate,
    pub slots: Vec<WeeklySlot>,
}

impl Recurrence {
    pub fn new(frequency: Frequency, start_date: NaiveDate, slots: Vec<WeeklySlot>) -> Self {
        Self {
            frequency,
            start_date,
            slots,
        }
    }

    pub fn has_slots(&self) -> bool {
        !self.slots.is_empty()
    }

    /// The recurrence to expand for a student with this `active` flag
    ///
    /// Inactive students and empty slot lists generate nothing.
    pub fn schedulable(recurrence: Option<&Recurrence>, active: bool) -> Option<&Recurrence> {
        recurrence.filter(|r| active && r.has_slots())
    }

    /// Check every slot is well formed
    pub fn validate(&self) -> Result<()> {
        self.slots.iter().try_for_each(WeeklySlot::validate)
    }

    /// Validation applied when a student is saved as active with this
    /// recurrence: an empty slot list would silently schedule nothing.
    pub fn validate_for_activation(&self) -> Result<()> {
        if self.slots.is_empty() {
            return Err(Error::Validation(
                "Active recurrence needs at least one weekday/time slot".to_string(),
            ));
        }
        self.validate()
    }
}

/// Serde helper storing `NaiveTime` as `"HH:MM"`
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&text, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&text, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}
