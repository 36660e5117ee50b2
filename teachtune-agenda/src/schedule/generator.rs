//! Instance generator
//!
//! Expands a [`Recurrence`] into concrete dated lessons over a fixed horizon.
//!
//! **Algorithm (weekly / biweekly):**
//! 1. Window is `[start_date 00:00, start_date + horizon months 00:00]`, both inclusive
//! 2. Anchor steps from `start_date` by the cycle length (7 or 14 days)
//! 3. Each slot lands on the Sunday of the anchor's week plus the slot weekday
//! 4. Candidates outside the window are dropped; the rest are sorted
//!
//! Monthly recurrences keep the ordinal weekday of `start_date` (2nd Tuesday
//! stays 2nd Tuesday). A 5th weekday that does not exist in a month falls
//! back to the 4th.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use teachtune_common::{ids, Error, Lesson, Recurrence, Result, SchedulingZone, WeeklySlot};
use tracing::debug;
use uuid::Uuid;

/// Default generation horizon in months
pub const DEFAULT_HORIZON_MONTHS: u32 = 6;

/// Pure recurrence expander
#[derive(Debug, Clone)]
pub struct InstanceGenerator {
    horizon_months: u32,
    zone: SchedulingZone,
}

impl Default for InstanceGenerator {
    fn default() -> Self {
        Self {
            horizon_months: DEFAULT_HORIZON_MONTHS,
            zone: SchedulingZone::Local,
        }
    }
}

impl InstanceGenerator {
    pub fn new(horizon_months: u32, zone: SchedulingZone) -> Result<Self> {
        if horizon_months == 0 {
            return Err(Error::Validation(
                "Generation horizon must be at least one month".to_string(),
            ));
        }
        Ok(Self {
            horizon_months,
            zone,
        })
    }

    pub fn horizon_months(&self) -> u32 {
        self.horizon_months
    }

    pub fn zone(&self) -> &SchedulingZone {
        &self.zone
    }

    /// Wall-clock times of every instance, ascending
    ///
    /// Empty slot lists produce nothing. Slots with an out-of-range weekday
    /// are rejected rather than skipped.
    pub fn expand(&self, recurrence: &Recurrence) -> Result<Vec<NaiveDateTime>> {
        recurrence.validate()?;
        if !recurrence.has_slots() {
            return Ok(Vec::new());
        }

        let start_date = recurrence.start_date;
        let limit_date = start_date
            .checked_add_months(Months::new(self.horizon_months))
            .ok_or_else(|| {
                Error::Validation(format!("Start date {} is too far in the future", start_date))
            })?;
        let window = (start_date.and_time(NaiveTime::MIN), limit_date.and_time(NaiveTime::MIN));

        let mut instances = match recurrence.frequency.cycle_days() {
            Some(step) => expand_stepped(&recurrence.slots, start_date, limit_date, step, window),
            None => expand_monthly(&recurrence.slots, start_date, limit_date, window),
        };

        instances.sort();
        Ok(instances)
    }

    /// Lessons for one generation run
    ///
    /// Every lesson shares one fresh recurrence group id, is Pending, and
    /// carries `auto_generated = true`. Output is ordered by `scheduled_at`.
    pub fn generate(
        &self,
        student_id: Uuid,
        recurrence: &Recurrence,
        generated_at: chrono::DateTime<Utc>,
    ) -> Result<Vec<Lesson>> {
        let group_id = ids::generate();
        let mut lessons: Vec<Lesson> = self
            .expand(recurrence)?
            .into_iter()
            .map(|local| Lesson::generated(student_id, self.zone.to_utc(local), group_id, generated_at))
            .collect();

        // Zone conversion can move gap times by an hour
        lessons.sort_by_key(|lesson| lesson.scheduled_at);

        debug!(
            "Generated {} {} lessons for student {} (group {})",
            lessons.len(),
            recurrence.frequency.as_str(),
            student_id,
            group_id
        );
        Ok(lessons)
    }
}

fn in_window(at: NaiveDateTime, (start, limit): (NaiveDateTime, NaiveDateTime)) -> bool {
    at >= start && at <= limit
}

fn expand_stepped(
    slots: &[WeeklySlot],
    start_date: NaiveDate,
    limit_date: NaiveDate,
    step: i64,
    window: (NaiveDateTime, NaiveDateTime),
) -> Vec<NaiveDateTime> {
    let mut instances = Vec::new();
    let mut anchor = start_date;

    while anchor <= limit_date {
        let week_start = anchor - Duration::days(i64::from(anchor.weekday().num_days_from_sunday()));
        for slot in slots {
            let at = (week_start + Duration::days(slot.days_from_sunday())).and_time(slot.time);
            if in_window(at, window) {
                instances.push(at);
            }
        }

        match anchor.checked_add_signed(Duration::days(step)) {
            Some(next) => anchor = next,
            None => break,
        }
    }

    instances
}

fn expand_monthly(
    slots: &[WeeklySlot],
    start_date: NaiveDate,
    limit_date: NaiveDate,
    window: (NaiveDateTime, NaiveDateTime),
) -> Vec<NaiveDateTime> {
    let ordinal = (start_date.day0() / 7 + 1) as u8;
    let mut instances = Vec::new();

    for k in 0u32.. {
        let Some(anchor) = start_date.checked_add_months(Months::new(k)) else {
            break;
        };
        if anchor > limit_date {
            break;
        }

        for slot in slots {
            let Some(date) =
                nth_weekday_of_month(anchor.year(), anchor.month(), slot.chrono_weekday(), ordinal)
            else {
                continue;
            };
            let at = date.and_time(slot.time);
            if in_window(at, window) {
                instances.push(at);
            }
        }
    }

    instances
}

/// `n`th `weekday` of the month, or the 4th when the month has no `n`th
fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
        .or_else(|| NaiveDate::from_weekday_of_month_opt(year, month, weekday, 4))
}

#[cfg(test)]
mod tests {
    use super::*;
    use teachtune_common::Frequency;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_zero_horizon_rejected() {
        assert!(matches!(
            InstanceGenerator::new(0, SchedulingZone::utc()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_nth_weekday_falls_back_to_fourth() {
        // February 2023 has four Thursdays, February 2024 has five
        assert_eq!(nth_weekday_of_month(2023, 2, Weekday::Thu, 5), Some(date(2023, 2, 23)));
        assert_eq!(nth_weekday_of_month(2024, 2, Weekday::Thu, 5), Some(date(2024, 2, 29)));
    }

    #[test]
    fn test_monthly_keeps_ordinal_weekday() {
        // 2024-01-09 is the 2nd Tuesday of January
        let generator = InstanceGenerator::new(3, SchedulingZone::utc()).unwrap();
        let recurrence = Recurrence::new(
            Frequency::Monthly,
            date(2024, 1, 9),
            vec![WeeklySlot::parse(2, "18:00").unwrap()],
        );

        let dates: Vec<NaiveDate> = generator
            .expand(&recurrence)
            .unwrap()
            .into_iter()
            .map(|t| t.date())
            .collect();
        assert_eq!(
            dates,
            vec![date(2024, 1, 9), date(2024, 2, 13), date(2024, 3, 12)]
        );
    }

    #[test]
    fn test_stepped_week_start_is_sunday() {
        // Anchor on a Wednesday: Monday slot of that week is before the start
        let generator = InstanceGenerator::new(1, SchedulingZone::utc()).unwrap();
        let recurrence = Recurrence::new(
            Frequency::Weekly,
            date(2024, 3, 6),
            vec![WeeklySlot::parse(1, "10:00").unwrap()],
        );

        let first = generator.expand(&recurrence).unwrap()[0];
        assert_eq!(first.date(), date(2024, 3, 11));
    }
}
