//! Shared fixtures for teachtune-agenda integration tests

#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use teachtune_agenda::db::{AgendaEntry, ScheduleStore, SqliteScheduleStore};
use teachtune_agenda::AgendaContext;
use teachtune_common::db::{init_memory_database, RuntimeSettings};
use teachtune_common::ids::DEFAULT_TEACHER_ID;
use teachtune_common::model::StudentDraft;
use teachtune_common::{
    Frequency, Lesson, ManualClock, Recurrence, SchedulingZone, Student, WeeklySlot,
};
use uuid::Uuid;

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn recurrence(frequency: Frequency, start: NaiveDate, slots: &[(u8, &str)]) -> Recurrence {
    Recurrence::new(
        frequency,
        start,
        slots
            .iter()
            .map(|(weekday, time)| WeeklySlot::parse(*weekday, time).unwrap())
            .collect(),
    )
}

/// Weekly Mondays at 14:00 from 2024-03-04
pub fn monday_afternoons() -> Recurrence {
    recurrence(Frequency::Weekly, date(2024, 3, 4), &[(1, "14:00")])
}

pub fn draft(name: &str, active: bool, recurrence: Option<Recurrence>) -> StudentDraft {
    StudentDraft {
        name: name.to_string(),
        instrument: "Piano".to_string(),
        monthly_fee_cents: 20_000,
        active,
        recurrence,
    }
}

pub fn student(name: &str, active: bool, recurrence: Option<Recurrence>) -> Student {
    draft(name, active, recurrence).into_student(Uuid::new_v4())
}

pub async fn memory_store() -> Arc<SqliteScheduleStore> {
    let pool = init_memory_database().await.unwrap();
    Arc::new(SqliteScheduleStore::open(pool, DEFAULT_TEACHER_ID).await.unwrap())
}

/// Settings with a one-month horizon to keep fixtures small
pub fn short_horizon_settings() -> RuntimeSettings {
    RuntimeSettings {
        horizon_months: 1,
        ..RuntimeSettings::default()
    }
}

/// Context on an in-memory store with a manual clock in UTC
pub async fn context(now: DateTime<Utc>) -> (AgendaContext, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now));
    let store: Arc<dyn ScheduleStore> = memory_store().await;
    let ctx = AgendaContext::new(
        store,
        clock.clone(),
        SchedulingZone::utc(),
        short_horizon_settings(),
    );
    (ctx, clock)
}

pub fn entry(lesson: Lesson, name: &str) -> AgendaEntry {
    AgendaEntry {
        lesson,
        student_name: Some(name.to_string()),
    }
}
