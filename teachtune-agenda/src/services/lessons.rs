//! Manual bookings, lesson records, agenda and history

use crate::db::AgendaEntry;
use crate::AgendaContext;
use chrono::{DateTime, Duration, Utc};
use teachtune_common::db::settings::MAX_AGENDA_DAYS;
use teachtune_common::events::TtEvent;
use teachtune_common::model::LessonRecord;
use teachtune_common::time::parse_lesson_time;
use teachtune_common::{Error, Lesson, Result};
use tracing::info;
use uuid::Uuid;

pub struct LessonService {
    ctx: AgendaContext,
}

impl LessonService {
    pub fn new(ctx: AgendaContext) -> Self {
        Self { ctx }
    }

    /// Book one lesson from teacher input such as `"2024-03-04T14:30"`
    pub async fn book(&self, student_id: Uuid, when: &str, notes: &str) -> Result<Lesson> {
        let scheduled_at = parse_lesson_time(when, &self.ctx.zone)?;
        self.book_at(student_id, scheduled_at, notes).await
    }

    pub async fn book_at(
        &self,
        student_id: Uuid,
        scheduled_at: DateTime<Utc>,
        notes: &str,
    ) -> Result<Lesson> {
        let now = self.ctx.clock.now();
        let lesson = Lesson::booked(student_id, scheduled_at, notes.trim().to_string(), now);
        self.ctx.store.insert_lesson(&lesson).await?;

        info!("Booked lesson {} for student {} at {}", lesson.id, student_id, scheduled_at);
        self.ctx.events.emit_lossy(TtEvent::LessonBooked {
            lesson_id: lesson.id,
            student_id,
            scheduled_at,
            timestamp: now,
        });
        Ok(lesson)
    }

    /// Replace attendance, notes and repertoire of one lesson
    pub async fn update(&self, id: Uuid, record: LessonRecord) -> Result<Lesson> {
        let record = LessonRecord {
            attendance: record.attendance,
            notes: record.notes.trim().to_string(),
            repertoire: record
                .repertoire
                .into_iter()
                .map(|piece| piece.trim().to_string())
                .filter(|piece| !piece.is_empty())
                .collect(),
        };

        let now = self.ctx.clock.now();
        let lesson = self.ctx.store.update_lesson(id, &record, now).await?;

        self.ctx.events.emit_lossy(TtEvent::LessonUpdated {
            lesson_id: id,
            attendance: lesson.attendance,
            timestamp: now,
        });
        Ok(lesson)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.ctx.store.delete_lesson(id).await?;

        info!("Deleted lesson {}", id);
        self.ctx.events.emit_lossy(TtEvent::LessonDeleted {
            lesson_id: id,
            timestamp: self.ctx.clock.now(),
        });
        Ok(())
    }

    /// Lessons in `[start, end]`
    ///
    /// `start` defaults to today's local midnight, `end` to
    /// `agenda_default_days` after `start`.
    pub async fn agenda(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<AgendaEntry>> {
        let start = start.unwrap_or_else(|| self.today_start());
        let end = match end {
            Some(end) => end,
            None => days_after(start, self.ctx.settings.agenda_default_days)?,
        };
        if end < start {
            return Err(Error::InvalidInput(format!(
                "Agenda end {} is before start {}",
                end, start
            )));
        }

        self.ctx.store.list_agenda(start, end).await
    }

    /// Lessons from today's local midnight through `days` days later
    pub async fn upcoming_days(&self, days: i64) -> Result<Vec<AgendaEntry>> {
        if !(1..=MAX_AGENDA_DAYS).contains(&days) {
            return Err(Error::InvalidInput(format!(
                "Agenda length must be between 1 and {} days, got {}",
                MAX_AGENDA_DAYS, days
            )));
        }

        let start = self.today_start();
        self.agenda(Some(start), Some(days_after(start, days)?)).await
    }

    /// Past lessons of one student, newest first
    pub async fn history(&self, student_id: Uuid) -> Result<Vec<Lesson>> {
        if self.ctx.store.find_student(student_id).await?.is_none() {
            return Err(Error::NotFound(format!("Student {}", student_id)));
        }

        let now = self.ctx.clock.now();
        Ok(self
            .ctx
            .store
            .list_by_student(student_id)
            .await?
            .into_iter()
            .filter(|lesson| lesson.scheduled_at < now)
            .collect())
    }

    fn today_start(&self) -> DateTime<Utc> {
        let today = self.ctx.zone.local_date(self.ctx.clock.now());
        self.ctx.zone.start_of_day(today)
    }
}

fn days_after(start: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    Duration::try_days(days)
        .and_then(|span| start.checked_add_signed(span))
        .ok_or_else(|| Error::InvalidInput(format!("Agenda length of {} days is out of range", days)))
}
