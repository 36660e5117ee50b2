//! Schedule store abstraction
//!
//! Every store is bound to one teacher: students and lessons outside that
//! teacher's scope behave exactly like missing rows.

use crate::schedule::ReconciliationPlan;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use teachtune_common::model::LessonRecord;
use teachtune_common::{Lesson, Result, Student};
use uuid::Uuid;

/// Lesson joined with its student's display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgendaEntry {
    pub lesson: Lesson,
    pub student_name: Option<String>,
}

/// Student row write performed together with a reconciliation
#[derive(Debug, Clone, Copy)]
pub enum StudentSave<'a> {
    Create(&'a Student),
    Update(&'a Student),
}

impl StudentSave<'_> {
    pub fn student(&self) -> &Student {
        match self {
            StudentSave::Create(student) | StudentSave::Update(student) => student,
        }
    }
}

/// Persistent lesson and student storage
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Teacher every query is scoped to
    fn teacher_id(&self) -> Uuid;

    async fn insert_student(&self, student: &Student) -> Result<()>;

    /// Fails with `NotFound` when the student is not in scope
    async fn update_student(&self, student: &Student) -> Result<()>;

    async fn find_student(&self, id: Uuid) -> Result<Option<Student>>;

    /// Students ordered by name
    async fn list_students(&self) -> Result<Vec<Student>>;

    /// Write the student row and apply `plan` in one transaction
    ///
    /// Returns the number of purged lessons.
    async fn save_student(&self, save: StudentSave<'_>, plan: &ReconciliationPlan) -> Result<u64>;

    async fn insert_lesson(&self, lesson: &Lesson) -> Result<()>;

    /// All-or-nothing batch insert
    async fn insert_many(&self, lessons: &[Lesson]) -> Result<()>;

    async fn find_lesson(&self, id: Uuid) -> Result<Option<Lesson>>;

    /// Replace attendance, notes and repertoire; returns the stored lesson
    async fn update_lesson(
        &self,
        id: Uuid,
        record: &LessonRecord,
        updated_at: DateTime<Utc>,
    ) -> Result<Lesson>;

    async fn delete_lesson(&self, id: Uuid) -> Result<()>;

    /// Delete lessons with `auto_generated` set and `scheduled_at > now`
    async fn delete_future_auto_generated(&self, student_id: Uuid, now: DateTime<Utc>)
        -> Result<u64>;

    /// Purge and insert for one student in one transaction
    ///
    /// Returns the number of purged lessons.
    async fn apply_reconciliation(&self, plan: &ReconciliationPlan) -> Result<u64>;

    /// Lessons with `start <= scheduled_at <= end`, ascending
    async fn list_by_date_range(&self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<Vec<Lesson>>;

    /// A student's lessons, newest first
    async fn list_by_student(&self, student_id: Uuid) -> Result<Vec<Lesson>>;

    /// Same window as [`ScheduleStore::list_by_date_range`], with student names
    async fn list_agenda(&self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<Vec<AgendaEntry>>;
}
