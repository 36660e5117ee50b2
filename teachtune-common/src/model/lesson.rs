//! Lesson instances

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Attendance of a lesson; `Pending` until the teacher marks it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attendance {
    Present,
    Absent,
    #[default]
    Pending,
}

impl Attendance {
    /// Column encoding: 1 present, 0 absent, NULL pending
    pub fn to_column(self) -> Option<i64> {
        match self {
            Attendance::Present => Some(1),
            Attendance::Absent => Some(0),
            Attendance::Pending => None,
        }
    }

    pub fn from_column(value: Option<i64>) -> Self {
        match value {
            Some(0) => Attendance::Absent,
            Some(_) => Attendance::Present,
            None => Attendance::Pending,
        }
    }

    pub fn is_pending(self) -> bool {
        self == Attendance::Pending
    }
}

/// One concrete, dated lesson
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: Uuid,
    pub student_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub attendance: Attendance,
    pub notes: String,
    /// Pieces worked on, in the order they were entered
    pub repertoire: Vec<String>,
    /// Set only for lessons produced by the instance generator
    pub auto_generated: bool,
    /// Shared by every lesson of one generation run
    pub recurrence_group_id: Option<Uuid>,
}

impl Lesson {
    /// Manually booked lesson
    pub fn booked(
        student_id: Uuid,
        scheduled_at: DateTime<Utc>,
        notes: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: crate::ids::generate(),
            student_id,
            scheduled_at,
            updated_at: now,
            attendance: Attendance::Pending,
            notes,
            repertoire: Vec::new(),
            auto_generated: false,
            recurrence_group_id: None,
        }
    }

    /// Lesson produced by a generation run
    pub fn generated(
        student_id: Uuid,
        scheduled_at: DateTime<Utc>,
        recurrence_group_id: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: crate::ids::generate(),
            student_id,
            scheduled_at,
            updated_at: now,
            attendance: Attendance::Pending,
            notes: String::new(),
            repertoire: Vec::new(),
            auto_generated: true,
            recurrence_group_id: Some(recurrence_group_id),
        }
    }

    /// Whether reconciliation at `now` is allowed to purge this lesson
    pub fn is_purgeable_at(&self, now: DateTime<Utc>) -> bool {
        self.auto_generated && self.scheduled_at > now
    }
}

/// Mutable per-lesson record kept by the teacher
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LessonRecord {
    pub attendance: Attendance,
    pub notes: String,
    pub repertoire: Vec<String>,
}
