//! Domain models shared by the scheduling services

mod lesson;
mod recurrence;
mod student;

pub use lesson::{Attendance, Lesson, LessonRecord};
pub use recurrence::{Frequency, Recurrence, WeeklySlot};
pub use student::{Student, StudentDraft};
