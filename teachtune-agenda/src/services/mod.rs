//! Teacher-facing operations built on the schedule store

pub mod dashboard;
pub mod lessons;
pub mod students;

pub use dashboard::{DashboardService, DashboardSummary};
pub use lessons::LessonService;
pub use students::StudentService;
