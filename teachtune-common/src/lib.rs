//! # TeachTune Common Library
//!
//! Shared code for the TeachTune scheduling services including:
//! - Student, recurrence and lesson models
//! - Database initialization and runtime settings
//! - Event types (TtEvent enum) and the EventBus
//! - Configuration loading
//! - Clock and scheduling time zone abstractions

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod ids;
pub mod model;
pub mod time;

pub use error::{Error, Result};
pub use model::{Attendance, Frequency, Lesson, Recurrence, Student, WeeklySlot};
pub use time::{Clock, ManualClock, SchedulingZone, SystemClock};
