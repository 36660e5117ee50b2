//! Schedule persistence

mod rows;
pub mod sqlite;
pub mod store;

pub use sqlite::SqliteScheduleStore;
pub use store::{AgendaEntry, ScheduleStore, StudentSave};
