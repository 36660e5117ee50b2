//! Identifier helpers

use crate::{Error, Result};
use uuid::Uuid;

/// Well-known id of the teacher created on first database initialization
pub const DEFAULT_TEACHER_ID: Uuid = Uuid::from_u128(1);

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse a UUID stored in a database column
///
/// A malformed value means the row was written by something other than
/// this crate, so it surfaces as an internal error naming the column.
pub fn parse_column(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("{} holds invalid UUID {:?}: {}", column, value, e)))
}
