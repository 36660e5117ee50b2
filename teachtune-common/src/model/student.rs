//! Students

use super::Recurrence;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub instrument: String,
    /// Monthly fee in cents
    pub monthly_fee_cents: i64,
    pub active: bool,
    pub recurrence: Option<Recurrence>,
}

impl Student {
    /// Recurrence to expand, if the student is active and has slots
    pub fn schedulable_recurrence(&self) -> Option<&Recurrence> {
        Recurrence::schedulable(self.recurrence.as_ref(), self.active)
    }

    /// Checks run before any save
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("Student name must not be empty".to_string()));
        }
        if self.monthly_fee_cents < 0 {
            return Err(Error::Validation(format!(
                "Monthly fee must not be negative, got {}",
                self.monthly_fee_cents
            )));
        }
        match (&self.recurrence, self.active) {
            (Some(recurrence), true) => recurrence.validate_for_activation(),
            (Some(recurrence), false) => recurrence.validate(),
            (None, _) => Ok(()),
        }
    }
}

/// Fields supplied when registering or editing a student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentDraft {
    pub name: String,
    pub instrument: String,
    pub monthly_fee_cents: i64,
    pub active: bool,
    pub recurrence: Option<Recurrence>,
}

impl StudentDraft {
    pub fn into_student(self, id: Uuid) -> Student {
        Student {
            id,
            name: self.name.trim().to_string(),
            instrument: self.instrument.trim().to_string(),
            monthly_fee_cents: self.monthly_fee_cents,
            active: self.active,
            recurrence: self.recurrence,
        }
    }
}
