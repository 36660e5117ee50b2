//! Supporting types for alert events

use serde::{Deserialize, Serialize};

/// Severity tag carried by every alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
        }
    }
}

/// Why a student's future schedule was rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileTrigger {
    /// Student registered
    Created,
    /// Student edited (any field, not only the recurrence)
    Updated,
}
