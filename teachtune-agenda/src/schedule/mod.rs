//! Recurrence expansion and schedule reconciliation

pub mod generator;
pub mod reconcile;

pub use generator::{InstanceGenerator, DEFAULT_HORIZON_MONTHS};
pub use reconcile::{ReconcileOutcome, ReconciliationPlan, ReconciliationPolicy};
