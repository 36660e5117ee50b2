//! teachtune-agenda library - lesson scheduling and upcoming-lesson alerts
//!
//! - [`schedule`]: recurrence expansion and reconciliation
//! - [`db`]: teacher-scoped schedule store
//! - [`monitor`]: upcoming-lesson monitor and its background runner
//! - [`services`]: student, lesson and dashboard operations

use std::sync::Arc;
use teachtune_common::db::RuntimeSettings;
use teachtune_common::events::EventBus;
use teachtune_common::{Clock, Result, SchedulingZone};

pub mod db;
pub mod monitor;
pub mod schedule;
pub mod services;

use db::ScheduleStore;
use schedule::{InstanceGenerator, ReconciliationPolicy};

/// Event bus buffer per subscriber
pub const EVENT_BUS_CAPACITY: usize = 256;

/// State shared by every service
#[derive(Clone)]
pub struct AgendaContext {
    pub store: Arc<dyn ScheduleStore>,
    pub clock: Arc<dyn Clock>,
    pub zone: SchedulingZone,
    pub events: EventBus,
    pub settings: RuntimeSettings,
}

impl AgendaContext {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        clock: Arc<dyn Clock>,
        zone: SchedulingZone,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            store,
            clock,
            zone,
            events: EventBus::new(EVENT_BUS_CAPACITY),
            settings,
        }
    }

    /// Reconciliation policy configured from the runtime settings
    pub fn policy(&self) -> Result<ReconciliationPolicy> {
        let generator = InstanceGenerator::new(self.settings.horizon_months, self.zone)?;
        Ok(ReconciliationPolicy::new(generator))
    }
}
