//! Dashboard summary

use crate::db::AgendaEntry;
use crate::AgendaContext;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use teachtune_common::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub date: NaiveDate,
    pub total_students: usize,
    pub active_students: usize,
    /// Sum of active students' monthly fees, in cents
    pub estimated_monthly_income_cents: i64,
    pub lessons_today: usize,
    pub pending_today: usize,
    /// Today's lessons, earliest first
    pub today: Vec<AgendaEntry>,
}

pub struct DashboardService {
    ctx: AgendaContext,
}

impl DashboardService {
    pub fn new(ctx: AgendaContext) -> Self {
        Self { ctx }
    }

    pub async fn summary(&self) -> Result<DashboardSummary> {
        let students = self.ctx.store.list_students().await?;
        let active: Vec<_> = students.iter().filter(|s| s.active).collect();

        let zone = &self.ctx.zone;
        let date = zone.local_date(self.ctx.clock.now());
        let start = zone.start_of_day(date);
        // Inclusive store range: stop one millisecond before the next midnight
        let end = zone.start_of_day(date + Duration::days(1)) - Duration::milliseconds(1);
        let today = self.ctx.store.list_agenda(start, end).await?;

        Ok(DashboardSummary {
            date,
            total_students: students.len(),
            active_students: active.len(),
            estimated_monthly_income_cents: active.iter().map(|s| s.monthly_fee_cents).sum(),
            lessons_today: today.len(),
            pending_today: today
                .iter()
                .filter(|entry| entry.lesson.attendance.is_pending())
                .count(),
            today,
        })
    }
}
