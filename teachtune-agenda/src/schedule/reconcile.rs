//! Reconciliation policy
//!
//! Rebuilds a student's future schedule after any save:
//! - auto-generated lessons strictly after `now` are purged
//! - past lessons and manual bookings are never touched
//! - a fresh generation run is inserted when the student is active and has slots
//!
//! Purge and insert run in one store transaction. Generation happens before
//! the transaction opens, so a generation error leaves the store untouched.

use crate::db::{ScheduleStore, StudentSave};
use crate::schedule::InstanceGenerator;
use chrono::{DateTime, Utc};
use serde::Serialize;
use teachtune_common::{Lesson, Recurrence, Result, Student};
use tracing::info;
use uuid::Uuid;

/// Purge-and-replace work for one student, computed before touching the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub student_id: Uuid,
    /// Auto-generated lessons strictly after this instant are purged
    pub cutoff: DateTime<Utc>,
    /// Replacement lessons, all strictly after `cutoff`
    pub lessons: Vec<Lesson>,
    pub recurrence_group_id: Option<Uuid>,
}

impl ReconciliationPlan {
    /// Plan that purges without regenerating
    pub fn purge_only(student_id: Uuid, cutoff: DateTime<Utc>) -> Self {
        Self {
            student_id,
            cutoff,
            lessons: Vec::new(),
            recurrence_group_id: None,
        }
    }
}

/// Result of an applied reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub removed: u64,
    pub created: usize,
    pub recurrence_group_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct ReconciliationPolicy {
    generator: InstanceGenerator,
}

impl ReconciliationPolicy {
    pub fn new(generator: InstanceGenerator) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &InstanceGenerator {
        &self.generator
    }

    /// Compute the plan for a student's new state
    ///
    /// Generated instances at or before `now` are dropped; only instances a
    /// later reconciliation can purge are ever inserted.
    pub fn plan(
        &self,
        student_id: Uuid,
        active: bool,
        recurrence: Option<&Recurrence>,
        now: DateTime<Utc>,
    ) -> Result<ReconciliationPlan> {
        self.plan_schedule(student_id, Recurrence::schedulable(recurrence, active), now)
    }

    pub fn plan_for(&self, student: &Student, now: DateTime<Utc>) -> Result<ReconciliationPlan> {
        self.plan_schedule(student.id, student.schedulable_recurrence(), now)
    }

    fn plan_schedule(
        &self,
        student_id: Uuid,
        schedulable: Option<&Recurrence>,
        now: DateTime<Utc>,
    ) -> Result<ReconciliationPlan> {
        let Some(recurrence) = schedulable else {
            return Ok(ReconciliationPlan::purge_only(student_id, now));
        };

        let lessons: Vec<Lesson> = self
            .generator
            .generate(student_id, recurrence, now)?
            .into_iter()
            .filter(|lesson| lesson.is_purgeable_at(now))
            .collect();
        let recurrence_group_id = lessons.first().and_then(|l| l.recurrence_group_id);

        Ok(ReconciliationPlan {
            student_id,
            cutoff: now,
            lessons,
            recurrence_group_id,
        })
    }

    /// Reconcile a student whose row is already stored
    pub async fn reconcile(
        &self,
        store: &dyn ScheduleStore,
        student_id: Uuid,
        active: bool,
        recurrence: Option<&Recurrence>,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome> {
        let plan = self.plan(student_id, active, recurrence, now)?;
        let removed = store.apply_reconciliation(&plan).await?;
        Ok(log_outcome(&plan, removed))
    }

    /// Save the student row and reconcile in one transaction
    pub async fn save_and_reconcile(
        &self,
        store: &dyn ScheduleStore,
        save: StudentSave<'_>,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome> {
        let plan = self.plan_for(save.student(), now)?;
        let removed = store.save_student(save, &plan).await?;
        Ok(log_outcome(&plan, removed))
    }
}

fn log_outcome(plan: &ReconciliationPlan, removed: u64) -> ReconcileOutcome {
    info!(
        "Reconciled student {}: removed {} future lessons, created {}",
        plan.student_id,
        removed,
        plan.lessons.len()
    );

    ReconcileOutcome {
        removed,
        created: plan.lessons.len(),
        recurrence_group_id: plan.recurrence_group_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use teachtune_common::{Frequency, SchedulingZone, WeeklySlot};

    fn policy() -> ReconciliationPolicy {
        ReconciliationPolicy::new(InstanceGenerator::new(1, SchedulingZone::utc()).unwrap())
    }

    fn weekly_monday() -> Recurrence {
        Recurrence::new(
            Frequency::Weekly,
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            vec![WeeklySlot::parse(1, "14:00").unwrap()],
        )
    }

    #[test]
    fn test_plan_inactive_purges_only() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let plan = policy().plan(Uuid::new_v4(), false, Some(&weekly_monday()), now).unwrap();
        assert!(plan.lessons.is_empty());
        assert!(plan.recurrence_group_id.is_none());
        assert_eq!(plan.cutoff, now);
    }

    #[test]
    fn test_plan_drops_instances_not_after_now() {
        // Mar 4, 11, 18, 25, Apr 1 generated; now sits on the Mar 11 lesson
        let now = Utc.with_ymd_and_hms(2024, 3, 11, 14, 0, 0).unwrap();
        let plan = policy().plan(Uuid::new_v4(), true, Some(&weekly_monday()), now).unwrap();

        assert_eq!(plan.lessons.len(), 3);
        assert!(plan.lessons.iter().all(|l| l.scheduled_at > now));
        assert!(plan
            .lessons
            .iter()
            .all(|l| l.recurrence_group_id == plan.recurrence_group_id));
    }

    #[test]
    fn test_plan_propagates_validation_error() {
        let mut recurrence = weekly_monday();
        recurrence.slots[0].weekday = 8;
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert!(policy().plan(Uuid::new_v4(), true, Some(&recurrence), now).is_err());
    }

    #[test]
    fn test_plan_for_generates_only_for_schedulable_students() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut student = Student {
            id: Uuid::new_v4(),
            name: "Ana".into(),
            instrument: "Piano".into(),
            monthly_fee_cents: 20_000,
            active: true,
            recurrence: Some(weekly_monday()),
        };
        assert_eq!(policy().plan_for(&student, now).unwrap().lessons.len(), 5);

        student.active = false;
        assert!(policy().plan_for(&student, now).unwrap().lessons.is_empty());

        student.active = true;
        student.recurrence = Some(Recurrence::new(Frequency::Weekly, weekly_monday().start_date, Vec::new()));
        let plan = policy().plan_for(&student, now).unwrap();
        assert_eq!(plan, ReconciliationPlan::purge_only(student.id, now));
    }
}
