//! Student registration and editing
//!
//! Every save runs reconciliation, even when only the name or fee changed.
//! Edits made to future auto-generated lessons are lost on the next save.

use crate::db::StudentSave;
use crate::schedule::ReconcileOutcome;
use crate::AgendaContext;
use teachtune_common::events::{ReconcileTrigger, TtEvent};
use teachtune_common::model::StudentDraft;
use teachtune_common::{ids, Error, Result, Student};
use tracing::info;
use uuid::Uuid;

pub struct StudentService {
    ctx: AgendaContext,
}

impl StudentService {
    pub fn new(ctx: AgendaContext) -> Self {
        Self { ctx }
    }

    /// Register a student and generate its first schedule
    pub async fn register(&self, draft: StudentDraft) -> Result<(Student, ReconcileOutcome)> {
        let student = draft.into_student(ids::generate());
        let outcome = self.save(StudentSave::Create(&student)).await?;

        info!("Registered student {} ({})", student.name, student.id);
        Ok((student, outcome))
    }

    /// Replace a student's fields and rebuild the future schedule
    pub async fn edit(&self, id: Uuid, draft: StudentDraft) -> Result<(Student, ReconcileOutcome)> {
        let student = draft.into_student(id);
        let outcome = self.save(StudentSave::Update(&student)).await?;

        info!("Updated student {} ({})", student.name, student.id);
        Ok((student, outcome))
    }

    pub async fn list(&self) -> Result<Vec<Student>> {
        self.ctx.store.list_students().await
    }

    pub async fn find(&self, id: Uuid) -> Result<Student> {
        self.ctx
            .store
            .find_student(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Student {}", id)))
    }

    async fn save(&self, save: StudentSave<'_>) -> Result<ReconcileOutcome> {
        let student = save.student();
        student.validate()?;

        let now = self.ctx.clock.now();
        let policy = self.ctx.policy()?;
        let outcome = policy
            .save_and_reconcile(self.ctx.store.as_ref(), save, now)
            .await?;

        let trigger = match save {
            StudentSave::Create(_) => ReconcileTrigger::Created,
            StudentSave::Update(_) => ReconcileTrigger::Updated,
        };
        self.ctx.events.emit_lossy(TtEvent::StudentSaved {
            student_id: student.id,
            active: student.active,
            timestamp: now,
        });
        self.ctx.events.emit_lossy(TtEvent::ScheduleReconciled {
            student_id: student.id,
            trigger,
            removed: outcome.removed,
            created: outcome.created,
            recurrence_group_id: outcome.recurrence_group_id,
            timestamp: now,
        });

        Ok(outcome)
    }
}
