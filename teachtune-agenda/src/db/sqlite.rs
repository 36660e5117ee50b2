//! SQLite-backed schedule store

use super::rows;
use super::store::{AgendaEntry, ScheduleStore, StudentSave};
use crate::schedule::ReconciliationPlan;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use teachtune_common::model::LessonRecord;
use teachtune_common::{Error, Lesson, Result, Student};
use tracing::{debug, warn};
use uuid::Uuid;

/// Schedule store scoped to one teacher
#[derive(Clone)]
pub struct SqliteScheduleStore {
    pool: SqlitePool,
    teacher_id: Uuid,
}

impl SqliteScheduleStore {
    /// Open the store for `teacher_id`; the teacher must exist
    pub async fn open(pool: SqlitePool, teacher_id: Uuid) -> Result<Self> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM teachers WHERE guid = ?")
            .bind(teacher_id.to_string())
            .fetch_optional(&pool)
            .await?;

        if exists.is_none() {
            return Err(Error::NotFound(format!("Teacher {}", teacher_id)));
        }
        Ok(Self { pool, teacher_id })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run `plan` on an open transaction, committing on success
    async fn commit_plan(
        &self,
        mut tx: Transaction<'static, Sqlite>,
        plan: &ReconciliationPlan,
        save: Option<StudentSave<'_>>,
    ) -> Result<u64> {
        let applied = apply_plan(&mut tx, self.teacher_id, plan, save).await;

        match applied {
            Ok(removed) => {
                tx.commit()
                    .await
                    .map_err(|e| Error::Transaction(format!("commit: {}", e)))?;
                Ok(removed)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!("Rollback failed for student {}: {}", plan.student_id, rollback);
                }
                Err(match e {
                    Error::Database(db) => Error::Transaction(db.to_string()),
                    other => other,
                })
            }
        }
    }
}

async fn apply_plan(
    conn: &mut SqliteConnection,
    teacher_id: Uuid,
    plan: &ReconciliationPlan,
    save: Option<StudentSave<'_>>,
) -> Result<u64> {
    match save {
        Some(StudentSave::Create(student)) => rows::insert_student(conn, teacher_id, student).await?,
        Some(StudentSave::Update(student)) => rows::update_student(conn, teacher_id, student).await?,
        None => rows::require_student(conn, teacher_id, plan.student_id).await?,
    }

    let removed = rows::delete_future_auto_generated(conn, plan.student_id, plan.cutoff).await?;

    for lesson in &plan.lessons {
        if lesson.student_id != plan.student_id {
            return Err(Error::Validation(format!(
                "Lesson {} belongs to student {}, not {}",
                lesson.id, lesson.student_id, plan.student_id
            )));
        }
        rows::insert_lesson(conn, lesson).await?;
    }

    debug!(
        "Applied plan for student {}: -{} +{}",
        plan.student_id,
        removed,
        plan.lessons.len()
    );
    Ok(removed)
}

#[async_trait]
impl ScheduleStore for SqliteScheduleStore {
    fn teacher_id(&self) -> Uuid {
        self.teacher_id
    }

    async fn insert_student(&self, student: &Student) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        rows::insert_student(&mut conn, self.teacher_id, student).await
    }

    async fn update_student(&self, student: &Student) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        rows::update_student(&mut conn, self.teacher_id, student).await
    }

    async fn find_student(&self, id: Uuid) -> Result<Option<Student>> {
        let mut conn = self.pool.acquire().await?;
        rows::find_student(&mut conn, self.teacher_id, id).await
    }

    async fn list_students(&self) -> Result<Vec<Student>> {
        let mut conn = self.pool.acquire().await?;
        rows::list_students(&mut conn, self.teacher_id).await
    }

    async fn save_student(&self, save: StudentSave<'_>, plan: &ReconciliationPlan) -> Result<u64> {
        if save.student().id != plan.student_id {
            return Err(Error::Validation(format!(
                "Plan for student {} cannot be saved with student {}",
                plan.student_id,
                save.student().id
            )));
        }
        let tx = self.pool.begin().await?;
        self.commit_plan(tx, plan, Some(save)).await
    }

    async fn insert_lesson(&self, lesson: &Lesson) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        rows::require_student(&mut conn, self.teacher_id, lesson.student_id).await?;
        rows::insert_lesson(&mut conn, lesson).await
    }

    async fn insert_many(&self, lessons: &[Lesson]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let inserted: Result<()> = async {
            let mut checked: Vec<Uuid> = Vec::new();
            for lesson in lessons {
                if !checked.contains(&lesson.student_id) {
                    rows::require_student(&mut tx, self.teacher_id, lesson.student_id).await?;
                    checked.push(lesson.student_id);
                }
                rows::insert_lesson(&mut tx, lesson).await?;
            }
            Ok(())
        }
        .await;

        match inserted {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!("Rollback of batch insert failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    async fn find_lesson(&self, id: Uuid) -> Result<Option<Lesson>> {
        let mut conn = self.pool.acquire().await?;
        rows::find_lesson(&mut conn, self.teacher_id, id).await
    }

    async fn update_lesson(
        &self,
        id: Uuid,
        record: &LessonRecord,
        updated_at: DateTime<Utc>,
    ) -> Result<Lesson> {
        let mut conn = self.pool.acquire().await?;
        rows::update_lesson_record(&mut conn, self.teacher_id, id, record, updated_at).await?;
        rows::find_lesson(&mut conn, self.teacher_id, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Lesson {}", id)))
    }

    async fn delete_lesson(&self, id: Uuid) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        rows::delete_lesson(&mut conn, self.teacher_id, id).await
    }

    async fn delete_future_auto_generated(
        &self,
        student_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        rows::require_student(&mut conn, self.teacher_id, student_id).await?;
        rows::delete_future_auto_generated(&mut conn, student_id, now).await
    }

    async fn apply_reconciliation(&self, plan: &ReconciliationPlan) -> Result<u64> {
        let tx = self.pool.begin().await?;
        self.commit_plan(tx, plan, None).await
    }

    async fn list_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Lesson>> {
        Ok(self
            .list_agenda(start, end)
            .await?
            .into_iter()
            .map(|entry| entry.lesson)
            .collect())
    }

    async fn list_by_student(&self, student_id: Uuid) -> Result<Vec<Lesson>> {
        let mut conn = self.pool.acquire().await?;
        rows::list_by_student(&mut conn, self.teacher_id, student_id).await
    }

    async fn list_agenda(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AgendaEntry>> {
        let mut conn = self.pool.acquire().await?;
        rows::list_by_date_range(&mut conn, self.teacher_id, start, end).await
    }
}
