//! Row-level SQL for students and lessons
//!
//! Helpers take a plain connection so the same statements run inside or
//! outside a transaction. Lesson timestamps are Unix milliseconds.

use super::store::AgendaEntry;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use teachtune_common::model::LessonRecord;
use teachtune_common::{ids, Attendance, Error, Lesson, Recurrence, Result, Student};
use uuid::Uuid;

pub(crate) const LESSON_COLUMNS: &str = "l.guid AS guid, l.student_id AS student_id, \
     l.scheduled_at AS scheduled_at, l.updated_at AS updated_at, l.attendance AS attendance, \
     l.notes AS notes, l.repertoire AS repertoire, l.auto_generated AS auto_generated, \
     l.recurrence_group_id AS recurrence_group_id";

const STUDENT_COLUMNS: &str =
    "guid, name, instrument, monthly_fee_cents, active, recurrence";

pub(crate) fn to_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

fn from_millis(column: &str, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| Error::Internal(format!("{} out of range: {}", column, millis)))
}

pub(crate) fn lesson_from_row(row: &SqliteRow) -> Result<Lesson> {
    let guid: String = row.try_get("guid")?;
    let student_id: String = row.try_get("student_id")?;
    let group: Option<String> = row.try_get("recurrence_group_id")?;
    let repertoire: String = row.try_get("repertoire")?;

    Ok(Lesson {
        id: ids::parse_column("lessons.guid", &guid)?,
        student_id: ids::parse_column("lessons.student_id", &student_id)?,
        scheduled_at: from_millis("lessons.scheduled_at", row.try_get("scheduled_at")?)?,
        updated_at: from_millis("lessons.updated_at", row.try_get("updated_at")?)?,
        attendance: Attendance::from_column(row.try_get("attendance")?),
        notes: row.try_get("notes")?,
        repertoire: serde_json::from_str(&repertoire)?,
        auto_generated: row.try_get("auto_generated")?,
        recurrence_group_id: group
            .map(|g| ids::parse_column("lessons.recurrence_group_id", &g))
            .transpose()?,
    })
}

pub(crate) fn agenda_entry_from_row(row: &SqliteRow) -> Result<AgendaEntry> {
    Ok(AgendaEntry {
        lesson: lesson_from_row(row)?,
        student_name: row.try_get("student_name")?,
    })
}

fn student_from_row(row: &SqliteRow) -> Result<Student> {
    let guid: String = row.try_get("guid")?;
    let recurrence: Option<String> = row.try_get("recurrence")?;

    Ok(Student {
        id: ids::parse_column("students.guid", &guid)?,
        name: row.try_get("name")?,
        instrument: row.try_get("instrument")?,
        monthly_fee_cents: row.try_get("monthly_fee_cents")?,
        active: row.try_get("active")?,
        recurrence: recurrence
            .map(|json| serde_json::from_str::<Recurrence>(&json))
            .transpose()?,
    })
}

/// Whether `student_id` belongs to `teacher_id`
pub(crate) async fn student_in_scope(
    conn: &mut SqliteConnection,
    teacher_id: Uuid,
    student_id: Uuid,
) -> Result<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM students WHERE guid = ? AND teacher_id = ?")
            .bind(student_id.to_string())
            .bind(teacher_id.to_string())
            .fetch_optional(&mut *conn)
            .await?;
    Ok(found.is_some())
}

pub(crate) async fn require_student(
    conn: &mut SqliteConnection,
    teacher_id: Uuid,
    student_id: Uuid,
) -> Result<()> {
    if student_in_scope(conn, teacher_id, student_id).await? {
        Ok(())
    } else {
        Err(Error::NotFound(format!("Student {}", student_id)))
    }
}

pub(crate) async fn insert_student(
    conn: &mut SqliteConnection,
    teacher_id: Uuid,
    student: &Student,
) -> Result<()> {
    let recurrence = student
        .recurrence
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO students (guid, teacher_id, name, instrument, monthly_fee_cents, active, recurrence)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(student.id.to_string())
    .bind(teacher_id.to_string())
    .bind(&student.name)
    .bind(&student.instrument)
    .bind(student.monthly_fee_cents)
    .bind(student.active)
    .bind(recurrence)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn update_student(
    conn: &mut SqliteConnection,
    teacher_id: Uuid,
    student: &Student,
) -> Result<()> {
    let recurrence = student
        .recurrence
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let result = sqlx::query(
        r#"
        UPDATE students
        SET name = ?, instrument = ?, monthly_fee_cents = ?, active = ?, recurrence = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE guid = ? AND teacher_id = ?
        "#,
    )
    .bind(&student.name)
    .bind(&student.instrument)
    .bind(student.monthly_fee_cents)
    .bind(student.active)
    .bind(recurrence)
    .bind(student.id.to_string())
    .bind(teacher_id.to_string())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Student {}", student.id)));
    }
    Ok(())
}

pub(crate) async fn find_student(
    conn: &mut SqliteConnection,
    teacher_id: Uuid,
    id: Uuid,
) -> Result<Option<Student>> {
    let sql = format!(
        "SELECT {} FROM students WHERE guid = ? AND teacher_id = ?",
        STUDENT_COLUMNS
    );
    sqlx::query(&sql)
        .bind(id.to_string())
        .bind(teacher_id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .as_ref()
        .map(student_from_row)
        .transpose()
}

pub(crate) async fn list_students(
    conn: &mut SqliteConnection,
    teacher_id: Uuid,
) -> Result<Vec<Student>> {
    let sql = format!(
        "SELECT {} FROM students WHERE teacher_id = ? ORDER BY name COLLATE NOCASE, guid",
        STUDENT_COLUMNS
    );
    sqlx::query(&sql)
        .bind(teacher_id.to_string())
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(student_from_row)
        .collect()
}

pub(crate) async fn insert_lesson(conn: &mut SqliteConnection, lesson: &Lesson) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO lessons (
            guid, student_id, scheduled_at, updated_at, attendance,
            notes, repertoire, auto_generated, recurrence_group_id
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(lesson.id.to_string())
    .bind(lesson.student_id.to_string())
    .bind(to_millis(lesson.scheduled_at))
    .bind(to_millis(lesson.updated_at))
    .bind(lesson.attendance.to_column())
    .bind(&lesson.notes)
    .bind(serde_json::to_string(&lesson.repertoire)?)
    .bind(lesson.auto_generated)
    .bind(lesson.recurrence_group_id.map(|g| g.to_string()))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn find_lesson(
    conn: &mut SqliteConnection,
    teacher_id: Uuid,
    id: Uuid,
) -> Result<Option<Lesson>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM lessons l
        JOIN students s ON s.guid = l.student_id
        WHERE l.guid = ? AND s.teacher_id = ?
        "#,
        LESSON_COLUMNS
    );
    sqlx::query(&sql)
        .bind(id.to_string())
        .bind(teacher_id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .as_ref()
        .map(lesson_from_row)
        .transpose()
}

pub(crate) async fn update_lesson_record(
    conn: &mut SqliteConnection,
    teacher_id: Uuid,
    id: Uuid,
    record: &LessonRecord,
    updated_at: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE lessons
        SET attendance = ?, notes = ?, repertoire = ?, updated_at = ?
        WHERE guid = ?
          AND student_id IN (SELECT guid FROM students WHERE teacher_id = ?)
        "#,
    )
    .bind(record.attendance.to_column())
    .bind(&record.notes)
    .bind(serde_json::to_string(&record.repertoire)?)
    .bind(to_millis(updated_at))
    .bind(id.to_string())
    .bind(teacher_id.to_string())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Lesson {}", id)));
    }
    Ok(())
}

pub(crate) async fn delete_lesson(
    conn: &mut SqliteConnection,
    teacher_id: Uuid,
    id: Uuid,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM lessons
        WHERE guid = ?
          AND student_id IN (SELECT guid FROM students WHERE teacher_id = ?)
        "#,
    )
    .bind(id.to_string())
    .bind(teacher_id.to_string())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Lesson {}", id)));
    }
    Ok(())
}

/// Purge step of reconciliation; caller has already checked scope
pub(crate) async fn delete_future_auto_generated(
    conn: &mut SqliteConnection,
    student_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM lessons WHERE student_id = ? AND auto_generated = 1 AND scheduled_at > ?",
    )
    .bind(student_id.to_string())
    .bind(to_millis(now))
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub(crate) async fn list_by_date_range(
    conn: &mut SqliteConnection,
    teacher_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<AgendaEntry>> {
    let sql = format!(
        r#"
        SELECT {}, s.name AS student_name
        FROM lessons l
        JOIN students s ON s.guid = l.student_id
        WHERE s.teacher_id = ? AND l.scheduled_at >= ? AND l.scheduled_at <= ?
        ORDER BY l.scheduled_at, l.guid
        "#,
        LESSON_COLUMNS
    );
    sqlx::query(&sql)
        .bind(teacher_id.to_string())
        .bind(to_millis(start))
        .bind(to_millis(end))
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(agenda_entry_from_row)
        .collect()
}

pub(crate) async fn list_by_student(
    conn: &mut SqliteConnection,
    teacher_id: Uuid,
    student_id: Uuid,
) -> Result<Vec<Lesson>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM lessons l
        JOIN students s ON s.guid = l.student_id
        WHERE l.student_id = ? AND s.teacher_id = ?
        ORDER BY l.scheduled_at DESC, l.guid
        "#,
        LESSON_COLUMNS
    );
    sqlx::query(&sql)
        .bind(student_id.to_string())
        .bind(teacher_id.to_string())
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(lesson_from_row)
        .collect()
}
