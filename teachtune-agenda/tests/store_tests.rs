//! SQLite schedule store

mod helpers;

use helpers::*;
use teachtune_agenda::db::{ScheduleStore, SqliteScheduleStore};
use teachtune_common::db::{init_database, init_memory_database};
use teachtune_common::ids::DEFAULT_TEACHER_ID;
use teachtune_common::model::LessonRecord;
use teachtune_common::{Attendance, Error, Lesson};
use uuid::Uuid;

#[tokio::test]
async fn test_open_unknown_teacher_fails() {
    let pool = init_memory_database().await.unwrap();
    let result = SqliteScheduleStore::open(pool, Uuid::new_v4()).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_student_roundtrip_with_recurrence() {
    let store = memory_store().await;
    let ana = student("Ana", true, Some(monday_afternoons()));

    store.insert_student(&ana).await.unwrap();
    let found = store.find_student(ana.id).await.unwrap();

    assert_eq!(found, Some(ana));
}

#[tokio::test]
async fn test_students_listed_by_name() {
    let store = memory_store().await;
    for name in ["carla", "Bruno", "Ana"] {
        store.insert_student(&student(name, false, None)).await.unwrap();
    }

    let names: Vec<String> = store
        .list_students()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["Ana", "Bruno", "carla"]);
}

#[tokio::test]
async fn test_update_unknown_student_is_not_found() {
    let store = memory_store().await;
    let ghost = student("Ghost", false, None);
    assert!(matches!(store.update_student(&ghost).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_lesson_roundtrip() {
    let store = memory_store().await;
    let ana = student("Ana", true, None);
    store.insert_student(&ana).await.unwrap();

    let mut lesson = Lesson::booked(ana.id, utc(2024, 3, 4, 14, 0), "bring metronome".into(), utc(2024, 3, 1, 9, 0));
    lesson.repertoire = vec!["Clair de Lune".into(), "Gymnopédie No. 1".into()];
    store.insert_lesson(&lesson).await.unwrap();

    assert_eq!(store.find_lesson(lesson.id).await.unwrap(), Some(lesson));
}

#[tokio::test]
async fn test_insert_lesson_for_unknown_student_is_not_found() {
    let store = memory_store().await;
    let lesson = Lesson::booked(Uuid::new_v4(), utc(2024, 3, 4, 14, 0), String::new(), utc(2024, 3, 1, 9, 0));
    assert!(matches!(store.insert_lesson(&lesson).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_update_lesson_record() {
    let store = memory_store().await;
    let ana = student("Ana", true, None);
    store.insert_student(&ana).await.unwrap();
    let lesson = Lesson::booked(ana.id, utc(2024, 3, 4, 14, 0), String::new(), utc(2024, 3, 1, 9, 0));
    store.insert_lesson(&lesson).await.unwrap();

    let record = LessonRecord {
        attendance: Attendance::Absent,
        notes: "sick".into(),
        repertoire: vec!["Minuet in G".into()],
    };
    let updated = store
        .update_lesson(lesson.id, &record, utc(2024, 3, 4, 15, 0))
        .await
        .unwrap();

    assert_eq!(updated.attendance, Attendance::Absent);
    assert_eq!(updated.notes, "sick");
    assert_eq!(updated.repertoire, vec!["Minuet in G".to_string()]);
    assert_eq!(updated.updated_at, utc(2024, 3, 4, 15, 0));
    assert_eq!(updated.scheduled_at, lesson.scheduled_at);

    // Back to pending clears the attendance column
    let cleared = store
        .update_lesson(lesson.id, &LessonRecord::default(), utc(2024, 3, 4, 16, 0))
        .await
        .unwrap();
    assert_eq!(cleared.attendance, Attendance::Pending);
}

#[tokio::test]
async fn test_update_and_delete_unknown_lesson() {
    let store = memory_store().await;
    let id = Uuid::new_v4();

    let update = store.update_lesson(id, &LessonRecord::default(), utc(2024, 3, 4, 15, 0)).await;
    assert!(matches!(update, Err(Error::NotFound(_))));
    assert!(matches!(store.delete_lesson(id).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_delete_lesson_once() {
    let store = memory_store().await;
    let ana = student("Ana", true, None);
    store.insert_student(&ana).await.unwrap();
    let lesson = Lesson::booked(ana.id, utc(2024, 3, 4, 14, 0), String::new(), utc(2024, 3, 1, 9, 0));
    store.insert_lesson(&lesson).await.unwrap();

    store.delete_lesson(lesson.id).await.unwrap();
    assert_eq!(store.find_lesson(lesson.id).await.unwrap(), None);
    assert!(matches!(store.delete_lesson(lesson.id).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_date_range_is_inclusive_and_ascending() {
    let store = memory_store().await;
    let ana = student("Ana", true, None);
    store.insert_student(&ana).await.unwrap();

    let created = utc(2024, 3, 1, 9, 0);
    let times = [utc(2024, 3, 6, 10, 0), utc(2024, 3, 4, 10, 0), utc(2024, 3, 5, 10, 0), utc(2024, 3, 7, 10, 0)];
    for at in times {
        store
            .insert_lesson(&Lesson::booked(ana.id, at, String::new(), created))
            .await
            .unwrap();
    }

    let lessons = store
        .list_by_date_range(utc(2024, 3, 4, 10, 0), utc(2024, 3, 6, 10, 0))
        .await
        .unwrap();
    let got: Vec<_> = lessons.iter().map(|l| l.scheduled_at).collect();
    assert_eq!(
        got,
        vec![utc(2024, 3, 4, 10, 0), utc(2024, 3, 5, 10, 0), utc(2024, 3, 6, 10, 0)]
    );

    let agenda = store
        .list_agenda(utc(2024, 3, 7, 0, 0), utc(2024, 3, 8, 0, 0))
        .await
        .unwrap();
    assert_eq!(agenda.len(), 1);
    assert_eq!(agenda[0].student_name.as_deref(), Some("Ana"));
}

#[tokio::test]
async fn test_list_by_student_newest_first() {
    let store = memory_store().await;
    let ana = student("Ana", true, None);
    let bruno = student("Bruno", true, None);
    store.insert_student(&ana).await.unwrap();
    store.insert_student(&bruno).await.unwrap();

    let created = utc(2024, 3, 1, 9, 0);
    for day in [4, 11, 18] {
        store
            .insert_lesson(&Lesson::booked(ana.id, utc(2024, 3, day, 14, 0), String::new(), created))
            .await
            .unwrap();
    }
    store
        .insert_lesson(&Lesson::booked(bruno.id, utc(2024, 3, 5, 14, 0), String::new(), created))
        .await
        .unwrap();

    let days: Vec<_> = store
        .list_by_student(ana.id)
        .await
        .unwrap()
        .iter()
        .map(|l| l.scheduled_at)
        .collect();
    assert_eq!(
        days,
        vec![utc(2024, 3, 18, 14, 0), utc(2024, 3, 11, 14, 0), utc(2024, 3, 4, 14, 0)]
    );
}

#[tokio::test]
async fn test_insert_many_is_all_or_nothing() {
    let store = memory_store().await;
    let ana = student("Ana", true, None);
    store.insert_student(&ana).await.unwrap();

    let created = utc(2024, 3, 1, 9, 0);
    let good = Lesson::booked(ana.id, utc(2024, 3, 4, 14, 0), String::new(), created);
    let orphan = Lesson::booked(Uuid::new_v4(), utc(2024, 3, 5, 14, 0), String::new(), created);

    let result = store.insert_many(&[good.clone(), orphan]).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
    assert_eq!(store.find_lesson(good.id).await.unwrap(), None);

    store.insert_many(&[good.clone()]).await.unwrap();
    assert!(store.find_lesson(good.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_future_auto_generated_scope() {
    let store = memory_store().await;
    let ana = student("Ana", true, None);
    store.insert_student(&ana).await.unwrap();

    let now = utc(2024, 3, 10, 12, 0);
    let group = Uuid::new_v4();
    let past_auto = Lesson::generated(ana.id, utc(2024, 3, 4, 14, 0), group, now);
    let at_now_auto = Lesson::generated(ana.id, now, group, now);
    let future_auto = Lesson::generated(ana.id, utc(2024, 3, 11, 14, 0), group, now);
    let future_manual = Lesson::booked(ana.id, utc(2024, 3, 12, 14, 0), String::new(), now);
    store
        .insert_many(&[past_auto.clone(), at_now_auto.clone(), future_auto.clone(), future_manual.clone()])
        .await
        .unwrap();

    let removed = store.delete_future_auto_generated(ana.id, now).await.unwrap();
    assert_eq!(removed, 1);
    assert!(store.find_lesson(future_auto.id).await.unwrap().is_none());
    for kept in [&past_auto, &at_now_auto, &future_manual] {
        assert!(store.find_lesson(kept.id).await.unwrap().is_some());
    }

    let unknown = store.delete_future_auto_generated(Uuid::new_v4(), now).await;
    assert!(matches!(unknown, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_other_teacher_cannot_see_rows() {
    let pool = init_memory_database().await.unwrap();
    let other_teacher = Uuid::new_v4();
    sqlx::query("INSERT INTO teachers (guid, name) VALUES (?, 'Other')")
        .bind(other_teacher.to_string())
        .execute(&pool)
        .await
        .unwrap();

    let mine = SqliteScheduleStore::open(pool.clone(), DEFAULT_TEACHER_ID).await.unwrap();
    let theirs = SqliteScheduleStore::open(pool, other_teacher).await.unwrap();

    let ana = student("Ana", true, None);
    mine.insert_student(&ana).await.unwrap();
    let lesson = Lesson::booked(ana.id, utc(2024, 3, 4, 14, 0), String::new(), utc(2024, 3, 1, 9, 0));
    mine.insert_lesson(&lesson).await.unwrap();

    assert!(theirs.find_student(ana.id).await.unwrap().is_none());
    assert!(theirs.list_students().await.unwrap().is_empty());
    assert!(theirs.find_lesson(lesson.id).await.unwrap().is_none());
    assert!(theirs
        .list_agenda(utc(2024, 3, 1, 0, 0), utc(2024, 3, 31, 0, 0))
        .await
        .unwrap()
        .is_empty());
    assert!(matches!(theirs.delete_lesson(lesson.id).await, Err(Error::NotFound(_))));
    assert!(matches!(theirs.update_student(&ana).await, Err(Error::NotFound(_))));
    assert!(matches!(theirs.insert_lesson(&lesson).await, Err(Error::NotFound(_))));

    // Untouched for the owner
    assert!(mine.find_lesson(lesson.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_lessons_persist_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("teachtune.db");
    let ana = student("Ana", true, Some(monday_afternoons()));
    let lesson = Lesson::booked(ana.id, utc(2024, 3, 4, 14, 0), "first lesson".into(), utc(2024, 3, 1, 9, 0));

    {
        let pool = init_database(&db_path).await.unwrap();
        let store = SqliteScheduleStore::open(pool.clone(), DEFAULT_TEACHER_ID).await.unwrap();
        store.insert_student(&ana).await.unwrap();
        store.insert_lesson(&lesson).await.unwrap();
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    let store = SqliteScheduleStore::open(pool, DEFAULT_TEACHER_ID).await.unwrap();
    assert_eq!(store.find_student(ana.id).await.unwrap(), Some(ana));
    assert_eq!(store.find_lesson(lesson.id).await.unwrap(), Some(lesson));
}
