use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{AssignmentWithCourse, Course, NewAssignmentRequest, NewCourseRequest, Session};

const SELECT_ASSIGNMENTS: &str = r#"
    SELECT
        a.id, a.title, a.url, a.due_date, a.course_code, a.session_id,
        a.completed, a.created_at, a.updated_at,
        c.code, c.name
    FROM assignments a
    JOIN courses c ON c.code = a.course_code
"#;

pub async fn fetch_courses(db: &SqlitePool) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>("SELECT code, name FROM courses ORDER BY code ASC")
        .fetch_all(db)
        .await
}

pub async fn find_course(db: &SqlitePool, code: &str) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>("SELECT code, name FROM courses WHERE code = ?")
        .bind(code)
        .fetch_optional(db)
        .await
}

pub async fn insert_course(db: &SqlitePool, req: NewCourseRequest) -> Result<Course, sqlx::Error> {
    sqlx::query("INSERT INTO courses (code, name) VALUES (?1, ?2)")
        .bind(&req.code)
        .bind(&req.name)
        .execute(db)
        .await?;

    Ok(Course {
        code: req.code,
        name: req.name,
    })
}

pub async fn insert_session(db: &SqlitePool, now: DateTime<Utc>) -> Result<Session, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query("INSERT INTO sessions (id, created_at) VALUES (?1, ?2)")
        .bind(&id)
        .bind(now)
        .execute(db)
        .await?;

    Ok(Session { id, created_at: now })
}

pub async fn find_session(db: &SqlitePool, id: &str) -> Result<Option<Session>, sqlx::Error> {
    sqlx::query_as::<_, Session>("SELECT id, created_at FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Assignments ordered by due date, optionally limited to one session.
pub async fn fetch_assignments(
    db: &SqlitePool,
    session_id: Option<&str>,
) -> Result<Vec<AssignmentWithCourse>, sqlx::Error> {
    let sql = format!(
        "{} WHERE (?1 IS NULL OR a.session_id = ?1) ORDER BY a.due_date ASC, a.id ASC",
        SELECT_ASSIGNMENTS
    );

    sqlx::query_as::<_, AssignmentWithCourse>(&sql)
        .bind(session_id)
        .fetch_all(db)
        .await
}

pub async fn find_assignment(
    db: &SqlitePool,
    id: i64,
) -> Result<Option<AssignmentWithCourse>, sqlx::Error> {
    let sql = format!("{} WHERE a.id = ?1", SELECT_ASSIGNMENTS);

    sqlx::query_as::<_, AssignmentWithCourse>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn insert_assignment(
    db: &SqlitePool,
    req: NewAssignmentRequest,
    now: DateTime<Utc>,
) -> Result<AssignmentWithCourse, sqlx::Error> {
    let id = sqlx::query(
        r#"
        INSERT INTO assignments
            (title, url, due_date, course_code, session_id,
            completed, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)
        "#,
    )
    .bind(&req.title)
    .bind(&req.url)
    .bind(req.due_date)
    .bind(&req.course_code)
    .bind(&req.session_id)
    .bind(now)
    .execute(db)
    .await?
    .last_insert_rowid();

    find_assignment(db, id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn delete_assignment(db: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM assignments WHERE id = ?1")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

pub async fn set_assignment_completed(
    db: &SqlitePool,
    id: i64,
    completed: bool,
    now: DateTime<Utc>,
) -> Result<Option<AssignmentWithCourse>, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE assignments
        SET completed = ?2,
            updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(completed)
    .bind(now)
    .execute(db)
    .await?
    .rows_affected();

    if result == 0 {
        return Ok(None);
    }

    find_assignment(db, id).await
}
