use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::repository;
use crate::error::AppError;
use crate::feed::event::is_unencodable;
use crate::models::{
    AssignmentView, AssignmentWithCourse, Course, NewAssignmentRequest, NewCourseRequest, Session,
    SessionWithAssignments,
};
use crate::services::countdown::Countdown;

pub const MIN_TITLE_LEN: usize = 3;
pub const MIN_COURSE_CODE_LEN: usize = 2;
pub const MIN_COURSE_NAME_LEN: usize = 3;

fn reject(message: String) -> AppError {
    warn!("rejected input: {}", message);
    AppError::Validation(message)
}

fn require_min_len(field: &str, value: &str, min: usize) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(reject(format!("{} is required", field)));
    }
    if value.chars().count() < min {
        return Err(reject(format!("{} must be at least {} characters", field, min)));
    }
    if value.chars().any(is_unencodable) {
        return Err(reject(format!("{} must not contain control characters", field)));
    }
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

pub async fn create_course(db: &SqlitePool, req: NewCourseRequest) -> Result<Course, AppError> {
    let req = NewCourseRequest {
        code: req.code.trim().to_string(),
        name: req.name.trim().to_string(),
    };
    require_min_len("Course code", &req.code, MIN_COURSE_CODE_LEN)?;
    require_min_len("Course name", &req.name, MIN_COURSE_NAME_LEN)?;

    let code = req.code.clone();
    let course = repository::insert_course(db, req).await.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("course {} already exists", code))
        } else {
            AppError::Database(e)
        }
    })?;
    info!("created course {}", course.code);
    Ok(course)
}

pub async fn create_assignment(
    db: &SqlitePool,
    req: NewAssignmentRequest,
    now: DateTime<Utc>,
) -> Result<AssignmentWithCourse, AppError> {
    let req = NewAssignmentRequest {
        title: req.title.trim().to_string(),
        url: req
            .url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty()),
        due_date: req.due_date,
        course_code: req.course_code.trim().to_string(),
        session_id: req.session_id,
    };

    require_min_len("Title", &req.title, MIN_TITLE_LEN)?;
    if req.due_date <= now {
        return Err(reject("Due date must be in the future".to_string()));
    }
    if repository::find_course(db, &req.course_code).await?.is_none() {
        return Err(reject(format!("unknown course {}", req.course_code)));
    }
    if let Some(session_id) = req.session_id.as_deref() {
        if repository::find_session(db, session_id).await?.is_none() {
            return Err(AppError::NotFound);
        }
    }

    let created = repository::insert_assignment(db, req, now).await?;
    info!(
        "created assignment {} for {}",
        created.assignment.id, created.assignment.course_code
    );
    Ok(created)
}

pub async fn delete_assignment(db: &SqlitePool, id: i64) -> Result<(), AppError> {
    if repository::delete_assignment(db, id).await? {
        info!("deleted assignment {}", id);
        Ok(())
    } else {
        Err(AppError::NotFound)
    }
}

pub async fn set_completed(
    db: &SqlitePool,
    id: i64,
    completed: bool,
    now: DateTime<Utc>,
) -> Result<AssignmentWithCourse, AppError> {
    repository::set_assignment_completed(db, id, completed, now)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn list_assignments(
    db: &SqlitePool,
    session_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<AssignmentView>, AppError> {
    let entries = repository::fetch_assignments(db, session_id).await?;
    Ok(with_countdowns(entries, now))
}

pub async fn create_session(db: &SqlitePool, now: DateTime<Utc>) -> Result<Session, AppError> {
    let session = repository::insert_session(db, now).await?;
    info!("created session {}", session.id);
    Ok(session)
}

pub async fn get_session(
    db: &SqlitePool,
    id: &str,
    now: DateTime<Utc>,
) -> Result<SessionWithAssignments, AppError> {
    let session = repository::find_session(db, id)
        .await?
        .ok_or(AppError::NotFound)?;
    let entries = repository::fetch_assignments(db, Some(&session.id)).await?;

    Ok(SessionWithAssignments {
        session,
        assignments: with_countdowns(entries, now),
    })
}

fn with_countdowns(entries: Vec<AssignmentWithCourse>, now: DateTime<Utc>) -> Vec<AssignmentView> {
    entries
        .into_iter()
        .map(|entry| {
            let countdown = Countdown::between(entry.assignment.due_date, now);
            AssignmentView { entry, countdown }
        })
        .collect()
}
