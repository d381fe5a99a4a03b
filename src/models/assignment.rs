use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Course;
use crate::services::countdown::Countdown;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Assignment {
    pub id: i64,
    pub title: String,
    pub url: Option<String>,
    pub due_date: DateTime<Utc>,
    pub course_code: String,
    pub session_id: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An assignment joined with the course it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AssignmentWithCourse {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub assignment: Assignment,
    #[sqlx(flatten)]
    pub course: Course,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssignmentRequest {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    pub due_date: DateTime<Utc>,
    pub course_code: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// List entry handed to clients: the joined record plus its countdown at
/// the time the response was built.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentView {
    #[serde(flatten)]
    pub entry: AssignmentWithCourse,
    pub countdown: Countdown,
}
