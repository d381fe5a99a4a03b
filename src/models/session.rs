use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::AssignmentView;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionWithAssignments {
    #[serde(flatten)]
    pub session: Session,
    pub assignments: Vec<AssignmentView>,
}
