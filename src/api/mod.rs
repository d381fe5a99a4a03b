use axum::Json;
use axum::extract::{Path, Query};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{delete, patch, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::{Local, Utc};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::db::repository;
use crate::error::AppError;
use crate::feed::{self, CalendarLinks, FEED_PATH, FeedOptions};
use crate::models::*;
use crate::services::assignments;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
struct SessionQueryParams {
    #[serde(default)]
    session_id: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", get(list_courses).post(create_course))
        .route("/assignments", get(list_assignments).post(create_assignment))
        .route("/assignments/{id}", delete(delete_assignment))
        .route("/assignments/{id}/complete", patch(complete_assignment))
        .route("/assignments/{id}/uncomplete", patch(uncomplete_assignment))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/links", get(session_links))
        .route(FEED_PATH, get(calendar_feed))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<Course>>, AppError> {
    let courses = repository::fetch_courses(&state.db).await?;
    Ok(Json(courses))
}

async fn create_course(
    State(state): State<AppState>,
    Json(req): Json<NewCourseRequest>
) -> Result<(StatusCode, Json<Course>), AppError> {
    let course = assignments::create_course(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn list_assignments(
    State(state): State<AppState>,
    Query(params): Query<SessionQueryParams>
) -> Result<Json<Vec<AssignmentView>>, AppError> {
    let entries =
        assignments::list_assignments(&state.db, params.session_id.as_deref(), Utc::now()).await?;
    Ok(Json(entries))
}

async fn create_assignment(
    State(state): State<AppState>,
    Json(req): Json<NewAssignmentRequest>
) -> Result<(StatusCode, Json<AssignmentWithCourse>), AppError> {
    let created = assignments::create_assignment(&state.db, req, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_assignment(
    State(state): State<AppState>,
    Path(id): Path<i64>
) -> Result<StatusCode, AppError> {
    assignments::delete_assignment(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn complete_assignment(
    State(state): State<AppState>,
    Path(id): Path<i64>
) -> Result<Json<AssignmentWithCourse>, AppError> {
    let updated = assignments::set_completed(&state.db, id, true, Utc::now()).await?;
    Ok(Json(updated))
}

async fn uncomplete_assignment(
    State(state): State<AppState>,
    Path(id): Path<i64>
) -> Result<Json<AssignmentWithCourse>, AppError> {
    let updated = assignments::set_completed(&state.db, id, false, Utc::now()).await?;
    Ok(Json(updated))
}

async fn create_session(
    State(state): State<AppState>
) -> Result<(StatusCode, Json<Session>), AppError> {
    let session = assignments::create_session(&state.db, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> Result<Json<SessionWithAssignments>, AppError> {
    let session = assignments::get_session(&state.db, &id, Utc::now()).await?;
    Ok(Json(session))
}

async fn session_links(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> Result<Json<CalendarLinks>, AppError> {
    let session = repository::find_session(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    let links = CalendarLinks::new(&state.config.public_base_url, Some(&session.id));
    Ok(Json(links))
}

async fn calendar_feed(
    State(state): State<AppState>,
    Query(params): Query<SessionQueryParams>
) -> Result<impl IntoResponse, AppError> {
    let session_id = params.session_id.as_deref();
    if let Some(id) = session_id {
        repository::find_session(&state.db, id)
            .await?
            .ok_or(AppError::NotFound)?;
    }

    let entries = repository::fetch_assignments(&state.db, session_id).await?;
    debug!("building calendar feed for {} assignments (session: {:?})", entries.len(), session_id);

    let options = FeedOptions::from_config(&state.config);
    let document = feed::build_feed(&entries, &options, &Local)?;

    Ok(([(header::CONTENT_TYPE, feed::CONTENT_TYPE)], document))
}
