use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tower::ServiceExt;

use duetrack::api::router;
use duetrack::config::AppConfig;
use duetrack::db::{connect_in_memory, repository};
use duetrack::models::{NewAssignmentRequest, NewCourseRequest};
use duetrack::state::AppState;

async fn setup_app_with_db(vars: &[(&str, &str)]) -> (Router, SqlitePool) {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let config = AppConfig::from_lookup(|key| vars.get(key).cloned()).expect("Failed to load config");
    let db = connect_in_memory().await.expect("Failed to create database");

    let app = router(AppState {
        db: db.clone(),
        config: Arc::new(config),
    });
    (app, db)
}

async fn setup_app(vars: &[(&str, &str)]) -> Router {
    setup_app_with_db(vars).await.0
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("Failed to build request");

    let response = app.clone().oneshot(request).await.expect("Request failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Response is not JSON")
    };
    (status, value)
}

async fn feed(app: &Router, uri: &str) -> String {
    let (status, bytes) = send(app, "GET", uri, None).await;
    assert_eq!(status, StatusCode::OK);
    String::from_utf8(bytes).expect("Feed is not UTF-8")
}

async fn create_course(app: &Router, code: &str) {
    let (status, _) = send_json(
        app,
        "POST",
        "/courses",
        Some(json!({ "code": code, "name": "Software Design" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

fn due_in_days(days: i64) -> String {
    (Utc::now() + Duration::days(days)).to_rfc3339()
}

#[tokio::test]
async fn test_health() {
    let app = setup_app(&[]).await;
    let (status, _) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_course_listing_and_validation() {
    let app = setup_app(&[]).await;
    create_course(&app, "SE3").await;
    create_course(&app, "CS2").await;

    let (status, courses) = send_json(&app, "GET", "/courses", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(courses[0]["code"], "CS2");
    assert_eq!(courses[1]["code"], "SE3");

    let (status, body) = send_json(
        &app,
        "POST",
        "/courses",
        Some(json!({ "code": "X", "name": "Too short code" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Course code must be at least 2 characters");

    let (status, _) = send_json(
        &app,
        "POST",
        "/courses",
        Some(json!({ "code": "CS2", "name": "Duplicate" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_create_list_and_delete_assignment() {
    let app = setup_app(&[]).await;
    create_course(&app, "SE3").await;

    let (status, created) = send_json(
        &app,
        "POST",
        "/assignments",
        Some(json!({
            "title": "Design doc",
            "url": "https://lms.example.com/a/1",
            "due_date": due_in_days(10),
            "course_code": "SE3",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().expect("id should be a number");
    assert_eq!(created["course"]["code"], "SE3");
    assert_eq!(created["completed"], false);

    let (status, listed) = send_json(&app, "GET", "/assignments", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["title"], "Design doc");
    assert_eq!(listed[0]["countdown"]["urgency"], "safe");

    let document = feed(&app, "/calendar").await;
    assert_eq!(document.matches("BEGIN:VEVENT").count(), 1);
    assert!(document.contains(&format!("UID:X{}\r\n", id)));
    assert!(document.contains("SUMMARY:SE3 - Design doc\r\n"));

    let (status, _) = send(&app, "DELETE", &format!("/assignments/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, listed) = send_json(&app, "GET", "/assignments", None).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(0));
    let document = feed(&app, "/calendar").await;
    assert!(!document.contains("BEGIN:VEVENT"));

    let (status, _) = send(&app, "DELETE", &format!("/assignments/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_past_due_date_is_rejected_and_not_exported() {
    let app = setup_app(&[]).await;
    create_course(&app, "SE3").await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/assignments",
        Some(json!({
            "title": "Already late",
            "due_date": due_in_days(-1),
            "course_code": "SE3",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Due date must be in the future");

    let document = feed(&app, "/calendar").await;
    assert!(!document.contains("BEGIN:VEVENT"));
}

#[tokio::test]
async fn test_complete_and_uncomplete() {
    let app = setup_app(&[]).await;
    create_course(&app, "SE3").await;

    let (_, created) = send_json(
        &app,
        "POST",
        "/assignments",
        Some(json!({ "title": "Quiz prep", "due_date": due_in_days(2), "course_code": "SE3" })),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    let (status, updated) =
        send_json(&app, "PATCH", &format!("/assignments/{}/complete", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["completed"], true);

    let (status, updated) =
        send_json(&app, "PATCH", &format!("/assignments/{}/uncomplete", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["completed"], false);

    let (status, _) = send(&app, "PATCH", "/assignments/4040/complete", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_scoped_feed_and_links() {
    let app = setup_app(&[
        ("PUBLIC_BASE_URL", "https://due.example.com"),
        ("SITE_URL", "https://due.example.com"),
    ])
    .await;
    create_course(&app, "SE3").await;

    let (status, session) = send_json(&app, "POST", "/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = session["id"].as_str().unwrap().to_string();

    for (title, session) in [("Mine", Some(session_id.as_str())), ("Someone else's", None)] {
        let (status, _) = send_json(
            &app,
            "POST",
            "/assignments",
            Some(json!({
                "title": title,
                "due_date": due_in_days(4),
                "course_code": "SE3",
                "session_id": session,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, loaded) = send_json(&app, "GET", &format!("/sessions/{}", session_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["assignments"].as_array().map(Vec::len), Some(1));
    assert_eq!(loaded["assignments"][0]["title"], "Mine");

    let scoped = feed(&app, &format!("/calendar?session_id={}", session_id)).await;
    assert_eq!(scoped.matches("BEGIN:VEVENT").count(), 1);
    assert!(scoped.contains("SUMMARY:SE3 - Mine\r\n"));
    assert!(scoped.contains("X-ORIGINAL-URL:https://due.example.com\r\n"));

    let everything = feed(&app, "/calendar").await;
    assert_eq!(everything.matches("BEGIN:VEVENT").count(), 2);

    let (status, links) =
        send_json(&app, "GET", &format!("/sessions/{}/links", session_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        links["subscribe"],
        format!("webcal://due.example.com/calendar?session_id={}", session_id)
    );
    assert_eq!(
        links["download"],
        format!("https://due.example.com/calendar?session_id={}", session_id)
    );

    let (status, _) = send(&app, "GET", "/calendar?session_id=unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", "/sessions/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_feed_headers_and_missing_site_url() {
    let app = setup_app(&[("CALENDAR_NAME", "Spring Term")]).await;

    let request = Request::builder()
        .uri("/calendar")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/calendar; charset=utf-8"
    );

    let document = feed(&app, "/calendar").await;
    assert!(document.contains("X-WR-CALNAME:Spring Term\r\n"));
    assert!(!document.contains("X-ORIGINAL-URL"));
}

#[tokio::test]
async fn test_control_characters_rejected_on_create() {
    let app = setup_app(&[]).await;
    create_course(&app, "SE3").await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/assignments",
        Some(json!({ "title": "Lab\r one", "due_date": due_in_days(3), "course_code": "SE3" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Title must not contain control characters");

    let (status, _) = send_json(
        &app,
        "POST",
        "/courses",
        Some(json!({ "code": "CS\u{1b}9", "name": "Escapes" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let document = feed(&app, "/calendar").await;
    assert!(!document.contains("BEGIN:VEVENT"));
}

#[tokio::test]
async fn test_line_feed_and_tab_titles_still_export() {
    let app = setup_app(&[]).await;
    create_course(&app, "SE3").await;

    for title in ["Part one\npart two", "Lab\tone"] {
        let (status, created) = send_json(
            &app,
            "POST",
            "/assignments",
            Some(json!({ "title": title, "due_date": due_in_days(3), "course_code": "SE3" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["title"], title);
    }

    let document = feed(&app, "/calendar").await;
    assert_eq!(document.matches("BEGIN:VEVENT").count(), 2);
    assert!(document.contains("CATEGORIES:event\r\n"));
}

#[tokio::test]
async fn test_unencodable_stored_record_fails_feed_with_json_error() {
    let (app, db) = setup_app_with_db(&[]).await;
    repository::insert_course(
        &db,
        NewCourseRequest {
            code: "SE3".to_string(),
            name: "Software Design".to_string(),
        },
    )
    .await
    .expect("Failed to insert course");
    repository::insert_assignment(
        &db,
        NewAssignmentRequest {
            title: "Bad\rtitle".to_string(),
            url: None,
            due_date: Utc::now() + Duration::days(2),
            course_code: "SE3".to_string(),
            session_id: None,
        },
        Utc::now(),
    )
    .await
    .expect("Failed to insert assignment");

    let request = Request::builder()
        .uri("/calendar")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let content_type = response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("application/json"), "{}", content_type);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(!body.contains("BEGIN:VCALENDAR"));
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["message"], "calendar feed could not be built");
}
