//! Audit views and the diff recorded by row writes

use axum::http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::*;

async fn edit_row_seven(app: &TestApp) {
    let (status, body) = app
        .as_user(
            EDITOR_D2,
            Method::PUT,
            &format!("/api/files/{}/rows/7", INVENTORY),
            Some(json!({ "values": { "name": "Widget XL", "qty": "5", "bin": "A3" } })),
        )
        .await;
    assert_success(status, &body);
}

fn fields(entries: &Value) -> Vec<(String, String, String)> {
    entries
        .as_array()
        .expect("entries")
        .iter()
        .map(|entry| {
            (
                entry["field"].as_str().unwrap_or_default().to_string(),
                entry["old_value"].as_str().unwrap_or_default().to_string(),
                entry["new_value"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_row_history_lists_changed_fields() {
    let app = TestApp::new().await;
    edit_row_seven(&app).await;
    app.wait_for_audit(2).await;

    let (status, body) = app
        .as_user(ADMIN, Method::GET, "/api/audit/row/7", None)
        .await;
    let entries = assert_success(status, &body);
    let mut changes = fields(&entries);
    changes.sort();
    assert_eq!(
        changes,
        vec![
            ("bin".to_string(), String::new(), "A3".to_string()),
            ("name".to_string(), "Widget".to_string(), "Widget XL".to_string()),
        ]
    );
    for entry in entries.as_array().expect("entries") {
        assert_eq!(entry["action"], "UPDATE");
        assert_eq!(entry["actor_id"], EDITOR_D2);
        assert_eq!(entry["file_id"], INVENTORY);
    }
}

#[tokio::test]
async fn test_unchanged_write_records_nothing() {
    let app = TestApp::new().await;
    let (status, body) = app
        .as_user(
            EDITOR_D2,
            Method::PUT,
            &format!("/api/files/{}/rows/8", INVENTORY),
            Some(json!({ "values": { "name": "Gadget", "qty": "2" } })),
        )
        .await;
    assert_success(status, &body);

    // Any entry from the no-op update would be appended before this one.
    app.as_user(
        EDITOR_D2,
        Method::POST,
        &format!("/api/files/{}/rows", INVENTORY),
        Some(json!({ "values": { "name": "Marker" } })),
    )
    .await;
    let entries = app.wait_for_audit(1).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].row_id.map(|id| id > 8), Some(true));
}

#[tokio::test]
async fn test_recent_activity_limit() {
    let app = TestApp::new().await;
    edit_row_seven(&app).await;
    app.wait_for_audit(2).await;

    let (status, body) = app
        .as_user(ADMIN, Method::GET, "/api/audit/recent?limit=1", None)
        .await;
    let entries = assert_success(status, &body);
    assert_eq!(entries.as_array().map(Vec::len), Some(1));

    let (status, body) = app
        .as_user(ADMIN, Method::GET, "/api/audit/recent", None)
        .await;
    let entries = assert_success(status, &body);
    assert_eq!(entries.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_audit_views_are_admin_only() {
    let app = TestApp::new().await;
    for user_id in [EDITOR_D2, USER_D2, VIEWER_D2] {
        let (status, body) = app
            .as_user(user_id, Method::GET, "/api/audit/recent", None)
            .await;
        assert_forbidden(status, &body, "admin-required");

        let (status, body) = app
            .as_user(user_id, Method::GET, "/api/audit/file/10", None)
            .await;
        assert_forbidden(status, &body, "admin-required");
    }
}

#[tokio::test]
async fn test_unknown_entity_type() {
    let app = TestApp::new().await;
    let (status, body) = app
        .as_user(ADMIN, Method::GET, "/api/audit/widget/1", None)
        .await;
    assert_error(status, &body, StatusCode::BAD_REQUEST, "BAD_REQUEST");
}

#[tokio::test]
async fn test_history_read_failure_is_server_error() {
    let app = TestApp::with_failing_audit().await;
    let (status, body) = app
        .as_user(ADMIN, Method::GET, "/api/audit/recent", None)
        .await;
    assert_error(status, &body, StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERROR");
    assert_eq!(body["error"]["message"], "Internal server error");
}
