//! Explicit grants: who may manage them and what they widen

use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::common::*;
use stockroom::shared::{AuditAction, EntityType};

fn grants_uri() -> String {
    format!("/api/files/{}/grants", INVENTORY)
}

fn grant_uri(user_id: i64) -> String {
    format!("/api/files/{}/grants/{}", INVENTORY, user_id)
}

#[tokio::test]
async fn test_creator_manages_grants() {
    let app = TestApp::new().await;

    let (status, body) = app.as_user(USER_D2, Method::GET, &grants_uri(), None).await;
    assert_forbidden(status, &body, "insufficient-permission");

    let (status, body) = app
        .as_user(
            EDITOR_D2,
            Method::PUT,
            &grant_uri(USER_D2),
            Some(json!({ "level": "admin" })),
        )
        .await;
    let grant = assert_success(status, &body);
    assert_eq!(grant["user_id"], USER_D2);
    assert_eq!(grant["level"], "admin");
    assert_eq!(grant["granted_by"], EDITOR_D2);

    // The file-level admin grant opens grant management.
    let (status, body) = app.as_user(USER_D2, Method::GET, &grants_uri(), None).await;
    let grants = assert_success(status, &body);
    assert_eq!(grants.as_array().map(Vec::len), Some(1));

    let entries = app.wait_for_audit(1).await;
    assert_eq!(entries[0].action, AuditAction::Grant);
    assert_eq!(entries[0].entity_type, EntityType::Grant);
    assert_eq!(entries[0].entity_id, USER_D2);
    assert_eq!(entries[0].file_id, Some(INVENTORY));
}

#[tokio::test]
async fn test_revoke_removes_access() {
    let app = TestApp::new().await;
    app.as_user(
        EDITOR_D2,
        Method::PUT,
        &grant_uri(USER_D2),
        Some(json!({ "level": "admin" })),
    )
    .await;

    let (status, body) = app
        .as_user(EDITOR_D2, Method::DELETE, &grant_uri(USER_D2), None)
        .await;
    assert_eq!(assert_success(status, &body), json!(USER_D2));

    let (status, body) = app.as_user(USER_D2, Method::GET, &grants_uri(), None).await;
    assert_forbidden(status, &body, "insufficient-permission");

    let entries = app.wait_for_audit(2).await;
    assert_eq!(entries[1].action, AuditAction::Revoke);
}

#[tokio::test]
async fn test_grant_does_not_cross_departments() {
    let app = TestApp::new().await;
    let (status, body) = app
        .as_user(
            ADMIN,
            Method::PUT,
            &grant_uri(EDITOR_D1),
            Some(json!({ "level": "write" })),
        )
        .await;
    assert_success(status, &body);

    let (status, body) = app
        .as_user(
            EDITOR_D1,
            Method::GET,
            &format!("/api/files/{}/rows", INVENTORY),
            None,
        )
        .await;
    assert_forbidden(status, &body, "cross-department");
}

#[tokio::test]
async fn test_viewer_with_write_grant_still_read_only() {
    let app = TestApp::new().await;
    app.as_user(
        ADMIN,
        Method::PUT,
        &grant_uri(VIEWER_D2),
        Some(json!({ "level": "write" })),
    )
    .await;

    let (status, body) = app
        .as_user(
            VIEWER_D2,
            Method::PUT,
            &format!("/api/files/{}/rows/7", INVENTORY),
            Some(json!({ "values": { "qty": "0" } })),
        )
        .await;
    assert_forbidden(status, &body, "viewer-read-only");
}

#[tokio::test]
async fn test_grant_target_must_be_active() {
    let app = TestApp::new().await;
    for target in [RETIRED, 999] {
        let (status, body) = app
            .as_user(
                ADMIN,
                Method::PUT,
                &grant_uri(target),
                Some(json!({ "level": "read" })),
            )
            .await;
        assert_error(status, &body, StatusCode::NOT_FOUND, "NOT_FOUND");
    }
}

#[tokio::test]
async fn test_viewer_cannot_manage_grants() {
    let app = TestApp::new().await;
    let (status, body) = app.as_user(VIEWER_D2, Method::GET, &grants_uri(), None).await;
    assert_forbidden(status, &body, "viewer-read-only");

    let (status, body) = app
        .as_user(
            EDITOR_D2,
            Method::PUT,
            &grant_uri(USER_D2),
            Some(json!({ "level": "owner" })),
        )
        .await;
    assert_error(status, &body, StatusCode::BAD_REQUEST, "BAD_REQUEST");
}
