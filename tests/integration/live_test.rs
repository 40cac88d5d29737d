//! Live collaboration over HTTP: stream, commands, presence, force-unlock

use std::time::Duration;

use axum::http::{header, Method, StatusCode};
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tower::ServiceExt;

use crate::common::*;
use stockroom::shared::{AuditAction, CollabEvent, ConnectionId, UserId};

fn join(app: &TestApp, user_id: UserId) -> (ConnectionId, UnboundedReceiver<CollabEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let conn = app
        .state
        .collab
        .join(INVENTORY, &seeded_user(user_id), Box::new(tx));
    (conn, rx)
}

fn drain(rx: &mut UnboundedReceiver<CollabEvent>) -> Vec<CollabEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn names(events: &[CollabEvent]) -> Vec<&'static str> {
    events.iter().map(CollabEvent::name).collect()
}

async fn command(app: &TestApp, user_id: UserId, conn: ConnectionId, body: Value) -> (StatusCode, Value) {
    app.as_user(
        user_id,
        Method::POST,
        &format!("/api/files/{}/live/{}", INVENTORY, conn),
        Some(body),
    )
    .await
}

#[tokio::test]
async fn test_two_editors_contend_for_a_row() {
    let app = TestApp::new().await;
    let (conn_a, mut rx_a) = join(&app, USER_D2);
    let (conn_b, mut rx_b) = join(&app, EDITOR_D2);
    drain(&mut rx_a);
    drain(&mut rx_b);

    let (status, body) = command(&app, USER_D2, conn_a, json!({ "type": "lock", "row_id": 7 })).await;
    let data = assert_success(status, &body);
    assert_eq!(data["result"], "granted");
    assert_eq!(data["holder"]["username"], "ursula");

    let (status, body) = command(&app, EDITOR_D2, conn_b, json!({ "type": "lock", "row_id": 7 })).await;
    let data = assert_success(status, &body);
    assert_eq!(data["result"], "already_locked");
    assert_eq!(data["holder"]["user_id"], USER_D2);

    assert_eq!(names(&drain(&mut rx_a)), vec!["lock_granted"]);
    assert_eq!(names(&drain(&mut rx_b)), vec!["lock_granted", "lock_denied"]);

    let (status, body) = command(&app, EDITOR_D2, conn_b, json!({ "type": "unlock", "row_id": 7 })).await;
    assert_eq!(assert_success(status, &body)["result"], "not_holder");

    let (status, body) = command(
        &app,
        USER_D2,
        conn_a,
        json!({ "type": "update_row", "row_id": 7, "values": { "name": "Widget", "qty": "3" } }),
    )
    .await;
    let data = assert_success(status, &body);
    assert_eq!(data["result"], "updated");
    assert_eq!(data["row"]["values"]["qty"], "3");

    // The origin connection does not see its own update.
    assert!(drain(&mut rx_a).is_empty());
    let events = drain(&mut rx_b);
    assert_eq!(names(&events), vec!["row_updated"]);

    let (status, body) = command(&app, USER_D2, conn_a, json!({ "type": "leave" })).await;
    let data = assert_success(status, &body);
    assert_eq!(data["result"], "left");
    assert_eq!(data["released"], json!([7]));
    assert_eq!(names(&drain(&mut rx_b)), vec!["lock_released", "presence"]);

    let (status, body) = command(&app, EDITOR_D2, conn_b, json!({ "type": "lock", "row_id": 7 })).await;
    assert_eq!(assert_success(status, &body)["result"], "granted");
}

#[tokio::test]
async fn test_connection_belongs_to_its_user() {
    let app = TestApp::new().await;
    let (conn_b, _rx_b) = join(&app, EDITOR_D2);

    let (status, body) = command(&app, USER_D2, conn_b, json!({ "type": "lock", "row_id": 7 })).await;
    assert_error(status, &body, StatusCode::NOT_FOUND, "NOT_FOUND");

    let (status, body) = command(
        &app,
        USER_D2,
        uuid::Uuid::new_v4(),
        json!({ "type": "leave" }),
    )
    .await;
    assert_error(status, &body, StatusCode::NOT_FOUND, "NOT_FOUND");
}

#[tokio::test]
async fn test_viewer_watches_but_cannot_lock() {
    let app = TestApp::new().await;
    let (conn, _rx) = join(&app, VIEWER_D2);

    let (status, body) = command(&app, VIEWER_D2, conn, json!({ "type": "lock", "row_id": 7 })).await;
    assert_forbidden(status, &body, "viewer-read-only");
    assert!(app.state.collab.locks(INVENTORY).is_empty());
}

#[tokio::test]
async fn test_presence_snapshot() {
    let app = TestApp::new().await;
    let (conn_a, _rx_a) = join(&app, USER_D2);
    let (_conn_b, _rx_b) = join(&app, VIEWER_D2);
    command(&app, USER_D2, conn_a, json!({ "type": "lock", "row_id": 8 })).await;

    let (status, body) = app
        .as_user(
            VIEWER_D2,
            Method::GET,
            &format!("/api/files/{}/presence", INVENTORY),
            None,
        )
        .await;
    let data = assert_success(status, &body);
    assert_eq!(data["users"].as_array().map(Vec::len), Some(2));
    assert_eq!(data["locks"][0]["row_id"], 8);
    assert_eq!(data["locks"][0]["holder"]["username"], "ursula");

    let (status, body) = app
        .as_user(
            EDITOR_D1,
            Method::GET,
            &format!("/api/files/{}/presence", INVENTORY),
            None,
        )
        .await;
    assert_forbidden(status, &body, "cross-department");
}

#[tokio::test]
async fn test_admin_force_unlock() {
    let app = TestApp::new().await;
    let (conn_a, mut rx_a) = join(&app, USER_D2);
    command(&app, USER_D2, conn_a, json!({ "type": "lock", "row_id": 7 })).await;
    drain(&mut rx_a);
    let uri = format!("/api/files/{}/locks/7", INVENTORY);

    let (status, body) = app.as_user(EDITOR_D2, Method::DELETE, &uri, None).await;
    assert_forbidden(status, &body, "admin-required");

    let (status, body) = app.as_user(ADMIN, Method::DELETE, &uri, None).await;
    let holder = assert_success(status, &body);
    assert_eq!(holder["username"], "ursula");

    let events = drain(&mut rx_a);
    assert_eq!(names(&events), vec!["lock_released"]);
    assert!(matches!(
        events[0],
        CollabEvent::LockReleased { forced: true, row_id: 7, .. }
    ));

    let (status, body) = app.as_user(ADMIN, Method::DELETE, &uri, None).await;
    assert_error(status, &body, StatusCode::NOT_FOUND, "NOT_FOUND");

    let entries = app.wait_for_audit(1).await;
    assert_eq!(entries[0].action, AuditAction::ForceUnlock);
    assert_eq!(entries[0].metadata.as_ref().map(|m| m["holder"].clone()), Some(json!("ursula")));
}

#[tokio::test]
async fn test_stream_opens_with_welcome_and_leaves_on_drop() {
    let app = TestApp::new().await;
    let token = app.token(USER_D2);

    let response = app
        .router
        .clone()
        .oneshot(build_request(
            Method::GET,
            &format!("/api/files/{}/live", INVENTORY),
            Some(&token),
            None,
        ))
        .await
        .expect("router is infallible");
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"), "{}", content_type);

    let mut stream = response.into_body().into_data_stream();
    let first = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("welcome in time")
        .expect("stream open")
        .expect("frame");
    let text = String::from_utf8_lossy(&first).into_owned();
    assert!(text.contains("event: welcome"), "{}", text);

    let users = app.state.collab.active_users(INVENTORY);
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].username, "ursula");

    drop(stream);
    assert!(app.state.collab.active_users(INVENTORY).is_empty());
    assert_eq!(app.state.collab.room_count(), 0);
}

#[tokio::test]
async fn test_stream_requires_read_access() {
    let app = TestApp::new().await;
    let (status, body) = app
        .as_user(
            EDITOR_D1,
            Method::GET,
            &format!("/api/files/{}/live", INVENTORY),
            None,
        )
        .await;
    assert_forbidden(status, &body, "cross-department");
    assert_eq!(app.state.collab.room_count(), 0);
}

#[test]
fn test_concurrent_acquire_grants_exactly_one() {
    use std::sync::Arc;
    use stockroom::backend::collab::{CollabState, LockOutcome};

    let collab = Arc::new(CollabState::new());
    let mut receivers = Vec::new();
    let connections: Vec<ConnectionId> = (1..=16)
        .map(|id| {
            let (tx, rx) = mpsc::unbounded_channel();
            receivers.push(rx);
            collab.join(
                INVENTORY,
                &user(id, &format!("member{}", id), stockroom::shared::Role::Editor, 2),
                Box::new(tx),
            )
        })
        .collect();

    let handles: Vec<_> = connections
        .into_iter()
        .map(|conn| {
            let collab = collab.clone();
            std::thread::spawn(move || collab.acquire(INVENTORY, conn, 7))
        })
        .collect();
    let granted = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .filter(|outcome| matches!(outcome, LockOutcome::Granted(_)))
        .count();

    assert_eq!(granted, 1);
    assert_eq!(collab.locks(INVENTORY).len(), 1);
}

#[tokio::test]
async fn test_second_connection_of_holder_cannot_release() {
    let app = TestApp::new().await;
    let (first, _rx1) = join(&app, USER_D2);
    let (second, _rx2) = join(&app, USER_D2);
    command(&app, USER_D2, first, json!({ "type": "lock", "row_id": 7 })).await;

    let (status, body) = command(&app, USER_D2, second, json!({ "type": "unlock", "row_id": 7 })).await;
    let data = assert_success(status, &body);
    assert_eq!(data["result"], "not_holder");
    assert_eq!(data["holder"]["connection_id"], json!(first));
    assert_eq!(
        app.state.collab.holder(INVENTORY, 7).map(|h| h.connection_id),
        Some(first)
    );

    let (status, body) = command(&app, USER_D2, first, json!({ "type": "unlock", "row_id": 7 })).await;
    assert_eq!(assert_success(status, &body)["result"], "released");
}

#[tokio::test]
async fn test_lock_is_denied_while_a_write_is_in_flight() {
    let (app, paused) = TestApp::with_paused_row_updates().await;
    let (conn_b, mut rx_b) = join(&app, EDITOR_D2);
    drain(&mut rx_b);

    let path = format!("/api/files/{}/rows/7", INVENTORY);
    let write = app.as_user(
        USER_D2,
        Method::PUT,
        &path,
        Some(json!({ "values": { "name": "Widget", "qty": "1" } })),
    );
    let contend = async {
        paused.entered.notified().await;
        let outcome = command(&app, EDITOR_D2, conn_b, json!({ "type": "lock", "row_id": 7 })).await;
        paused.resume.notify_one();
        outcome
    };
    let ((write_status, write_body), (lock_status, lock_body)) = tokio::join!(write, contend);

    let data = assert_success(lock_status, &lock_body);
    assert_eq!(data["result"], "already_locked");
    assert_eq!(data["holder"]["user_id"], USER_D2);
    assert_eq!(assert_success(write_status, &write_body)["values"]["qty"], "1");
    assert_eq!(names(&drain(&mut rx_b)), vec!["lock_denied", "row_updated"]);
    assert!(app.state.collab.locks(INVENTORY).is_empty());

    let (status, body) = command(&app, EDITOR_D2, conn_b, json!({ "type": "lock", "row_id": 7 })).await;
    assert_eq!(assert_success(status, &body)["result"], "granted");
}

#[tokio::test]
async fn test_write_without_live_members_leaves_no_room() {
    let (app, paused) = TestApp::with_paused_row_updates().await;
    paused.resume.notify_one();

    let (status, body) = app
        .as_user(
            USER_D2,
            Method::PUT,
            &format!("/api/files/{}/rows/8", INVENTORY),
            Some(json!({ "values": { "name": "Gadget", "qty": "9" } })),
        )
        .await;
    assert_success(status, &body);
    assert_eq!(app.state.collab.room_count(), 0);
}

#[tokio::test]
async fn test_deleting_a_locked_row_releases_its_lock() {
    let app = TestApp::new().await;
    let (conn_a, _rx_a) = join(&app, USER_D2);
    let (conn_b, mut rx_b) = join(&app, EDITOR_D2);
    command(&app, USER_D2, conn_a, json!({ "type": "lock", "row_id": 7 })).await;
    drain(&mut rx_b);

    let (status, body) = app
        .as_user(
            USER_D2,
            Method::DELETE,
            &format!("/api/files/{}/rows/7", INVENTORY),
            None,
        )
        .await;
    assert_eq!(assert_success(status, &body), json!(7));

    let events = drain(&mut rx_b);
    assert_eq!(names(&events), vec!["lock_released", "row_deleted"]);
    assert!(matches!(
        events[0],
        CollabEvent::LockReleased { row_id: 7, forced: false, .. }
    ));
    assert!(app.state.collab.holder(INVENTORY, 7).is_none());

    // the deleted row id carries no lock
    let (status, body) = command(&app, EDITOR_D2, conn_b, json!({ "type": "lock", "row_id": 7 })).await;
    assert_eq!(assert_success(status, &body)["result"], "granted");
}

#[tokio::test]
async fn test_deleting_a_file_closes_its_room() {
    let app = TestApp::new().await;
    let (conn_a, mut rx_a) = join(&app, USER_D2);
    let (conn_b, _rx_b) = join(&app, EDITOR_D2);
    command(&app, USER_D2, conn_a, json!({ "type": "lock", "row_id": 8 })).await;
    drain(&mut rx_a);

    let (status, body) = app
        .as_user(EDITOR_D2, Method::DELETE, &format!("/api/files/{}", INVENTORY), None)
        .await;
    assert_eq!(assert_success(status, &body), json!(INVENTORY));

    assert_eq!(names(&drain(&mut rx_a)), vec!["lock_released"]);
    assert!(matches!(
        rx_a.try_recv(),
        Err(mpsc::error::TryRecvError::Disconnected)
    ));
    assert_eq!(app.state.collab.room_count(), 0);
    assert!(app.state.collab.active_users(INVENTORY).is_empty());
    assert!(app.state.collab.member(INVENTORY, conn_b).is_none());
}
