//! Seeded application fixture
//!
//! Departments 1 and 2. Users:
//!
//! | id | username | role | department |
//! |---|---|---|---|
//! | 1 | root | admin | 1 |
//! | 2 | erin | editor | 1 |
//! | 3 | ursula | user | 2 |
//! | 4 | victor | viewer | 2 |
//! | 5 | edgar | editor | 2 |
//! | 6 | retired | user | 2, inactive |
//!
//! Files: 10 "Inventory" (department 2, created by edgar) with rows 7 and 8,
//! and 11 "Sales Q1" (department 1, created by erin).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tower::ServiceExt;

use stockroom::backend::auth::users::hash_password;
use stockroom::backend::routes::create_router;
use stockroom::backend::server::config::ServerConfig;
use stockroom::backend::server::state::{AppState, Stores};
use stockroom::backend::store::{
    AuditStore, MemoryStore, RowStore, StoreError, StoreResult, UserRecord,
};
use stockroom::shared::{
    AuditLogEntry, DepartmentId, EntityType, File, FileId, NewAuditEntry, Role, Row, RowId,
    RowValues, User, UserId,
};

pub const PASSWORD: &str = "correct horse";
pub const SECRET: &str = "integration-test-secret";

pub const ADMIN: UserId = 1;
pub const EDITOR_D1: UserId = 2;
pub const USER_D2: UserId = 3;
pub const VIEWER_D2: UserId = 4;
pub const EDITOR_D2: UserId = 5;
pub const RETIRED: UserId = 6;

pub const INVENTORY: i64 = 10;
pub const SALES: i64 = 11;

pub fn user(id: UserId, username: &str, role: Role, department_id: DepartmentId) -> User {
    User {
        id,
        username: username.to_string(),
        role,
        department_id: Some(department_id),
        is_active: true,
    }
}

pub fn values(value: Value) -> RowValues {
    value.as_object().cloned().unwrap_or_default()
}

/// Audit store that rejects every write
pub struct FailingAuditStore;

#[async_trait]
impl AuditStore for FailingAuditStore {
    async fn append(&self, _entry: NewAuditEntry) -> StoreResult<AuditLogEntry> {
        Err(StoreError::Unavailable("audit store offline".to_string()))
    }

    async fn history(
        &self,
        _entity_type: EntityType,
        _entity_id: i64,
        _limit: usize,
    ) -> StoreResult<Vec<AuditLogEntry>> {
        Err(StoreError::Unavailable("audit store offline".to_string()))
    }

    async fn recent(&self, _limit: usize) -> StoreResult<Vec<AuditLogEntry>> {
        Err(StoreError::Unavailable("audit store offline".to_string()))
    }
}

/// Row store whose `update_row` stops until the test lets it continue.
pub struct PausedRowStore {
    inner: MemoryStore,
    /// Signalled once an update has reached the store
    pub entered: Notify,
    /// Signal to let the paused update finish
    pub resume: Notify,
}

impl PausedRowStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            entered: Notify::new(),
            resume: Notify::new(),
        }
    }
}

#[async_trait]
impl RowStore for PausedRowStore {
    async fn list_rows(&self, file_id: FileId) -> StoreResult<Vec<Row>> {
        self.inner.list_rows(file_id).await
    }

    async fn get_row(&self, file_id: FileId, row_id: RowId) -> StoreResult<Option<Row>> {
        self.inner.get_row(file_id, row_id).await
    }

    async fn insert_row(&self, file_id: FileId, values: RowValues) -> StoreResult<Row> {
        self.inner.insert_row(file_id, values).await
    }

    async fn update_row(
        &self,
        file_id: FileId,
        row_id: RowId,
        values: RowValues,
    ) -> StoreResult<Row> {
        self.entered.notify_one();
        self.resume.notified().await;
        self.inner.update_row(file_id, row_id, values).await
    }

    async fn delete_row(&self, file_id: FileId, row_id: RowId) -> StoreResult<()> {
        self.inner.delete_row(file_id, row_id).await
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: MemoryStore,
}

impl TestApp {
    pub async fn new() -> Self {
        let store = seeded_store().await;
        Self::with_stores(store.clone(), Stores::memory(store)).await
    }

    /// Same seed data, but audit writes always fail.
    pub async fn with_failing_audit() -> Self {
        let store = seeded_store().await;
        let mut stores = Stores::memory(store.clone());
        stores.audit = Arc::new(FailingAuditStore);
        Self::with_stores(store, stores).await
    }

    /// Same seed data, but row updates wait on the returned store's `resume`.
    pub async fn with_paused_row_updates() -> (Self, Arc<PausedRowStore>) {
        let store = seeded_store().await;
        let paused = Arc::new(PausedRowStore::new(store.clone()));
        let mut stores = Stores::memory(store.clone());
        stores.rows = paused.clone();
        (Self::with_stores(store, stores).await, paused)
    }

    async fn with_stores(store: MemoryStore, stores: Stores) -> Self {
        let config = ServerConfig::builder()
            .jwt_secret(SECRET)
            .build()
            .expect("test config");
        let state = AppState::new(config, stores, None);
        Self {
            router: create_router(state.clone()),
            state,
            store,
        }
    }

    pub fn token(&self, user_id: UserId) -> String {
        self.state
            .sessions
            .create_token(&seeded_user(user_id))
            .expect("token")
            .token
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(build_request(method, uri, token, body))
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    /// Request as a seeded user.
    pub async fn as_user(
        &self,
        user_id: UserId,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let token = self.token(user_id);
        self.request(method, uri, Some(&token), body).await
    }

    /// Audit entries once at least `count` have been written.
    pub async fn wait_for_audit(&self, count: usize) -> Vec<AuditLogEntry> {
        for _ in 0..200 {
            let entries = self.store.audit_entries().await;
            if entries.len() >= count {
                return entries;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.store.audit_entries().await
    }
}

pub fn build_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("request")
}

pub fn seeded_users() -> Vec<User> {
    let mut retired = user(RETIRED, "retired", Role::User, 2);
    retired.is_active = false;
    vec![
        user(ADMIN, "root", Role::Admin, 1),
        user(EDITOR_D1, "erin", Role::Editor, 1),
        user(USER_D2, "ursula", Role::User, 2),
        user(VIEWER_D2, "victor", Role::Viewer, 2),
        user(EDITOR_D2, "edgar", Role::Editor, 2),
        retired,
    ]
}

pub fn seeded_user(id: UserId) -> User {
    seeded_users()
        .into_iter()
        .find(|user| user.id == id)
        .expect("seeded user")
}

pub async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    let password_hash = hash_password(PASSWORD, 4).expect("bcrypt");

    for user in seeded_users() {
        store
            .insert_user(UserRecord {
                user,
                password_hash: password_hash.clone(),
                deleted_at: None,
            })
            .await;
    }

    store
        .insert_file(File {
            id: INVENTORY,
            name: "Inventory".to_string(),
            department_id: 2,
            created_by: EDITOR_D2,
            created_at: Utc::now(),
        })
        .await;
    store
        .insert_file(File {
            id: SALES,
            name: "Sales Q1".to_string(),
            department_id: 1,
            created_by: EDITOR_D1,
            created_at: Utc::now(),
        })
        .await;

    store
        .insert_row_with_id(INVENTORY, 7, values(json!({ "name": "Widget", "qty": "5" })))
        .await;
    store
        .insert_row_with_id(INVENTORY, 8, values(json!({ "name": "Gadget", "qty": "2" })))
        .await;

    store
}
