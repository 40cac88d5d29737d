/**
 * Application State Management
 *
 * This module defines the application state structure and implements
 * the necessary `FromRef` traits for Axum state extraction.
 *
 * # Architecture
 *
 * The `AppState` struct serves as the central state container for the
 * application, holding:
 * - Validated configuration
 * - The identity resolver and JWT sessions
 * - Store handles (accounts, files, rows) as trait objects
 * - The permission engine, audit recorder and collaboration coordinator
 * - The optional database pool
 *
 * # Thread Safety
 *
 * Every field is cheap to clone: stores and the coordinator are shared
 * through `Arc`, and the coordinator does its own per-file locking.
 *
 * # State Extraction
 *
 * The `FromRef` implementations allow middleware and handlers to extract
 * specific parts of the state without needing the entire `AppState`.
 */
use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::backend::access::PermissionEngine;
use crate::backend::audit::AuditRecorder;
use crate::backend::auth::identity::IdentityResolver;
use crate::backend::auth::sessions::JwtSessions;
use crate::backend::collab::CollabState;
use crate::backend::server::config::ServerConfig;
use crate::backend::store::{
    AccountStore, AuditStore, FileStore, MemoryStore, PostgresStore, RowStore,
};

/// Store handles backing one server instance
#[derive(Clone)]
pub struct Stores {
    pub accounts: Arc<dyn AccountStore>,
    pub files: Arc<dyn FileStore>,
    pub rows: Arc<dyn RowStore>,
    pub audit: Arc<dyn AuditStore>,
    /// Name of the backend, for startup logs
    pub backend: &'static str,
}

impl Stores {
    pub fn memory(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            accounts: store.clone(),
            files: store.clone(),
            rows: store.clone(),
            audit: store,
            backend: "memory",
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PostgresStore::new(pool));
        Self {
            accounts: store.clone(),
            files: store.clone(),
            rows: store.clone(),
            audit: store,
            backend: "postgres",
        }
    }
}

/// Application state
///
/// # Fields
///
/// * `config` - Validated server configuration
/// * `identity` - Resolves bearer tokens to active users
/// * `sessions` - Issues tokens on login
/// * `accounts`, `files`, `rows` - Store handles
/// * `access` - Permission engine over the file store
/// * `audit` - Fire-and-forget audit recorder
/// * `collab` - Presence and row-lock coordinator
/// * `db_pool` - PostgreSQL pool when a database is configured
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub identity: IdentityResolver,
    pub sessions: JwtSessions,
    pub accounts: Arc<dyn AccountStore>,
    pub files: Arc<dyn FileStore>,
    pub rows: Arc<dyn RowStore>,
    pub access: PermissionEngine,
    pub audit: AuditRecorder,
    pub collab: Arc<CollabState>,
    pub db_pool: Option<PgPool>,
}

impl AppState {
    pub fn new(config: ServerConfig, stores: Stores, db_pool: Option<PgPool>) -> Self {
        let sessions = JwtSessions::new(&config.jwt_secret, config.token_ttl_hours);
        let identity = IdentityResolver::new(Arc::new(sessions.clone()), stores.accounts.clone());
        let audit = AuditRecorder::new(stores.audit).with_default_limit(config.audit_history_limit);

        Self {
            config: Arc::new(config),
            identity,
            sessions,
            accounts: stores.accounts,
            access: PermissionEngine::new(stores.files.clone()),
            files: stores.files,
            rows: stores.rows,
            audit,
            collab: Arc::new(CollabState::new()),
            db_pool,
        }
    }
}

/// Lets `auth_middleware` extract only the identity resolver.
impl FromRef<AppState> for IdentityResolver {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.identity.clone()
    }
}

impl FromRef<AppState> for Arc<CollabState> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.collab.clone()
    }
}

impl FromRef<AppState> for AuditRecorder {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.audit.clone()
    }
}

/// Allows handlers to extract `Option<PgPool>` directly.
impl FromRef<AppState> for Option<PgPool> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}
