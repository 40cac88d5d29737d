/**
 * API Route Handlers
 *
 * This module defines the route tables for the REST and live endpoints.
 *
 * # Routes
 *
 * ## Public
 * - `GET /api/health` - Liveness and store backend
 * - `POST /api/auth/login` - Exchange credentials for a token
 *
 * ## Authenticated
 * - `GET /api/auth/me` - Current user
 * - `GET|POST /api/files` - List readable files, create a file
 * - `DELETE /api/files/{file_id}` - Delete a file
 * - `GET|POST /api/files/{file_id}/rows` - List and append rows
 * - `PUT|DELETE /api/files/{file_id}/rows/{row_id}` - Replace and delete a row
 * - `GET /api/files/{file_id}/grants` - List grants
 * - `PUT|DELETE /api/files/{file_id}/grants/{user_id}` - Set and revoke a grant
 * - `GET /api/files/{file_id}/live` - Live event stream (SSE)
 * - `POST /api/files/{file_id}/live/{conn_id}` - Live connection commands
 * - `GET /api/files/{file_id}/presence` - Members and locks
 * - `DELETE /api/files/{file_id}/locks/{row_id}` - Force-unlock a row
 * - `GET /api/audit/recent` - Latest audit entries
 * - `GET /api/audit/{entity_type}/{entity_id}` - History of one entity
 */
use std::sync::Arc;

use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::backend::audit::handlers::{entity_history, recent_activity};
use crate::backend::auth::{get_me, login};
use crate::backend::collab::handlers::{
    force_unlock, get_presence, handle_live_command, open_live_stream,
};
use crate::backend::collab::CollabState;
use crate::backend::files::{
    create_file, create_row, delete_file, delete_grant, delete_row, list_files, list_grants,
    list_rows, put_grant, update_row,
};
use crate::backend::server::state::AppState;
use crate::shared::ApiResponse;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub store: String,
    pub live_rooms: usize,
}

/// Health check (GET /api/health)
pub async fn health(
    State(db_pool): State<Option<PgPool>>,
    State(collab): State<Arc<CollabState>>,
) -> Json<ApiResponse<HealthStatus>> {
    let store = if db_pool.is_some() { "postgres" } else { "memory" };
    Json(ApiResponse::ok(HealthStatus {
        status: "ok".to_string(),
        store: store.to_string(),
        live_rooms: collab.room_count(),
    }))
}

/// Configure routes that need no credentials
pub fn configure_public_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/health", get(health))
        .route("/api/auth/login", post(login))
}

/// Configure API routes
///
/// Every route added here sits behind `auth_middleware`; the router applies
/// it with `route_layer` after this function returns.
pub fn configure_api_routes(router: Router<AppState>) -> Router<AppState> {
    router
        // Authentication endpoints
        .route("/api/auth/me", get(get_me))
        // Files and rows
        .route("/api/files", get(list_files).post(create_file))
        .route("/api/files/{file_id}", delete(delete_file))
        .route("/api/files/{file_id}/rows", get(list_rows).post(create_row))
        .route(
            "/api/files/{file_id}/rows/{row_id}",
            put(update_row).delete(delete_row),
        )
        // Grants
        .route("/api/files/{file_id}/grants", get(list_grants))
        .route(
            "/api/files/{file_id}/grants/{user_id}",
            put(put_grant).delete(delete_grant),
        )
        // Live collaboration
        .route("/api/files/{file_id}/live", get(open_live_stream))
        .route(
            "/api/files/{file_id}/live/{conn_id}",
            post(handle_live_command),
        )
        .route("/api/files/{file_id}/presence", get(get_presence))
        .route("/api/files/{file_id}/locks/{row_id}", delete(force_unlock))
        // Audit
        .route("/api/audit/recent", get(recent_activity))
        .route(
            "/api/audit/{entity_type}/{entity_id}",
            get(entity_history),
        )
}
