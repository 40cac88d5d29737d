/**
 * Get Current User Handler
 *
 * GET /api/auth/me returns the account the bearer token resolved to. The
 * auth middleware has already done the resolution, so this only echoes it.
 */
use axum::response::Json;

use crate::backend::middleware::AuthUser;
use crate::shared::{ApiResponse, User};

pub async fn get_me(AuthUser(user): AuthUser) -> Json<ApiResponse<User>> {
    Json(ApiResponse::ok(user))
}
