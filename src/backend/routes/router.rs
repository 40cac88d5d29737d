/**
 * Router Configuration
 *
 * This module provides the main router creation function that combines
 * all route configurations into a single Axum router.
 *
 * # Layers
 *
 * 1. Public routes (health, login)
 * 2. API routes behind `auth_middleware` (applied with `route_layer`, so
 *    unknown paths still fall through to the 404 handler)
 * 3. Fallback returning the JSON `NOT_FOUND` envelope
 * 4. `TraceLayer` over everything
 */
use axum::{middleware::from_fn_with_state, Router};
use tower_http::trace::TraceLayer;

use crate::backend::error::BackendError;
use crate::backend::middleware::auth_middleware;
use crate::backend::routes::api_routes::{configure_api_routes, configure_public_routes};
use crate::backend::server::state::AppState;

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState) -> Router<()> {
    let protected = configure_api_routes(Router::new())
        .route_layer(from_fn_with_state(app_state.clone(), auth_middleware));

    configure_public_routes(Router::new())
        .merge(protected)
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn route_not_found() -> BackendError {
    BackendError::not_found("Route not found")
}
