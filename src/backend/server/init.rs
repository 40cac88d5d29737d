/**
 * Server Initialization
 *
 * This module builds the application state and router from a validated
 * configuration.
 *
 * # Initialization Process
 *
 * 1. Connect to PostgreSQL and run migrations, if configured
 * 2. Pick the store backend: Postgres when connected, in-memory otherwise
 * 3. Build `AppState` (sessions, identity, access, audit, collaboration)
 * 4. Create the router
 */
use axum::Router;

use crate::backend::routes::router::create_router;
use crate::backend::server::config::{load_database, ServerConfig};
use crate::backend::server::state::{AppState, Stores};
use crate::backend::store::MemoryStore;

/// Create and configure the Axum application
pub async fn create_app(config: ServerConfig) -> Router<()> {
    tracing::info!("Initializing Stockroom backend server");
    let app_state = build_state(config).await;
    let app = create_router(app_state);
    tracing::info!("Router configured");
    app
}

/// Build the shared state, falling back to in-memory stores without a database
pub async fn build_state(config: ServerConfig) -> AppState {
    let db_pool = load_database(&config).await;
    let stores = match &db_pool {
        Some(pool) => Stores::postgres(pool.clone()),
        None => Stores::memory(MemoryStore::new()),
    };
    tracing::info!("Using {} store backend", stores.backend);

    AppState::new(config, stores, db_pool)
}
