// ============================================================================
// Axum Routes Module
// ============================================================================
//
// Structure:
// - mod.rs: router assembly and middleware
// - health.rs: health check and metrics endpoints
// - threads.rs: thread and message endpoints
// - extractors.rs: custom Axum extractors (bearer principal)
//
// ============================================================================

pub mod extractors;
mod health;
mod threads;

use axum::{
    Router,
    routing::{get, patch, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;

/// Create the main application router with all routes
pub fn create_router(app_context: Arc<AppContext>) -> Router {
    Router::new()
        // Health and monitoring
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        // Threads and messages
        .route(
            "/api/threads",
            get(threads::list_threads).post(threads::create_thread),
        )
        .route("/api/threads/:thread_id", get(threads::get_thread))
        .route(
            "/api/threads/:thread_id/messages",
            post(threads::post_message),
        )
        .route(
            "/api/threads/:thread_id/status",
            patch(threads::update_status),
        )
        .route(
            "/api/projects/:project_id/thread",
            get(threads::get_project_thread),
        )
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).into_inner())
        .with_state(app_context)
}
