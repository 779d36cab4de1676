//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let api_routes = Router::new()
        // Health and status
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::daemon_status))
        // BoxControllers
        .route("/boxcontrollers", get(handlers::list_boxcontrollers))
        .route(
            "/namespaces/:namespace/boxcontrollers/:name",
            get(handlers::get_boxcontroller)
                .put(handlers::apply_boxcontroller)
                .delete(handlers::delete_boxcontroller),
        )
        .route(
            "/namespaces/:namespace/boxcontrollers/:name/reconcile",
            post(handlers::reconcile_boxcontroller),
        )
        // Boxes
        .route("/namespaces/:namespace/pods", get(handlers::list_pods))
        // Events
        .route("/events/stream", get(handlers::stream_events));

    // Build router with middleware
    let router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
