//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use axum::{middleware as axum_middleware, routing::get, Router};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub use middleware::RequestUserPolicy;
pub use routes::create_router;

/// Build the application router
pub fn build_router(pool: SqlitePool, policy: RequestUserPolicy) -> Router {
    // Layers run last-added first: request user -> logging -> handler
    let api_router = create_router()
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn_with_state(
            policy,
            middleware::request_user_middleware,
        ));

    Router::new()
        // Health check (no request user)
        .route("/health", get(health_check))
        .nest("/api/v1", api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(pool)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
