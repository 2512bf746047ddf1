//! API Route Configuration

use axum::{http::Method, middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{self, AppState};
use super::middleware::{
    config_guard_middleware, identity_middleware, logging_middleware, preflight_middleware,
    rate_limit_middleware,
};
use crate::utils::constants::CORS_MAX_AGE_SECS;

/// Create the API router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(Duration::from_secs(CORS_MAX_AGE_SECS));

    // Data endpoints, both rate-limit gates apply
    let gated = Router::new()
        .route("/stats", get(handlers::get_stats))
        .route("/random", get(handlers::get_random))
        .route("/get", get(handlers::get_meteorite))
        .route("/search", get(handlers::search))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .merge(gated)
        .fallback(handlers::invalid_endpoint)
        .with_state(state.clone())
        // Middleware (order matters - bottom runs first)
        .layer(middleware::from_fn_with_state(state.clone(), identity_middleware))
        // CorsLayer answers any OPTIONS itself, so preflights stop before it
        .layer(cors)
        .layer(middleware::from_fn(preflight_middleware))
        .layer(middleware::from_fn_with_state(state, config_guard_middleware))
        .layer(middleware::from_fn(logging_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}
