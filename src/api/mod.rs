//! HTTP API Module
//! Routing, admission middleware and handlers for the meteorite dataset

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod types;

pub use handlers::AppState;
pub use middleware::{start_cleanup_task, RateDecision, RateLimitConfig, RateLimiter};
pub use routes::create_router;
pub use types::*;
