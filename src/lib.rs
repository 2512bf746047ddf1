//! Meteorite API Library
//!
//! Read-only HTTP service over a meteorite landings dataset:
//! - Per-caller admission control (interval gate + daily quota) keyed by a
//!   salted hash of the caller address
//! - Single-flight in-memory cache of the dataset held in Firebase
//! - Search, random sampling and aggregate statistics

pub mod api;
pub mod engine;
pub mod models;
pub mod providers;
pub mod utils;

pub use api::{create_router, start_cleanup_task, AppState, RateLimiter};
pub use models::{ApiConfig, AppError, AppResult, ErrorCode, FilterSpec, Meteorite, ServerConfig};
pub use providers::{FirebaseStore, RecordStore};
pub use utils::cache::{CacheStats, DatasetCache};
pub use utils::identity::{CallerKey, IdentityHasher};
