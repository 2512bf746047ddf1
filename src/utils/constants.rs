//! Constants Module - Single Source of Truth
//!
//! Every default, minimum and fixed value used by the service lives here.
//! Other modules refer to these names instead of repeating literals.

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "MeteoriteApi";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for outbound store reads
pub const USER_AGENT: &str = concat!("MeteoriteApi/", env!("CARGO_PKG_VERSION"));

// ============================================
// ENVIRONMENT VARIABLES
// ============================================

/// Base URL of the Firebase Realtime Database
pub const ENV_FIREBASE_URL: &str = "FIREBASE_HOST_LINK";
/// Secret node path holding the dataset
pub const ENV_FIREBASE_HIDDEN_PATH: &str = "FIREBASE_HIDDEN_PATH";
/// Secret mixed into caller identity hashes
pub const ENV_HASH_KEY: &str = "HASH_KEY";

// ============================================
// TUNABLE DEFAULTS
// ============================================

/// Minimum spacing between two requests of one caller (seconds)
pub const DEFAULT_RATE_LIMIT_INTERVAL_SECS: u64 = 1;
/// Accepted requests per caller per day
pub const DEFAULT_MAX_READS_PER_DAY: u32 = 15;
/// Inactivity after which a caller's limiter state is purged (days)
pub const DEFAULT_IPS_PURGE_TIME_DAYS: u64 = 1;
/// Timeout for the full dataset read (milliseconds)
pub const DEFAULT_FIREBASE_TIMEOUT_MS: u64 = 10_000;
/// Upper bound for /random
pub const DEFAULT_MAX_RANDOM_METEORITES: usize = 1000;
/// Upper bound for /search
pub const DEFAULT_MAX_RETURNED_SEARCH_RESULTS: usize = 300;
/// Smallest accepted search radius (km)
pub const DEFAULT_MIN_RADIUS_KM: f64 = 1.0;
/// Largest accepted search radius (km)
pub const DEFAULT_MAX_RADIUS_KM: f64 = 5000.0;
/// /random count when the caller gives none (or garbage)
pub const DEFAULT_RANDOM_NUMBER_OF_METEORITES: usize = 100;
/// Limiter table size that triggers an inline purge
pub const DEFAULT_MAX_TRACKED_CALLERS: usize = 100_000;

// ============================================
// TUNABLE MINIMUMS
// ============================================

pub const MIN_RATE_LIMIT_INTERVAL_SECS: u64 = 1;
pub const MIN_MAX_READS_PER_DAY: u32 = 5;
pub const MIN_IPS_PURGE_TIME_DAYS: u64 = 1;
pub const MIN_FIREBASE_TIMEOUT_MS: u64 = 6000;
pub const MIN_MAX_RANDOM_METEORITES: usize = 100;
pub const MIN_MAX_RETURNED_SEARCH_RESULTS: usize = 100;
pub const MIN_MIN_RADIUS_KM: f64 = 1.0;
pub const MIN_MAX_RADIUS_KM: f64 = 1000.0;
pub const MIN_DEFAULT_RANDOM_NUMBER_OF_METEORITES: usize = 100;
pub const MIN_MAX_TRACKED_CALLERS: usize = 1000;

// ============================================
// FIXED VALUES
// ============================================

/// Length of the quota window
pub const DAILY_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Mean Earth radius used by the haversine distance (km)
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Limiter purge period for the background task
pub const RATE_LIMIT_CLEANUP_INTERVAL_SECS: u64 = 60;

/// Hex length of a caller key (SHA-256)
pub const CALLER_KEY_LEN: usize = 64;

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Default listen host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Preflight cache lifetime advertised to browsers
pub const CORS_MAX_AGE_SECS: u64 = 86_400;
