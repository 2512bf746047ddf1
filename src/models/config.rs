//! Configuration module for the meteorite API
//!
//! Credentials come from the environment and are never logged. Numeric
//! tunables default to the values in `utils::constants` and may be
//! overridden by environment variables of the same name.

use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::errors::{AppError, AppResult};
use crate::utils::constants::*;

/// Runtime configuration of the service
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Firebase Realtime Database base URL
    pub firebase_url: String,
    /// Node path of the dataset inside the database
    pub firebase_hidden_path: String,
    /// Secret for caller identity hashing
    pub hash_key: String,

    pub rate_limit_interval_secs: u64,
    pub max_reads_per_day: u32,
    pub ips_purge_time_days: u64,
    pub firebase_timeout_ms: u64,
    pub max_random_meteorites: usize,
    pub max_returned_search_results: usize,
    pub min_radius_km: f64,
    pub max_radius_km: f64,
    pub default_random_number_of_meteorites: usize,
    pub max_tracked_callers: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            firebase_url: String::new(),
            firebase_hidden_path: String::new(),
            hash_key: String::new(),
            rate_limit_interval_secs: DEFAULT_RATE_LIMIT_INTERVAL_SECS,
            max_reads_per_day: DEFAULT_MAX_READS_PER_DAY,
            ips_purge_time_days: DEFAULT_IPS_PURGE_TIME_DAYS,
            firebase_timeout_ms: DEFAULT_FIREBASE_TIMEOUT_MS,
            max_random_meteorites: DEFAULT_MAX_RANDOM_METEORITES,
            max_returned_search_results: DEFAULT_MAX_RETURNED_SEARCH_RESULTS,
            min_radius_km: DEFAULT_MIN_RADIUS_KM,
            max_radius_km: DEFAULT_MAX_RADIUS_KM,
            default_random_number_of_meteorites: DEFAULT_RANDOM_NUMBER_OF_METEORITES,
            max_tracked_callers: DEFAULT_MAX_TRACKED_CALLERS,
        }
    }
}

impl ApiConfig {
    /// Build the configuration from the process environment.
    ///
    /// Missing credentials are kept as empty strings so the server can still
    /// start and answer every request with a configuration error.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            firebase_url: env_string(ENV_FIREBASE_URL),
            firebase_hidden_path: env_string(ENV_FIREBASE_HIDDEN_PATH),
            hash_key: env_string(ENV_HASH_KEY),
            rate_limit_interval_secs: env_or("RATE_LIMIT_INTERVAL_S", defaults.rate_limit_interval_secs),
            max_reads_per_day: env_or("MAX_READS_PER_DAY", defaults.max_reads_per_day),
            ips_purge_time_days: env_or("IPS_PURGE_TIME_DAYS", defaults.ips_purge_time_days),
            firebase_timeout_ms: env_or("FIREBASE_TIMEOUT_MS", defaults.firebase_timeout_ms),
            max_random_meteorites: env_or("MAX_RANDOM_METEORITES", defaults.max_random_meteorites),
            max_returned_search_results: env_or(
                "MAX_RETURNED_SEARCH_RESULTS",
                defaults.max_returned_search_results,
            ),
            min_radius_km: env_or("MIN_RADIUS", defaults.min_radius_km),
            max_radius_km: env_or("MAX_RADIUS", defaults.max_radius_km),
            default_random_number_of_meteorites: env_or(
                "DEFAULT_RANDOM_NUMBER_OF_METEORITES",
                defaults.default_random_number_of_meteorites,
            ),
            max_tracked_callers: env_or("MAX_TRACKED_CALLERS", defaults.max_tracked_callers),
        };

        if config.has_credentials() {
            info!("🔑 Firebase credentials and hash key configured (values hidden)");
        } else {
            warn!("⚠️ Credentials missing: every request will be answered with 500");
        }

        config
    }

    /// All three secrets are present
    pub fn has_credentials(&self) -> bool {
        !self.firebase_url.trim().is_empty()
            && !self.firebase_hidden_path.trim().is_empty()
            && !self.hash_key.is_empty()
    }

    /// Check credentials, minimums and cross-field consistency.
    pub fn validate(&self) -> AppResult<()> {
        if !self.has_credentials() {
            return Err(AppError::missing_credentials());
        }

        let within_minimums = self.rate_limit_interval_secs >= MIN_RATE_LIMIT_INTERVAL_SECS
            && self.max_reads_per_day >= MIN_MAX_READS_PER_DAY
            && self.ips_purge_time_days >= MIN_IPS_PURGE_TIME_DAYS
            && self.firebase_timeout_ms >= MIN_FIREBASE_TIMEOUT_MS
            && self.max_random_meteorites >= MIN_MAX_RANDOM_METEORITES
            && self.max_returned_search_results >= MIN_MAX_RETURNED_SEARCH_RESULTS
            && self.min_radius_km >= MIN_MIN_RADIUS_KM
            && self.max_radius_km >= MIN_MAX_RADIUS_KM
            && self.default_random_number_of_meteorites >= MIN_DEFAULT_RANDOM_NUMBER_OF_METEORITES
            && self.max_tracked_callers >= MIN_MAX_TRACKED_CALLERS;

        let consistent = self.min_radius_km <= self.max_radius_km
            && self.default_random_number_of_meteorites <= self.max_random_meteorites;

        if !within_minimums || !consistent {
            return Err(AppError::invalid_config(
                "Invalid configuration detected. Please refer to the documentation.",
            ));
        }

        Ok(())
    }

    pub fn rate_limit_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_interval_secs)
    }

    pub fn purge_horizon(&self) -> Duration {
        Duration::from_secs(self.ips_purge_time_days * DAILY_WINDOW_SECS)
    }

    pub fn firebase_timeout(&self) -> Duration {
        Duration::from_millis(self.firebase_timeout_ms)
    }
}

fn env_string(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, "Ignoring unparsable override, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Listen address of the HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// `PORT` wins (hosting platforms set it), then `METEORITE_API_PORT`.
    pub fn from_env() -> Self {
        let host = std::env::var("METEORITE_API_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = std::env::var("PORT")
            .or_else(|_| std::env::var("METEORITE_API_PORT"))
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self { host, port }
    }
}
