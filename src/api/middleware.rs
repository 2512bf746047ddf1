//! API Middleware (Config guard, Identity, Rate Limiting, Logging)

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::{mapref::entry::Entry, DashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::handlers::AppState;
use crate::models::config::ApiConfig;
use crate::models::errors::AppError;
use crate::utils::constants::{CORS_MAX_AGE_SECS, DAILY_WINDOW_SECS, RATE_LIMIT_CLEANUP_INTERVAL_SECS};
use crate::utils::identity::CallerKey;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Minimum spacing between two requests of one caller
    pub interval: Duration,
    /// Accepted requests per caller per window
    pub max_reads_per_day: u32,
    /// Length of the quota window
    pub daily_window: Duration,
    /// Callers idle for longer than this are forgotten
    pub purge_horizon: Duration,
    /// Upper bound on tracked callers; reaching it purges idle callers and
    /// then evicts the least recently seen ones
    pub max_tracked_callers: usize,
}

impl RateLimitConfig {
    pub fn from_api_config(config: &ApiConfig) -> Self {
        Self {
            interval: config.rate_limit_interval(),
            max_reads_per_day: config.max_reads_per_day,
            daily_window: Duration::from_secs(DAILY_WINDOW_SECS),
            purge_horizon: config.purge_horizon(),
            max_tracked_callers: config.max_tracked_callers,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::from_api_config(&ApiConfig::default())
    }
}

/// Per-caller gate state
#[derive(Debug, Clone, Copy)]
struct RateWindowState {
    last_request: Instant,
    daily_count: u32,
    daily_window_start: Instant,
}

/// Admission decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining_today: u32 },
    IntervalExceeded { retry_after: Duration },
    DailyQuotaExceeded { reset_in: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// In-memory two-gate rate limiter keyed by hashed caller identity.
///
/// Both gates for one key are evaluated under the same DashMap entry lock,
/// so concurrent requests from one caller cannot both pass the interval gate.
pub struct RateLimiter {
    callers: DashMap<CallerKey, RateWindowState>,
    config: RateLimitConfig,
    purged: AtomicU64,
    /// Last horizon purge triggered by a full table
    last_inline_purge: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            callers: DashMap::new(),
            config,
            purged: AtomicU64::new(0),
            last_inline_purge: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check if request is allowed right now
    pub fn check(&self, key: &CallerKey) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// Interval gate first, then the daily gate. A request stopped by the
    /// interval gate does not consume quota.
    pub fn check_at(&self, key: &CallerKey, now: Instant) -> RateDecision {
        if !self.callers.contains_key(key) && self.callers.len() >= self.config.max_tracked_callers {
            self.make_room(now);
        }

        match self.callers.entry(key.clone()) {
            Entry::Vacant(vacant) => {
                if self.config.max_reads_per_day == 0 {
                    return RateDecision::DailyQuotaExceeded {
                        reset_in: self.config.daily_window,
                    };
                }
                vacant.insert(RateWindowState {
                    last_request: now,
                    daily_count: 1,
                    daily_window_start: now,
                });
                RateDecision::Allowed {
                    remaining_today: self.config.max_reads_per_day - 1,
                }
            }
            Entry::Occupied(mut occupied) => self.admit(occupied.get_mut(), now),
        }
    }

    fn admit(&self, state: &mut RateWindowState, now: Instant) -> RateDecision {
        // Fail closed on a clock that appears to run backwards
        let (Some(since_last), Some(since_window)) = (
            now.checked_duration_since(state.last_request),
            now.checked_duration_since(state.daily_window_start),
        ) else {
            return RateDecision::IntervalExceeded {
                retry_after: self.config.interval,
            };
        };

        if since_last < self.config.interval {
            return RateDecision::IntervalExceeded {
                retry_after: self.config.interval - since_last,
            };
        }
        state.last_request = now;

        let since_window = if since_window >= self.config.daily_window {
            state.daily_count = 0;
            state.daily_window_start = now;
            Duration::ZERO
        } else {
            since_window
        };

        if state.daily_count >= self.config.max_reads_per_day {
            return RateDecision::DailyQuotaExceeded {
                reset_in: self.config.daily_window.saturating_sub(since_window),
            };
        }

        state.daily_count += 1;
        RateDecision::Allowed {
            remaining_today: self.config.max_reads_per_day - state.daily_count,
        }
    }

    /// Free at least one slot for a new caller. The horizon purge runs at most
    /// once per cleanup interval; if the table is still full, the least
    /// recently seen tenth of it is evicted in one pass.
    fn make_room(&self, now: Instant) {
        if self.inline_purge_due(now) {
            self.cleanup_at(now);
        }

        let cap = self.config.max_tracked_callers;
        let len = self.callers.len();
        if len < cap {
            return;
        }

        let batch = (cap / 10).max(len + 1 - cap);
        let mut by_age: Vec<(Instant, CallerKey)> = self
            .callers
            .iter()
            .map(|entry| (entry.value().last_request, entry.key().clone()))
            .collect();
        by_age.sort_unstable_by_key(|(last_request, _)| *last_request);

        let evicted = by_age
            .into_iter()
            .take(batch)
            .filter(|(_, key)| self.callers.remove(key).is_some())
            .count();

        self.purged.fetch_add(evicted as u64, Ordering::Relaxed);
        warn!(evicted, capacity = cap, "Rate limiter full, evicted least recent callers");
    }

    fn inline_purge_due(&self, now: Instant) -> bool {
        // Another thread is already deciding
        let Ok(mut last) = self.last_inline_purge.try_lock() else {
            return false;
        };
        let due = last.map_or(true, |at| {
            now.checked_duration_since(at)
                .map_or(false, |d| d >= Duration::from_secs(RATE_LIMIT_CLEANUP_INTERVAL_SECS))
        });
        if due {
            *last = Some(now);
        }
        due
    }

    /// Cleanup idle callers (call periodically)
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now())
    }

    pub fn cleanup_at(&self, now: Instant) -> usize {
        let horizon = self.config.purge_horizon;
        let before = self.callers.len();
        self.callers.retain(|_, state| {
            now.checked_duration_since(state.last_request)
                .map_or(true, |idle| idle < horizon)
        });
        let removed = before.saturating_sub(self.callers.len());
        if removed > 0 {
            self.purged.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, "🧹 Rate limiter purge");
        }
        removed
    }

    /// Number of callers currently tracked
    pub fn tracked_callers(&self) -> usize {
        self.callers.len()
    }

    /// Callers forgotten since startup
    pub fn purged_total(&self) -> u64 {
        self.purged.load(Ordering::Relaxed)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

/// Start background purge of idle callers
pub fn start_cleanup_task(limiter: Arc<RateLimiter>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(RATE_LIMIT_CLEANUP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let removed = limiter.cleanup();
            if removed > 0 {
                info!(
                    removed,
                    tracked = limiter.tracked_callers(),
                    "🧹 Idle callers purged"
                );
            }
        }
    })
}

/// Answer 500 on every request while the configuration is unusable
pub async fn config_guard_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if let Err(err) = &state.config_status {
        return err.detached().into_response();
    }
    next.run(request).await
}

/// Raw caller address: proxy headers first, then the TCP peer
fn caller_address(headers: &HeaderMap, request: &Request) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
}

/// Answer every `OPTIONS` request with a 204 preflight, ahead of any other check
pub async fn preflight_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        debug!(path = %request.uri().path(), "CORS preflight");
        return preflight_response();
    }
    next.run(request).await
}

/// Hash the caller address into a [`CallerKey`].
///
/// The key is stored in the request extensions for the rate limiter.
pub async fn identity_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let address = caller_address(&headers, &request).unwrap_or_default();
    let key = match state.hasher.hash(&address) {
        Ok(key) => key,
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(key);
    next.run(request).await
}

fn preflight_response() -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, CORS_MAX_AGE_SECS.into());
    response
}

/// Rate limiting middleware for the gated endpoints
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    // Fail closed: a request that skipped identity hashing is never admitted
    let Some(key) = request.extensions().get::<CallerKey>().cloned() else {
        return AppError::identity_unavailable().into_response();
    };

    let remaining = match state.limiter.check(&key) {
        RateDecision::Allowed { remaining_today } => remaining_today,
        RateDecision::IntervalExceeded { retry_after } => {
            warn!(caller = %short_key(&key), retry_after_ms = retry_after.as_millis() as u64, "Interval gate hit");
            return AppError::interval_exceeded(state.config.rate_limit_interval_secs).into_response();
        }
        RateDecision::DailyQuotaExceeded { reset_in } => {
            warn!(caller = %short_key(&key), reset_in_secs = reset_in.as_secs(), "Daily quota exhausted");
            return AppError::daily_quota_exceeded(state.config.max_reads_per_day).into_response();
        }
    };

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert("x-ratelimit-remaining", remaining.into());
    response
}

/// Log prefix of a caller key, enough to correlate requests
fn short_key(key: &CallerKey) -> &str {
    &key.as_str()[..12.min(key.as_str().len())]
}

/// Request logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    info!(
        method = %method,
        path = %path,
        status = %status.as_u16(),
        latency_ms = %latency.as_millis(),
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::identity::IdentityHasher;

    fn limiter(max_reads_per_day: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            interval: Duration::from_secs(1),
            max_reads_per_day,
            daily_window: Duration::from_secs(DAILY_WINDOW_SECS),
            purge_horizon: Duration::from_secs(DAILY_WINDOW_SECS),
            max_tracked_callers: 1000,
        })
    }

    fn key(addr: &str) -> CallerKey {
        IdentityHasher::new("pepper").hash(addr).unwrap()
    }

    #[test]
    fn test_interval_gate() {
        let limiter = limiter(15);
        let caller = key("198.51.100.1");
        let t0 = Instant::now();

        assert!(limiter.check_at(&caller, t0).is_allowed());
        assert!(matches!(
            limiter.check_at(&caller, t0 + Duration::from_millis(500)),
            RateDecision::IntervalExceeded { .. }
        ));
        assert!(limiter.check_at(&caller, t0 + Duration::from_secs(1)).is_allowed());
    }

    #[test]
    fn test_callers_are_independent() {
        let limiter = limiter(15);
        let t0 = Instant::now();
        assert!(limiter.check_at(&key("198.51.100.1"), t0).is_allowed());
        assert!(limiter.check_at(&key("198.51.100.2"), t0).is_allowed());
        assert_eq!(limiter.tracked_callers(), 2);
    }

    #[test]
    fn test_daily_quota_and_reset() {
        let limiter = limiter(5);
        let caller = key("198.51.100.1");
        let t0 = Instant::now();

        for i in 0..5u64 {
            let decision = limiter.check_at(&caller, t0 + Duration::from_secs(2 * i));
            assert_eq!(
                decision,
                RateDecision::Allowed {
                    remaining_today: 4 - i as u32
                }
            );
        }
        assert!(matches!(
            limiter.check_at(&caller, t0 + Duration::from_secs(20)),
            RateDecision::DailyQuotaExceeded { .. }
        ));

        let next_day = t0 + Duration::from_secs(DAILY_WINDOW_SECS + 1);
        assert_eq!(
            limiter.check_at(&caller, next_day),
            RateDecision::Allowed { remaining_today: 4 }
        );
    }

    #[test]
    fn test_interval_rejection_does_not_consume_quota() {
        let limiter = limiter(5);
        let caller = key("198.51.100.1");
        let t0 = Instant::now();

        assert!(limiter.check_at(&caller, t0).is_allowed());
        for ms in [100, 200, 300, 400] {
            assert!(!limiter.check_at(&caller, t0 + Duration::from_millis(ms)).is_allowed());
        }
        assert_eq!(
            limiter.check_at(&caller, t0 + Duration::from_secs(1)),
            RateDecision::Allowed { remaining_today: 3 }
        );
    }

    #[test]
    fn test_purge_idle_callers() {
        let limiter = limiter(15);
        let t0 = Instant::now();
        limiter.check_at(&key("198.51.100.1"), t0);
        limiter.check_at(&key("198.51.100.2"), t0 + Duration::from_secs(DAILY_WINDOW_SECS));

        let removed = limiter.cleanup_at(t0 + Duration::from_secs(DAILY_WINDOW_SECS + 10));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_callers(), 1);
        assert_eq!(limiter.purged_total(), 1);
    }

    #[test]
    fn test_capacity_triggers_purge() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_tracked_callers: 2,
            ..RateLimitConfig::default()
        });
        let t0 = Instant::now();
        limiter.check_at(&key("a"), t0);
        limiter.check_at(&key("b"), t0);

        let later = t0 + Duration::from_secs(DAILY_WINDOW_SECS * 2);
        assert!(limiter.check_at(&key("c"), later).is_allowed());
        assert_eq!(limiter.tracked_callers(), 1);
    }

    #[test]
    fn test_table_never_exceeds_capacity() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_tracked_callers: 100,
            ..RateLimitConfig::default()
        });
        let t0 = Instant::now();

        for i in 0..300u64 {
            let caller = key(&format!("198.51.100.{}", i));
            assert!(limiter.check_at(&caller, t0 + Duration::from_millis(i)).is_allowed());
            assert!(limiter.tracked_callers() <= 100);
        }
        assert_eq!(limiter.purged_total(), 300 - limiter.tracked_callers() as u64);
    }

    #[test]
    fn test_full_table_evicts_least_recent_callers() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_tracked_callers: 100,
            ..RateLimitConfig::default()
        });
        let t0 = Instant::now();
        for i in 0..150u64 {
            limiter.check_at(&key(&format!("caller-{}", i)), t0 + Duration::from_millis(i));
        }

        let later = t0 + Duration::from_millis(200);
        // Most recent caller is still tracked and held by the interval gate
        assert!(matches!(
            limiter.check_at(&key("caller-149"), later),
            RateDecision::IntervalExceeded { .. }
        ));
        // Oldest caller was evicted and starts over with a fresh quota
        assert_eq!(
            limiter.check_at(&key("caller-0"), later),
            RateDecision::Allowed { remaining_today: 14 }
        );
    }

    #[test]
    fn test_concurrent_same_key_single_admission() {
        let limiter = Arc::new(limiter(15));
        let caller = key("198.51.100.1");
        let now = Instant::now();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = limiter.clone();
                let caller = caller.clone();
                std::thread::spawn(move || limiter.check_at(&caller, now).is_allowed())
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(admitted, 1);
    }
}
