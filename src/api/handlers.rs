//! API Request Handlers

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::middleware::{RateLimitConfig, RateLimiter};
use super::types::*;
use crate::engine::{filter, sampler, stats};
use crate::models::config::ApiConfig;
use crate::models::errors::{AppError, AppResult};
use crate::providers::firebase::RecordStore;
use crate::utils::cache::{Dataset, DatasetCache};
use crate::utils::constants::APP_VERSION;
use crate::utils::identity::IdentityHasher;

/// Shared application state
pub struct AppState {
    pub config: ApiConfig,
    /// Result of validating `config` at startup; an error is served to every request
    pub config_status: AppResult<()>,
    pub hasher: IdentityHasher,
    pub limiter: Arc<RateLimiter>,
    pub cache: Arc<DatasetCache>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: ApiConfig, store: Arc<dyn RecordStore>) -> Self {
        let config_status = config.validate();
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig::from_api_config(&config)));
        let cache = Arc::new(DatasetCache::new(store, config.firebase_timeout()));

        Self {
            hasher: IdentityHasher::new(config.hash_key.clone()),
            config_status,
            limiter,
            cache,
            start_time: Instant::now(),
            config,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Cached dataset, or 404 when it is unavailable
    async fn dataset(&self) -> AppResult<Dataset> {
        let dataset = self.cache.get().await;
        if dataset.is_empty() {
            return Err(AppError::data_unavailable());
        }
        Ok(dataset)
    }
}

// ============================================
// Root / Health / Fallback
// ============================================

pub async fn root() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success(
        "Welcome to the API root. Please refer to the documentation before sending the request.",
    ))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    Json(ApiResponse::success(HealthData {
        status: "healthy".to_string(),
        version: APP_VERSION.to_string(),
        uptime_seconds: state.uptime_seconds(),
        dataset_loaded: state.cache.is_ready(),
        tracked_callers: state.limiter.tracked_callers(),
    }))
}

pub async fn invalid_endpoint() -> AppError {
    AppError::not_found("The requested endpoint is invalid.")
}

// ============================================
// Stats
// ============================================

pub async fn get_stats(State(state): State<Arc<AppState>>) -> AppResult<Json<ApiResponse<StatsData>>> {
    let dataset = state.dataset().await?;
    let start = Instant::now();
    let data = stats::compute(&dataset);

    debug!(
        records = data.meteorites_count,
        classes = data.recclasses.len(),
        compute_ms = start.elapsed().as_millis() as u64,
        "📊 Stats computed"
    );

    Ok(Json(ApiResponse::success(data)))
}

// ============================================
// Random sample
// ============================================

pub async fn get_random(
    State(state): State<Arc<AppState>>,
    FirstValueQuery(query): FirstValueQuery<RandomQuery>,
) -> AppResult<Response> {
    let dataset = state.dataset().await?;
    let max = state.config.max_random_meteorites;

    let sample = sampler::sample(
        dataset.as_slice(),
        query.count.as_deref(),
        state.config.default_random_number_of_meteorites,
        max,
    );

    let note = sample.exceeded_max.then(|| {
        format!(
            "Requested count exceeded max limit. Returned {} items.",
            max
        )
    });

    let data = RecordsData {
        count: sample.items.len(),
        meteorites: sample.items,
        note,
    };

    Ok(Json(ApiResponse::success(data)).into_response())
}

// ============================================
// Single record lookup
// ============================================

pub async fn get_meteorite(
    State(state): State<Arc<AppState>>,
    FirstValueQuery(query): FirstValueQuery<LookupQuery>,
) -> AppResult<Response> {
    // Parameter errors take precedence over data availability
    let lookup = query.into_lookup()?;
    let dataset = state.cache.get().await;

    let found = match &lookup {
        Lookup::Id(id) => filter::find_by_id(&dataset, id),
        Lookup::Name(name) => filter::find_by_name(&dataset, name),
    };

    let meteorite =
        found.ok_or_else(|| AppError::not_found("No meteorite found for the given identifier."))?;

    Ok(Json(ApiResponse::success(LookupData { meteorite })).into_response())
}

// ============================================
// Search
// ============================================

pub async fn search(
    State(state): State<Arc<AppState>>,
    FirstValueQuery(query): FirstValueQuery<SearchQuery>,
) -> AppResult<Response> {
    let spec = query.into_filter_spec(&state.config)?;
    let dataset = state.dataset().await?;

    let mut results = filter::apply(dataset.iter(), &spec);
    let matched = results.len();
    results.truncate(state.config.max_returned_search_results);

    info!(matched, returned = results.len(), "🔍 Search completed");

    let note = results
        .is_empty()
        .then(|| "No results found for the given criteria.".to_string());

    let data = RecordsData {
        count: results.len(),
        meteorites: results,
        note,
    };

    Ok(Json(ApiResponse::success(data)).into_response())
}
