//! Single-flight dataset cache
//!
//! The whole dataset is read from the remote store once and shared by every
//! request. Requests that arrive while the read is in flight wait for that
//! same read instead of starting their own.
//!
//! States:
//! - `Empty`: nothing loaded yet, or the last load failed
//! - `Loading`: one spawned load, shared by all waiters
//! - `Ready`: materialized records, served until `invalidate()`

use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::models::types::Meteorite;
use crate::providers::firebase::RecordStore;

/// Shared, read-only record collection
pub type Dataset = Arc<Vec<Meteorite>>;

/// `None` when the load failed or produced nothing
type LoadOutcome = Option<Dataset>;

enum CacheState {
    Empty,
    Loading {
        generation: u64,
        outcome: Shared<BoxFuture<'static, LoadOutcome>>,
    },
    Ready(Dataset),
}

/// Loads the dataset at most once at a time and keeps it for the process lifetime
pub struct DatasetCache {
    store: Arc<dyn RecordStore>,
    timeout: Duration,
    state: Mutex<CacheState>,
    generation: AtomicU64,
    /// Counters for monitoring
    loads_started: AtomicU64,
    loads_succeeded: AtomicU64,
    loads_failed: AtomicU64,
    hits: AtomicU64,
}

impl DatasetCache {
    pub fn new(store: Arc<dyn RecordStore>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            state: Mutex::new(CacheState::Empty),
            generation: AtomicU64::new(0),
            loads_started: AtomicU64::new(0),
            loads_succeeded: AtomicU64::new(0),
            loads_failed: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        // A panic while holding the lock cannot leave the enum half-written.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the full collection, loading it if needed.
    ///
    /// A failed load yields an empty collection for this call and leaves the
    /// cache empty, so the next call retries.
    pub async fn get(&self) -> Dataset {
        let (generation, outcome) = {
            let mut state = self.lock_state();
            match &*state {
                CacheState::Ready(dataset) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return dataset.clone();
                }
                CacheState::Loading { generation, outcome } => {
                    debug!(generation, "⏳ Joining in-flight dataset load");
                    (*generation, outcome.clone())
                }
                CacheState::Empty => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                    let outcome = self.spawn_load(generation);
                    *state = CacheState::Loading {
                        generation,
                        outcome: outcome.clone(),
                    };
                    (generation, outcome)
                }
            }
        };

        let result = outcome.await;
        self.settle(generation, &result);
        result.unwrap_or_default()
    }

    /// Start the remote read on its own task so it completes even if every
    /// waiting request is dropped.
    fn spawn_load(&self, generation: u64) -> Shared<BoxFuture<'static, LoadOutcome>> {
        self.loads_started.fetch_add(1, Ordering::Relaxed);
        let store = self.store.clone();
        let timeout = self.timeout;

        let handle = tokio::spawn(async move {
            let start = Instant::now();
            info!(generation, "📥 Loading dataset from remote store");

            match tokio::time::timeout(timeout, store.fetch_all()).await {
                Ok(Ok(Some(records))) if !records.is_empty() => {
                    let records: Vec<Meteorite> =
                        records.into_iter().map(Meteorite::hydrate).collect();
                    info!(
                        generation,
                        records = records.len(),
                        latency_ms = start.elapsed().as_millis() as u64,
                        "✅ Dataset loaded"
                    );
                    Some(Arc::new(records))
                }
                Ok(Ok(_)) => {
                    warn!(generation, "📭 Remote store holds no records");
                    None
                }
                Ok(Err(e)) => {
                    warn!(
                        generation,
                        code = e.code_str(),
                        retryable = e.code.is_retryable(),
                        error = %e,
                        "❌ Dataset load failed"
                    );
                    None
                }
                Err(_) => {
                    warn!(generation, timeout_ms = timeout.as_millis() as u64, "⌛ Dataset load timed out");
                    None
                }
            }
        });

        handle
            .map(|joined| joined.ok().flatten())
            .boxed()
            .shared()
    }

    /// Move out of `Loading` once its outcome is known. Only the load that is
    /// still current may change the state.
    fn settle(&self, generation: u64, result: &LoadOutcome) {
        let mut state = self.lock_state();
        let current = matches!(
            &*state,
            CacheState::Loading { generation: g, .. } if *g == generation
        );
        if !current {
            return;
        }

        *state = match result {
            Some(dataset) => {
                self.loads_succeeded.fetch_add(1, Ordering::Relaxed);
                CacheState::Ready(dataset.clone())
            }
            None => {
                self.loads_failed.fetch_add(1, Ordering::Relaxed);
                CacheState::Empty
            }
        };
    }

    /// Drop the cached collection; the next `get()` reloads.
    pub fn invalidate(&self) {
        let mut state = self.lock_state();
        if matches!(&*state, CacheState::Ready(_)) {
            *state = CacheState::Empty;
            info!("🗑️ Dataset cache invalidated");
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(&*self.lock_state(), CacheState::Ready(_))
    }

    /// Get statistik cache
    pub fn stats(&self) -> CacheStats {
        let records = match &*self.lock_state() {
            CacheState::Ready(dataset) => dataset.len(),
            _ => 0,
        };

        CacheStats {
            records,
            loads_started: self.loads_started.load(Ordering::Relaxed),
            loads_succeeded: self.loads_succeeded.load(Ordering::Relaxed),
            loads_failed: self.loads_failed.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub records: usize,
    pub loads_started: u64,
    pub loads_succeeded: u64,
    pub loads_failed: u64,
    pub hits: u64,
}
