//! Meteorite API Server
//!
//! Read-only REST API over the meteorite landings dataset
//!
//! Usage:
//!   cargo run --bin meteorite_api
//!
//! Environment:
//!   FIREBASE_HOST_LINK, FIREBASE_HIDDEN_PATH, HASH_KEY - required credentials
//!   PORT / METEORITE_API_PORT - Server port (default: 8080)
//!   METEORITE_API_HOST        - Server host (default: 0.0.0.0)
//!   RUST_LOG                  - Log level (default: info)

use meteorite_api::api::{create_router, start_cleanup_task, AppState};
use meteorite_api::utils::constants::{APP_NAME, APP_VERSION};
use meteorite_api::{ApiConfig, FirebaseStore, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = ApiConfig::from_env();
    if let Err(e) = config.validate() {
        // Keep serving: every request answers 500 until the environment is fixed
        error!(code = e.code_str(), error = %e, "⚠️ Configuration unusable");
    }

    let store = Arc::new(FirebaseStore::new(
        config.firebase_url.clone(),
        config.firebase_hidden_path.clone(),
        config.firebase_timeout(),
    ));

    let state = Arc::new(AppState::new(config, store));

    // Start background cleanup task for rate limiter
    let cleanup = start_cleanup_task(state.limiter.clone());
    info!("🧹 Background cleanup task started");

    let app = create_router(state.clone());

    let server = ServerConfig::from_env();
    let addr: SocketAddr = format!("{}:{}", server.host, server.port).parse()?;

    info!("☄️ {} v{} starting on http://{}", APP_NAME, APP_VERSION, addr);
    info!("Endpoints:");
    info!("  GET /stats   - Dataset statistics");
    info!("  GET /random  - Random sample (?count=)");
    info!("  GET /get     - Single record (?id= | ?name=)");
    info!("  GET /search  - Filtered search");
    info!("  GET /health  - Health check");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await?;

    info!("🛑 Shutdown signal received, cleaning up...");
    cleanup.abort();

    let cache = state.cache.stats();
    info!("   Records cached: {}", cache.records);
    info!(
        "   Loads started: {} (ok: {}, failed: {})",
        cache.loads_started, cache.loads_succeeded, cache.loads_failed
    );
    info!("   Cache hits: {}", cache.hits);
    info!("   Tracked callers: {}", state.limiter.tracked_callers());
    info!("   Idle callers purged: {}", state.limiter.purged_total());

    info!("👋 {} shutdown complete", APP_NAME);

    Ok(())
}
