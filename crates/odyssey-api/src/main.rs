//! Odyssey API server entry point.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use odyssey_api::config::ServerConfig;
use odyssey_api::gemini::GeminiGenerator;
use odyssey_api::routes;
use odyssey_api::state::AppState;
use odyssey_core::clock::{Sleeper, SystemClock, TokioSleeper};
use odyssey_core::generator::{Generator, OfflineGenerator};
use odyssey_core::storage::{FileStore, KeyValueStore, MemoryStore};
use odyssey_narrative::domain::registry::SceneRegistry;
use odyssey_preload::preloader::Preloader;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Odyssey API server");

    let config = ServerConfig::from_env()?;
    let registry = Arc::new(SceneRegistry::builtin()?);
    tracing::info!(scenes = registry.len(), "scene registry loaded");

    let storage: Arc<dyn KeyValueStore> = match &config.data_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "using file-backed storage");
            Arc::new(FileStore::open(dir)?)
        }
        None => Arc::new(MemoryStore::new()),
    };

    let generator: Arc<dyn Generator> = match &config.gemini_api_key {
        Some(key) => Arc::new(GeminiGenerator::new(key.clone())?),
        None => {
            tracing::warn!("GEMINI_API_KEY not set; serving static fallback content only");
            Arc::new(OfflineGenerator)
        }
    };

    let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);
    let preloader = Preloader::for_registry(
        &registry,
        Arc::clone(&generator),
        Arc::clone(&storage),
        Arc::clone(&sleeper),
        config.preload.clone(),
    );

    let app_state = AppState::new(
        registry,
        storage,
        generator,
        preloader,
        Arc::new(SystemClock),
        sleeper,
    );

    let _sweeper =
        app_state.spawn_idle_sweeper(config.session_idle_timeout, config.session_sweep_interval);

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/sessions", routes::sessions::router())
        .nest("/api/v1", routes::preload::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("invalid HOST:PORT combination: {e}"))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
