//! Orebook API Server
//!
//! REST API over the orebook CSV data directory.

use orebook_api::{build_router, ApiConfig, AppState};
use orebook_storage::Catalog;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match ApiConfig::from_env().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Using data directory: {}", config.data_dir.display());

    let catalog = Catalog::open(&config.data_dir).await.unwrap_or_else(|e| {
        tracing::error!("Failed to open data directory: {}", e);
        std::process::exit(1);
    });

    let snapshot = catalog.snapshot();
    if snapshot.records(orebook_core::EntityKind::Users).is_empty() {
        tracing::warn!("No users found; run `orebook init --admin-username ...` to create one");
    }

    let port = config.port;
    let app = build_router(AppState::new(catalog, config));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Orebook API listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
