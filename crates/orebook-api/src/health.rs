//! Health Check Module
//!
//! - `/health` - Basic health check (returns "ok")
//! - `/ready` - Readiness probe (checks that the data directory is readable)
//! - `/live` - Liveness probe (always healthy while the process is running)

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::AppState;

/// Health check response with detailed status
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<ComponentHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Health status enumeration
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Component health status
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Basic health check - always returns "ok" if the server is running
pub async fn health_check() -> &'static str {
    "ok"
}

/// Liveness probe - indicates if the application is running
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: HealthStatus::Healthy,
            storage: None,
            message: Some("Service is alive".to_string()),
        }),
    )
}

/// Readiness probe - indicates if the application is ready to serve traffic
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let storage = match check_storage_health(&state).await {
        Ok(latency_ms) => ComponentHealth {
            status: HealthStatus::Healthy,
            latency_ms: Some(latency_ms),
            message: None,
        },
        Err(e) => ComponentHealth {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            message: Some(e),
        },
    };

    let overall_status = storage.status;
    let status_code = match overall_status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let response = HealthResponse {
        status: overall_status,
        storage: Some(storage),
        message: if overall_status == HealthStatus::Healthy {
            Some("Service is ready".to_string())
        } else {
            Some("Service is not ready".to_string())
        },
    };

    tracing::debug!(status = ?overall_status, "Readiness check completed");

    (status_code, Json(response))
}

/// Check that the data directory can be listed
async fn check_storage_health(state: &AppState) -> Result<u64, String> {
    let start = std::time::Instant::now();
    let root = state.catalog.data_dir().root().to_path_buf();

    tokio::task::spawn_blocking(move || {
        std::fs::read_dir(&root)
            .map(|_| ())
            .map_err(|e| format!("Data directory {} is not readable: {}", root.display(), e))
    })
    .await
    .map_err(|e| format!("Task join error: {}", e))??;

    Ok(start.elapsed().as_millis() as u64)
}
