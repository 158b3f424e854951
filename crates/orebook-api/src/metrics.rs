//! Prometheus metrics for the orebook API
//!
//! This module is only compiled when the `metrics` feature is enabled.
//!
//! Exposed metrics:
//! - `http_requests_total` - Counter for total HTTP requests
//! - `http_request_duration_seconds` - Histogram for request latencies
//! - `record_store_operations_total` - Counter for record store writes per entity
//! - `audit_write_failures_total` - Counter for audit entries that could not be written

use axum::{
    extract::{MatchedPath, Request},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec, Encoder,
    HistogramVec, TextEncoder,
};
use std::time::Instant;

lazy_static! {
    /// Counter for total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// Histogram for HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latency in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    /// Counter for record store operations (create, update, delete, ...)
    pub static ref RECORD_STORE_OPERATIONS_TOTAL: CounterVec = register_counter_vec!(
        "record_store_operations_total",
        "Total number of record store operations",
        &["entity", "operation", "status"]
    )
    .unwrap();

    /// Counter for audit entries lost to write failures
    pub static ref AUDIT_WRITE_FAILURES_TOTAL: Counter = register_counter!(
        "audit_write_failures_total",
        "Total number of audit entries that failed to persist"
    )
    .unwrap();
}

/// Axum middleware to track HTTP request metrics
pub async fn track_metrics(req: Request, next: Next) -> impl IntoResponse {
    let start = Instant::now();
    let method = req.method().to_string();
    // Matched route template keeps label cardinality bounded
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;
    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Handler for the `/metrics` endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", encoder.format_type())],
            buffer,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

/// Record a record store operation metric
pub fn record_store_operation(entity: &str, operation: &str, status: &str) {
    RECORD_STORE_OPERATIONS_TOTAL
        .with_label_values(&[entity, operation, status])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_store_operation_increments() {
        let before = RECORD_STORE_OPERATIONS_TOTAL
            .with_label_values(&["sites", "create", "success"])
            .get();
        record_store_operation("sites", "create", "success");
        let after = RECORD_STORE_OPERATIONS_TOTAL
            .with_label_values(&["sites", "create", "success"])
            .get();
        assert_eq!(after, before + 1.0);
    }

    #[tokio::test]
    async fn test_metrics_handler_exposes_counters() {
        record_store_operation("countries", "delete", "success");
        AUDIT_WRITE_FAILURES_TOTAL.inc_by(0.0);

        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("record_store_operations_total"));
        assert!(text.contains("audit_write_failures_total"));
    }
}
