//! Orebook API Library
//!
//! HTTP surface for the orebook record store: sessions and role gates,
//! read views for signed-in users, and the administrator CRUD console.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use orebook_core::audit::{AuditAction, AuditEntry};
use orebook_storage::Catalog;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod admin;
pub mod auth;
pub mod config;
pub mod error;
pub mod health;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod session;
pub mod views;

pub use config::ApiConfig;
pub use session::{Session, SessionStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub sessions: Arc<SessionStore>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(catalog: Catalog, config: ApiConfig) -> Self {
        Self {
            catalog,
            sessions: Arc::new(SessionStore::new()),
            config: Arc::new(config),
        }
    }

    /// Append an audit entry. A failed write is logged and counted but never
    /// fails the request that triggered it.
    pub async fn audit(&self, username: &str, action: AuditAction, path: &str, details: &str) {
        let entry = AuditEntry::new(username, action, path, details);
        if let Err(e) = self.catalog.append_audit(entry).await {
            tracing::error!(
                username = username,
                action = %action,
                error = %e,
                "Failed to write audit entry"
            );
            #[cfg(feature = "metrics")]
            metrics::AUDIT_WRITE_FAILURES_TOTAL.inc();
        }
    }
}

/// Record the outcome of a record store operation.
pub(crate) fn record_operation(entity: &str, operation: &str, success: bool) {
    #[cfg(feature = "metrics")]
    metrics::record_store_operation(entity, operation, if success { "success" } else { "error" });
    #[cfg(not(feature = "metrics"))]
    let _ = (entity, operation, success);
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let app = Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::liveness_check))
        .route("/ready", get(health::readiness_check))
        .route("/api/v1/login", post(auth::login))
        .route("/api/v1/logout", post(auth::logout))
        .route("/api/v1/dashboard", get(views::dashboard))
        .route("/api/v1/investor", get(views::investor_dashboard))
        .route("/api/v1/map", get(views::map_view))
        .route("/api/v1/countries/:id/profile", get(views::country_profile))
        .route("/api/v1/dataset", get(views::dataset_view))
        .route("/api/v1/admin", get(admin::admin_overview))
        .route("/api/v1/admin/audit", get(admin::audit_tail))
        .route("/api/v1/admin/audit/clear", post(admin::clear_audit))
        .route("/api/v1/admin/dataset/share", post(admin::share_dataset))
        .route("/api/v1/admin/dataset/shares", get(admin::list_shares))
        .route("/api/v1/admin/dataset/upload", post(admin::upload_dataset))
        .route(
            "/api/v1/admin/entities/:entity",
            get(admin::list_entity).post(admin::create_entity),
        )
        .route("/api/v1/admin/forms/:entity", get(admin::entity_form))
        .route(
            "/api/v1/admin/entities/:entity/:id",
            get(admin::get_entity)
                .put(admin::update_entity)
                .delete(admin::delete_entity),
        )
        .route(
            "/api/v1/admin/sites/by-country/:country_id",
            get(admin::sites_by_country).delete(admin::delete_sites_by_country),
        );

    #[cfg(feature = "metrics")]
    let app = app
        .route("/metrics", get(metrics::metrics_handler))
        .layer(middleware::from_fn(metrics::track_metrics));

    app.layer(middleware::from_fn_with_state(
        state.clone(),
        session::session_middleware,
    ))
    .layer(middleware::from_fn(session::request_id_middleware))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .with_state(state)
}
