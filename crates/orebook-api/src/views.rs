//! Read views for signed-in users

use crate::error::{forbidden, from_catalog_error, ApiError};
use crate::session::{Authenticated, InvestorSession, RequestId};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::Uri,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use orebook_core::analytics::{
    country_profile as build_country_profile, dashboard_summary, investor_overview, map_markers,
    CountryProfile, DashboardSummary, InvestorOverview,
};
use orebook_core::audit::AuditAction;
use orebook_core::views::MapMarker;
use orebook_core::{EntityKind, Record, Role};
use orebook_storage::DatasetTable;
use serde::Serialize;

/// Where investors land instead of the general dashboard.
pub const INVESTOR_DASHBOARD: &str = "/api/v1/investor";

pub const DATASET_NOT_SHARED: &str = "Dataset not shared with you.";

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub role: Role,
    pub summary: DashboardSummary,
    pub minerals: Vec<Record>,
    pub countries: Vec<Record>,
}

#[derive(Debug, Serialize)]
pub struct InvestorResponse {
    pub role: Role,
    #[serde(flatten)]
    pub overview: InvestorOverview,
}

#[derive(Debug, Serialize)]
pub struct MapResponse {
    pub markers: Vec<MapMarker>,
}

#[derive(Debug, Serialize)]
pub struct DatasetResponse {
    pub role: Role,
    #[serde(flatten)]
    pub dataset: DatasetTable,
}

/// GET /api/v1/dashboard
///
/// Investors are redirected to the investor dashboard without a page view.
pub async fn dashboard(
    State(state): State<AppState>,
    Authenticated(session): Authenticated,
    uri: Uri,
) -> Response {
    if session.role == Role::Investor {
        return Redirect::to(INVESTOR_DASHBOARD).into_response();
    }

    state
        .audit(&session.username, AuditAction::PageView, uri.path(), "Visited dashboard")
        .await;

    let snapshot = state.catalog.snapshot();
    Json(DashboardResponse {
        role: session.role,
        summary: dashboard_summary(&snapshot),
        minerals: snapshot.records(EntityKind::Minerals).to_vec(),
        countries: snapshot.records(EntityKind::Countries).to_vec(),
    })
    .into_response()
}

/// GET /api/v1/investor
pub async fn investor_dashboard(
    State(state): State<AppState>,
    InvestorSession(session): InvestorSession,
    uri: Uri,
) -> Json<InvestorResponse> {
    state
        .audit(
            &session.username,
            AuditAction::PageView,
            uri.path(),
            "Visited investor dashboard",
        )
        .await;

    let snapshot = state.catalog.snapshot();
    Json(InvestorResponse {
        role: session.role,
        overview: investor_overview(&snapshot, state.config.investor_years_window),
    })
}

/// GET /api/v1/map
pub async fn map_view(
    State(state): State<AppState>,
    Authenticated(session): Authenticated,
    uri: Uri,
) -> Json<MapResponse> {
    state
        .audit(&session.username, AuditAction::PageView, uri.path(), "Viewed map")
        .await;

    Json(MapResponse {
        markers: map_markers(&state.catalog.snapshot()),
    })
}

/// GET /api/v1/countries/:id/profile
pub async fn country_profile(
    State(state): State<AppState>,
    Authenticated(session): Authenticated,
    request_id: RequestId,
    uri: Uri,
    Path(country_id): Path<i64>,
) -> Result<Json<CountryProfile>, ApiError> {
    state
        .audit(
            &session.username,
            AuditAction::PageView,
            uri.path(),
            &format!("Viewed country {}", country_id),
        )
        .await;

    build_country_profile(&state.catalog.snapshot(), country_id)
        .map(Json)
        .map_err(|e| from_catalog_error(e, request_id.as_str()))
}

/// GET /api/v1/dataset
pub async fn dataset_view(
    State(state): State<AppState>,
    Authenticated(session): Authenticated,
    request_id: RequestId,
    uri: Uri,
) -> Result<Json<DatasetResponse>, ApiError> {
    let visible = state
        .catalog
        .is_dataset_visible(session.username.clone(), session.role.clone())
        .await;
    if !visible {
        return Err(forbidden(DATASET_NOT_SHARED.to_string(), request_id.as_str()));
    }

    state
        .audit(
            &session.username,
            AuditAction::PageView,
            uri.path(),
            "Viewed uploaded dataset",
        )
        .await;

    let dataset = state
        .catalog
        .dataset()
        .await
        .map_err(|e| from_catalog_error(e, request_id.as_str()))?;

    Ok(Json(DatasetResponse {
        role: session.role,
        dataset,
    }))
}
