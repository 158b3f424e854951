//! Administrator console: audit trail, dataset sharing and upload, and
//! generic CRUD over every registered entity.

use crate::auth::{prepare_user_fields, PASSWORD_FIELD, PASSWORD_HASH_FIELD};
use crate::error::{
    bad_request, from_catalog_error, internal_error, invalid_fields, not_found, with_redirect,
    ApiError,
};
use crate::session::{AdminSession, RequestId};
use crate::{record_operation, AppState};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    Json,
};
use orebook_core::analytics::{sites_by_country as build_sites_by_country, SitesByCountry};
use orebook_core::audit::{AuditAction, AuditEntry};
use orebook_core::sharing::{DatasetShare, ShareScope};
use orebook_core::snapshot::SelectOption;
use orebook_core::{EntityKind, FieldValues, OrebookError, Record, Role};
use orebook_storage::AuditClearOutcome;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const UNKNOWN_ENTITY: &str = "Unknown entity";
pub const RECORD_NOT_FOUND: &str = "Not found";
pub const NO_FILE_UPLOADED: &str = "No file uploaded.";

#[derive(Debug, Serialize)]
pub struct AdminOverview {
    pub role: Role,
    pub logs: Vec<AuditEntry>,
    pub users: Vec<Record>,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct AuditTailResponse {
    pub entries: Vec<AuditEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub shared_type: String,
    pub shared_value: String,
}

#[derive(Debug, Serialize)]
pub struct SharesResponse {
    pub shares: Vec<DatasetShare>,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub filename: String,
    pub columns: Vec<String>,
    pub row_count: usize,
}

#[derive(Debug, Serialize)]
pub struct EntityListResponse {
    pub entity: &'static str,
    pub title: &'static str,
    pub id_field: &'static str,
    pub fields: Vec<&'static str>,
    pub items: Vec<Record>,
}

#[derive(Debug, Serialize)]
pub struct EntityFormResponse {
    pub entity: &'static str,
    pub title: &'static str,
    pub fields: Vec<&'static str>,
    pub selects: BTreeMap<&'static str, Vec<SelectOption>>,
}

#[derive(Debug, Serialize)]
pub struct EntityRecordResponse {
    pub entity: &'static str,
    pub record: Record,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: usize,
}

fn parse_entity(entity: &str, request_id: &str) -> Result<EntityKind, ApiError> {
    entity.parse::<EntityKind>().map_err(|_| {
        with_redirect(not_found(UNKNOWN_ENTITY.to_string(), request_id), "/admin")
    })
}

/// Hide password hashes from every response.
fn redact(kind: EntityKind, mut record: Record) -> Record {
    if kind == EntityKind::Users {
        record.remove(PASSWORD_HASH_FIELD);
    }
    record
}

/// Columns offered on the form; users get a plaintext password field.
fn form_fields(kind: EntityKind) -> Vec<&'static str> {
    kind.spec()
        .form_fields()
        .into_iter()
        .map(|field| {
            if kind == EntityKind::Users && field == PASSWORD_HASH_FIELD {
                PASSWORD_FIELD
            } else {
                field
            }
        })
        .collect()
}

/// Submitted values echoed on validation errors, without secrets.
fn echoed(mut values: FieldValues) -> FieldValues {
    values.remove(PASSWORD_FIELD);
    values.remove(PASSWORD_HASH_FIELD);
    values
}

fn write_error(
    err: OrebookError,
    kind: EntityKind,
    submitted: FieldValues,
    request_id: &str,
) -> ApiError {
    match err {
        OrebookError::InvalidField(errors) => invalid_fields(errors, echoed(submitted), request_id),
        OrebookError::NotFound(_) => with_redirect(
            not_found(RECORD_NOT_FOUND.to_string(), request_id),
            &format!("/admin/{}", kind),
        ),
        other => from_catalog_error(other, request_id),
    }
}

/// GET /api/v1/admin
pub async fn admin_overview(
    State(state): State<AppState>,
    AdminSession(session): AdminSession,
    request_id: RequestId,
) -> Result<Json<AdminOverview>, ApiError> {
    let logs = state
        .catalog
        .audit_tail(state.config.audit_tail_limit)
        .await
        .map_err(|e| from_catalog_error(e, request_id.as_str()))?;

    let users = state
        .catalog
        .snapshot()
        .records(EntityKind::Users)
        .iter()
        .cloned()
        .map(|u| redact(EntityKind::Users, u))
        .collect();

    Ok(Json(AdminOverview {
        role: session.role,
        logs,
        users,
    }))
}

/// GET /api/v1/admin/audit?limit=N
pub async fn audit_tail(
    State(state): State<AppState>,
    AdminSession(_session): AdminSession,
    request_id: RequestId,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditTailResponse>, ApiError> {
    let limit = query.limit.unwrap_or(state.config.audit_tail_limit);
    let entries = state
        .catalog
        .audit_tail(limit)
        .await
        .map_err(|e| from_catalog_error(e, request_id.as_str()))?;
    Ok(Json(AuditTailResponse { entries }))
}

/// POST /api/v1/admin/audit/clear
///
/// The cleared log holds a single `audit_cleared` entry naming the backup.
pub async fn clear_audit(
    State(state): State<AppState>,
    AdminSession(session): AdminSession,
    request_id: RequestId,
) -> Result<Json<AuditClearOutcome>, ApiError> {
    match state.catalog.clear_audit(session.username.clone()).await {
        Ok(outcome) => {
            record_operation("audit_log", "clear", true);
            Ok(Json(outcome))
        }
        Err(e) => {
            record_operation("audit_log", "clear", false);
            tracing::error!(error = %e, "Failed to clear audit log");
            Err(internal_error(
                format!("Failed to clear audit log: {}", e),
                request_id.as_str(),
            ))
        }
    }
}

/// POST /api/v1/admin/dataset/share
pub async fn share_dataset(
    State(state): State<AppState>,
    AdminSession(session): AdminSession,
    request_id: RequestId,
    uri: Uri,
    Json(request): Json<ShareRequest>,
) -> Result<(StatusCode, Json<DatasetShare>), ApiError> {
    let rid = request_id.as_str();
    let scope: ShareScope = request
        .shared_type
        .parse()
        .map_err(|e| from_catalog_error(e, rid))?;

    let share = state
        .catalog
        .grant_share(scope, request.shared_value, session.username.clone())
        .await
        .map_err(|e| from_catalog_error(e, rid))?;

    state
        .audit(
            &session.username,
            AuditAction::DatasetShare,
            uri.path(),
            &format!("Shared dataset with {}:{}", share.shared_type, share.shared_value),
        )
        .await;

    Ok((StatusCode::CREATED, Json(share)))
}

/// GET /api/v1/admin/dataset/shares
pub async fn list_shares(
    State(state): State<AppState>,
    AdminSession(_session): AdminSession,
    request_id: RequestId,
) -> Result<Json<SharesResponse>, ApiError> {
    let shares = state
        .catalog
        .shares()
        .await
        .map_err(|e| from_catalog_error(e, request_id.as_str()))?;
    Ok(Json(SharesResponse { shares }))
}

/// POST /api/v1/admin/dataset/upload?filename=NAME
///
/// The request body is the raw file: CSV, or an Excel workbook whose first
/// sheet is stored as CSV.
pub async fn upload_dataset(
    State(state): State<AppState>,
    AdminSession(session): AdminSession,
    request_id: RequestId,
    uri: Uri,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    let rid = request_id.as_str();
    let filename = query.filename.unwrap_or_default();
    if filename.is_empty() || body.is_empty() {
        return Err(bad_request(NO_FILE_UPLOADED.to_string(), rid));
    }

    let table = state
        .catalog
        .replace_dataset(filename.clone(), body.to_vec())
        .await
        .map_err(|e| {
            record_operation("uploaded_dataset", "replace", false);
            from_catalog_error(e, rid)
        })?;
    record_operation("uploaded_dataset", "replace", true);

    state
        .audit(
            &session.username,
            AuditAction::DatasetUpload,
            uri.path(),
            &format!("Uploaded {}", filename),
        )
        .await;

    Ok(Json(UploadResponse {
        filename,
        columns: table.columns,
        row_count: table.rows.len(),
    }))
}

/// GET /api/v1/admin/entities/:entity
pub async fn list_entity(
    State(state): State<AppState>,
    AdminSession(_session): AdminSession,
    request_id: RequestId,
    Path(entity): Path<String>,
) -> Result<Json<EntityListResponse>, ApiError> {
    let kind = parse_entity(&entity, request_id.as_str())?;
    let spec = kind.spec();
    let snapshot = state.catalog.snapshot();

    Ok(Json(EntityListResponse {
        entity: spec.name(),
        title: spec.title,
        id_field: spec.id_field(),
        fields: spec
            .fields()
            .iter()
            .copied()
            .filter(|f| !(kind == EntityKind::Users && *f == PASSWORD_HASH_FIELD))
            .collect(),
        items: snapshot
            .records(kind)
            .iter()
            .cloned()
            .map(|r| redact(kind, r))
            .collect(),
    }))
}

/// GET /api/v1/admin/forms/:entity
pub async fn entity_form(
    State(state): State<AppState>,
    AdminSession(_session): AdminSession,
    request_id: RequestId,
    Path(entity): Path<String>,
) -> Result<Json<EntityFormResponse>, ApiError> {
    let kind = parse_entity(&entity, request_id.as_str())?;
    let spec = kind.spec();

    Ok(Json(EntityFormResponse {
        entity: spec.name(),
        title: spec.title,
        fields: form_fields(kind),
        selects: state.catalog.snapshot().select_options(spec),
    }))
}

/// POST /api/v1/admin/entities/:entity
pub async fn create_entity(
    State(state): State<AppState>,
    AdminSession(session): AdminSession,
    request_id: RequestId,
    uri: Uri,
    Path(entity): Path<String>,
    Json(values): Json<FieldValues>,
) -> Result<(StatusCode, Json<EntityRecordResponse>), ApiError> {
    let rid = request_id.as_str();
    let kind = parse_entity(&entity, rid)?;

    let prepared = if kind == EntityKind::Users {
        let snapshot = state.catalog.snapshot();
        prepare_user_fields(
            values.clone(),
            true,
            snapshot.records(EntityKind::Users),
            state.config.bcrypt_cost,
            rid,
        )
        .await?
    } else {
        values.clone()
    };

    let record = match state.catalog.create(kind, prepared).await {
        Ok(record) => record,
        Err(e) => {
            record_operation(kind.as_str(), "create", false);
            return Err(write_error(e, kind, values, rid));
        }
    };
    record_operation(kind.as_str(), "create", true);

    let id = record.get_or_empty(kind.spec().id_field()).to_string();
    state
        .audit(
            &session.username,
            AuditAction::EntityAdd,
            uri.path(),
            &format!("Added {} {}", kind, id),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(EntityRecordResponse {
            entity: kind.as_str(),
            record: redact(kind, record),
        }),
    ))
}

/// GET /api/v1/admin/entities/:entity/:id
pub async fn get_entity(
    State(state): State<AppState>,
    AdminSession(_session): AdminSession,
    request_id: RequestId,
    Path((entity, id)): Path<(String, i64)>,
) -> Result<Json<EntityRecordResponse>, ApiError> {
    let rid = request_id.as_str();
    let kind = parse_entity(&entity, rid)?;

    let snapshot = state.catalog.snapshot();
    let record = snapshot.find(kind, id).cloned().ok_or_else(|| {
        with_redirect(
            not_found(RECORD_NOT_FOUND.to_string(), rid),
            &format!("/admin/{}", kind),
        )
    })?;

    Ok(Json(EntityRecordResponse {
        entity: kind.as_str(),
        record: redact(kind, record),
    }))
}

/// PUT /api/v1/admin/entities/:entity/:id
pub async fn update_entity(
    State(state): State<AppState>,
    AdminSession(session): AdminSession,
    request_id: RequestId,
    uri: Uri,
    Path((entity, id)): Path<(String, i64)>,
    Json(values): Json<FieldValues>,
) -> Result<Json<EntityRecordResponse>, ApiError> {
    let rid = request_id.as_str();
    let kind = parse_entity(&entity, rid)?;

    let prepared = if kind == EntityKind::Users {
        let snapshot = state.catalog.snapshot();
        prepare_user_fields(
            values.clone(),
            false,
            snapshot.records(EntityKind::Users),
            state.config.bcrypt_cost,
            rid,
        )
        .await?
    } else {
        values.clone()
    };

    let record = match state.catalog.update(kind, id, prepared).await {
        Ok(record) => record,
        Err(e) => {
            record_operation(kind.as_str(), "update", false);
            return Err(write_error(e, kind, values, rid));
        }
    };
    record_operation(kind.as_str(), "update", true);

    state
        .audit(
            &session.username,
            AuditAction::EntityEdit,
            uri.path(),
            &format!("Edited {} {}", kind, id),
        )
        .await;

    Ok(Json(EntityRecordResponse {
        entity: kind.as_str(),
        record: redact(kind, record),
    }))
}

/// DELETE /api/v1/admin/entities/:entity/:id
///
/// Deleting an unknown id succeeds with `deleted: 0` and is not audited.
pub async fn delete_entity(
    State(state): State<AppState>,
    AdminSession(session): AdminSession,
    request_id: RequestId,
    uri: Uri,
    Path((entity, id)): Path<(String, i64)>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let rid = request_id.as_str();
    let kind = parse_entity(&entity, rid)?;

    let deleted = state.catalog.delete(kind, id).await.map_err(|e| {
        record_operation(kind.as_str(), "delete", false);
        from_catalog_error(e, rid)
    })?;
    record_operation(kind.as_str(), "delete", true);

    if deleted > 0 {
        state
            .audit(
                &session.username,
                AuditAction::EntityDelete,
                uri.path(),
                &format!("Deleted {} {}", kind, id),
            )
            .await;
    }

    Ok(Json(DeleteResponse { deleted }))
}

/// GET /api/v1/admin/sites/by-country/:country_id
pub async fn sites_by_country(
    State(state): State<AppState>,
    AdminSession(_session): AdminSession,
    request_id: RequestId,
    Path(country_id): Path<i64>,
) -> Result<Json<SitesByCountry>, ApiError> {
    build_sites_by_country(&state.catalog.snapshot(), country_id)
        .map(Json)
        .map_err(|e| with_redirect(from_catalog_error(e, request_id.as_str()), "/admin/sites"))
}

/// DELETE /api/v1/admin/sites/by-country/:country_id
pub async fn delete_sites_by_country(
    State(state): State<AppState>,
    AdminSession(session): AdminSession,
    request_id: RequestId,
    uri: Uri,
    Path(country_id): Path<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = state
        .catalog
        .delete_sites_by_country(country_id)
        .await
        .map_err(|e| {
            record_operation("sites", "bulk_delete", false);
            from_catalog_error(e, request_id.as_str())
        })?;
    record_operation("sites", "bulk_delete", true);

    state
        .audit(
            &session.username,
            AuditAction::EntityBulkDelete,
            uri.path(),
            &format!("Deleted {} sites for country {}", deleted, country_id),
        )
        .await;

    Ok(Json(DeleteResponse { deleted }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_forms_take_plaintext_password() {
        let fields = form_fields(EntityKind::Users);
        assert!(fields.contains(&"Password"));
        assert!(!fields.contains(&"PasswordHash"));
        assert!(!fields.contains(&"UserID"));

        assert_eq!(
            form_fields(EntityKind::Sites),
            EntityKind::Sites.spec().form_fields()
        );
    }

    #[test]
    fn test_redact_only_touches_users() {
        let user = Record::from_pairs([("Username", "alice"), ("PasswordHash", "$2b$04$x")]);
        assert!(!redact(EntityKind::Users, user.clone()).contains("PasswordHash"));

        let country = Record::from_pairs([("CountryName", "Testland"), ("PasswordHash", "x")]);
        assert!(redact(EntityKind::Countries, country).contains("PasswordHash"));
    }

    #[test]
    fn test_unknown_entity_redirects_to_admin() {
        let (status, body) = parse_entity("volcanoes", "rid").unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "Unknown entity");
        assert_eq!(body.redirect.as_deref(), Some("/admin"));
        assert_eq!(parse_entity("sites", "rid").unwrap(), EntityKind::Sites);
    }
}
