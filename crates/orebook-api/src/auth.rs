//! Login, logout and password handling
//!
//! Passwords are verified with bcrypt on the blocking thread pool. Stored
//! values that are not bcrypt hashes never authenticate.

use crate::error::{internal_error, invalid_fields, unauthorized, ApiError};
use crate::session::{clear_session_cookie, session_cookie, RequestId, Session};
use crate::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::IntoResponse,
    Extension, Json,
};
use orebook_core::audit::AuditAction;
use orebook_core::validation::collect_violations;
use orebook_core::{EntityKind, FieldValues, Record};
use serde::{Deserialize, Serialize};

/// Generic message for every failed login.
pub const LOGIN_FAILED: &str = "Invalid username or password.";

/// Form field carrying a plaintext password on user create/edit.
pub const PASSWORD_FIELD: &str = "Password";
pub const PASSWORD_HASH_FIELD: &str = "PasswordHash";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub role: String,
    pub redirect: String,
}

/// Verify a password against a stored bcrypt hash.
///
/// Returns false for a mismatch and for stored values that are not bcrypt
/// hashes.
pub async fn verify_password(password: String, stored: String) -> Result<bool, String> {
    tokio::task::spawn_blocking(move || match bcrypt::verify(&password, &stored) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password is not a valid bcrypt hash");
            false
        }
    })
    .await
    .map_err(|e| format!("Task join error: {}", e))
}

/// Hash a password with the configured cost.
pub async fn hash_password(password: String, cost: u32) -> Result<String, String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(&password, cost).map_err(|e| e.to_string()))
        .await
        .map_err(|e| format!("Task join error: {}", e))?
}

/// Replace a submitted `Password` with its `PasswordHash`.
///
/// A password is required on create; a missing one is reported together
/// with any username violations against `existing` users. On edit an empty
/// password keeps the stored hash. A `PasswordHash` submitted directly is
/// ignored.
pub async fn prepare_user_fields(
    mut values: FieldValues,
    creating: bool,
    existing: &[Record],
    cost: u32,
    request_id: &str,
) -> Result<FieldValues, ApiError> {
    values.remove(PASSWORD_HASH_FIELD);
    let password = values.remove(PASSWORD_FIELD).unwrap_or_default();

    if password.is_empty() {
        if creating {
            let candidate = Record::from_pairs(values.clone());
            let mut errors = collect_violations(EntityKind::Users, &candidate, existing);
            errors.push("Password is required".to_string());
            return Err(invalid_fields(errors, values, request_id));
        }
        return Ok(values);
    }

    let hashed = hash_password(password, cost).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to hash password");
        internal_error("Failed to hash password".to_string(), request_id)
    })?;
    values.insert(PASSWORD_HASH_FIELD.to_string(), hashed);
    Ok(values)
}

/// POST /api/v1/login
pub async fn login(
    State(state): State<AppState>,
    request_id: RequestId,
    uri: Uri,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rid = request_id.as_str();
    let path = uri.path();
    let snapshot = state.catalog.snapshot();

    let Some(user) = snapshot.find_user(&request.username) else {
        state
            .audit(&request.username, AuditAction::LoginFailed, path, "Unknown username")
            .await;
        return Err(unauthorized(LOGIN_FAILED.to_string(), rid));
    };

    let stored = user.get_or_empty("PasswordHash").to_string();
    let role = snapshot.role_of(user);

    let verified = verify_password(request.password, stored)
        .await
        .map_err(|e| internal_error(e, rid))?;
    if !verified {
        state
            .audit(&request.username, AuditAction::LoginFailed, path, "Invalid password")
            .await;
        return Err(unauthorized(LOGIN_FAILED.to_string(), rid));
    }

    let Some(role) = role else {
        tracing::warn!(username = %request.username, "User has no resolvable role");
        state
            .audit(&request.username, AuditAction::LoginFailed, path, "Unknown role")
            .await;
        return Err(unauthorized(LOGIN_FAILED.to_string(), rid));
    };

    let session = state.sessions.create(&request.username, role);
    state
        .audit(&session.username, AuditAction::LoginSuccess, path, "Successful login")
        .await;
    tracing::info!(username = %session.username, role = %session.role, "User logged in");

    let response = LoginResponse {
        token: session.token.clone(),
        username: session.username.clone(),
        role: session.role.to_string(),
        redirect: "/dashboard".to_string(),
    };
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&session.token))],
        Json(response),
    ))
}

/// POST /api/v1/logout
///
/// Always clears the cookie; only an attached session is audited.
pub async fn logout(
    State(state): State<AppState>,
    session: Option<Extension<Session>>,
    uri: Uri,
) -> impl IntoResponse {
    if let Some(Extension(session)) = session {
        state.sessions.remove(&session.token);
        state
            .audit(&session.username, AuditAction::Logout, uri.path(), "User logged out")
            .await;
        tracing::info!(username = %session.username, "User logged out");
    }

    (
        StatusCode::OK,
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(serde_json::json!({ "redirect": "/login" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("s3cret".to_string(), 4).await.unwrap();
        assert!(verify_password("s3cret".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_plaintext_never_verifies() {
        assert!(!verify_password("s3cret".to_string(), "s3cret".to_string())
            .await
            .unwrap());
        assert!(!verify_password(String::new(), String::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_prepare_user_fields() {
        let mut values = FieldValues::new();
        values.insert("Username".into(), "alice".into());
        values.insert("PasswordHash".into(), "forged".into());

        let (status, body) = prepare_user_fields(values.clone(), true, &[], 4, "rid")
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.errors, vec!["Password is required"]);

        // Username rules are reported alongside the missing password
        let existing = [Record::from_pairs([("UserID", "1"), ("Username", "alice")])];
        let (_, body) = prepare_user_fields(values.clone(), true, &existing, 4, "rid")
            .await
            .unwrap_err();
        assert_eq!(body.errors, vec!["Username already exists", "Password is required"]);

        let mut blank = FieldValues::new();
        blank.insert("Username".into(), "  ".into());
        let (_, body) = prepare_user_fields(blank, true, &[], 4, "rid")
            .await
            .unwrap_err();
        assert_eq!(body.errors, vec!["Username is required", "Password is required"]);

        // Edit without a password leaves the stored hash alone
        let kept = prepare_user_fields(values.clone(), false, &[], 4, "rid").await.unwrap();
        assert!(!kept.contains_key("PasswordHash"));

        values.insert("Password".into(), "pw".into());
        let prepared = prepare_user_fields(values, true, &[], 4, "rid").await.unwrap();
        assert!(!prepared.contains_key("Password"));
        let hash = prepared.get("PasswordHash").unwrap();
        assert!(bcrypt::verify("pw", hash).unwrap());
    }
}
