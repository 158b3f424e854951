//! Error responses
//!
//! Handlers return `(StatusCode, Json<ErrorResponse>)` tuples built by the
//! helpers below. Every response carries the request id.

use axum::{http::StatusCode, Json};
use orebook_core::{FieldValues, OrebookError};
use serde::{Deserialize, Serialize};

/// Where a browser client should go after an authentication failure.
pub const LOGIN_REDIRECT: &str = "/login";

/// Landing page after an authorization failure or missing resource.
pub const DASHBOARD_REDIRECT: &str = "/dashboard";

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    /// Validation messages, in rule order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Submitted values, returned unchanged with validation errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted: Option<FieldValues>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, message: String, request_id: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message,
            request_id: request_id.to_string(),
            redirect: None,
            errors: Vec::new(),
            submitted: None,
        }),
    )
}

/// Replace the redirect hint of an error response.
pub fn with_redirect(mut error: ApiError, redirect: &str) -> ApiError {
    error.1 .0.redirect = Some(redirect.to_string());
    error
}

/// Helper function to create internal error response
pub fn internal_error(message: String, request_id: &str) -> ApiError {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, message, request_id)
}

/// Helper function to create not found error response
pub fn not_found(message: String, request_id: &str) -> ApiError {
    with_redirect(
        error_response(StatusCode::NOT_FOUND, message, request_id),
        DASHBOARD_REDIRECT,
    )
}

/// Helper function to create bad request error response
pub fn bad_request(message: String, request_id: &str) -> ApiError {
    error_response(StatusCode::BAD_REQUEST, message, request_id)
}

/// Not signed in: send the client to the login page.
pub fn unauthorized(message: String, request_id: &str) -> ApiError {
    with_redirect(
        error_response(StatusCode::UNAUTHORIZED, message, request_id),
        LOGIN_REDIRECT,
    )
}

/// Signed in without the required role: flash message plus dashboard redirect.
pub fn forbidden(message: String, request_id: &str) -> ApiError {
    with_redirect(
        error_response(StatusCode::FORBIDDEN, message, request_id),
        DASHBOARD_REDIRECT,
    )
}

/// Validation failure with the submitted values echoed back.
pub fn invalid_fields(errors: Vec<String>, submitted: FieldValues, request_id: &str) -> ApiError {
    let (status, Json(mut body)) = error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        errors.join("; "),
        request_id,
    );
    body.errors = errors;
    body.submitted = Some(submitted);
    (status, Json(body))
}

/// Map a catalog error to its response.
pub fn from_catalog_error(err: OrebookError, request_id: &str) -> ApiError {
    match err {
        OrebookError::NotFound(message) => not_found(message, request_id),
        OrebookError::InvalidField(errors) => {
            let (status, Json(mut body)) = error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                errors.join("; "),
                request_id,
            );
            body.errors = errors;
            (status, Json(body))
        }
        OrebookError::Unauthorized(message) => forbidden(message, request_id),
        OrebookError::Conflict(message) => {
            error_response(StatusCode::CONFLICT, message, request_id)
        }
        err @ (OrebookError::StorageIo(_) | OrebookError::Other(_)) => {
            tracing::error!(request_id = request_id, error = %err, "Catalog operation failed");
            internal_error(err.to_string(), request_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_errors_carry_redirects() {
        let (status, Json(body)) = unauthorized("Login required.".into(), "rid");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.redirect.as_deref(), Some("/login"));

        let (status, Json(body)) = forbidden("Administrator access required.".into(), "rid");
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.redirect.as_deref(), Some("/dashboard"));
        assert_eq!(body.request_id, "rid");
    }

    #[test]
    fn test_invalid_fields_echo_submission() {
        let mut submitted = FieldValues::new();
        submitted.insert("Latitude".into(), "95".into());

        let (status, Json(body)) = invalid_fields(
            vec!["Latitude must be between -90 and 90".into()],
            submitted.clone(),
            "rid",
        );
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.errors.len(), 1);
        assert_eq!(body.submitted, Some(submitted));
    }

    #[test]
    fn test_catalog_error_mapping() {
        let (status, _) = from_catalog_error(OrebookError::NotFound("x".into()), "r");
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, Json(body)) =
            from_catalog_error(OrebookError::invalid("Share value cannot be empty"), "r");
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.errors, vec!["Share value cannot be empty"]);
        assert!(body.submitted.is_none());

        let (status, _) = from_catalog_error(OrebookError::StorageIo("disk".into()), "r");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
