//! Sessions and role gates
//!
//! **Flow**:
//! 1. `request_id_middleware` tags every request with a uuid.
//! 2. `session_middleware` resolves the session token (Bearer header or
//!    `orebook_session` cookie) and attaches the [`Session`] to request
//!    extensions. It never rejects a request.
//! 3. Handlers ask for [`Authenticated`], [`AdminSession`] or
//!    [`InvestorSession`]; the extractors reject with 401 (no session) or
//!    403 (wrong role).
//!
//! Sessions live in memory only and are lost on restart.

use crate::error::{forbidden, unauthorized, ApiError};
use crate::AppState;
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderValue},
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use orebook_core::Role;
use rand::RngCore;
use serde::Serialize;

/// Prefix of every session token.
pub const TOKEN_PREFIX: &str = "ob_";

/// Cookie carrying the session token for browser clients.
pub const SESSION_COOKIE: &str = "orebook_session";

pub const LOGIN_REQUIRED: &str = "Login required.";
pub const ADMIN_REQUIRED: &str = "Administrator access required.";
pub const INVESTOR_REQUIRED: &str = "Investor access required.";

/// Request id attached by [`request_id_middleware`].
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestId {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(|| RequestId(uuid::Uuid::new_v4().to_string())))
    }
}

/// An authenticated user.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    #[serde(skip)]
    pub token: String,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// In-memory session table keyed by token.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for `username`.
    pub fn create(&self, username: &str, role: Role) -> Session {
        let session = Session {
            token: generate_token(),
            username: username.to_string(),
            role,
            created_at: Utc::now(),
        };
        self.sessions.insert(session.token.clone(), session.clone());
        tracing::debug!(username = %session.username, role = %session.role, "Created session");
        session
    }

    pub fn get(&self, token: &str) -> Option<Session> {
        self.sessions.get(token).map(|s| s.clone())
    }

    /// Remove a session; returns it if it existed.
    pub fn remove(&self, token: &str) -> Option<Session> {
        self.sessions.remove(token).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Generate a new session token: prefix + 32 random bytes, hex encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("{}{}", TOKEN_PREFIX, hex::encode(bytes))
}

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax",
        SESSION_COOKIE, token
    )
}

/// `Set-Cookie` value that expires the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Extract a session token from request headers.
///
/// Checks (in order):
/// 1. Authorization header: "Bearer TOKEN"
/// 2. Cookie: `orebook_session=TOKEN`
pub fn extract_session_token(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookies) = cookie_header.to_str() else {
            continue;
        };
        for pair in cookies.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                if name == SESSION_COOKIE && !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }

    None
}

/// Tag the request with a uuid and echo it in `x-request-id`.
pub async fn request_id_middleware(
    mut req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    req.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Attach the caller's [`Session`] when the token is known. Unknown or
/// missing tokens pass through; the handler's gate decides.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    if let Some(token) = extract_session_token(req.headers()) {
        match state.sessions.get(&token) {
            Some(session) => {
                req.extensions_mut().insert(session);
            }
            None => {
                tracing::debug!("Unknown session token (not attaching session)");
            }
        }
    }

    next.run(req).await
}

fn request_id_of(parts: &Parts) -> String {
    parts
        .extensions
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Fail unless a session is attached.
pub fn require_authenticated(parts: &Parts) -> Result<Session, ApiError> {
    parts
        .extensions
        .get::<Session>()
        .cloned()
        .ok_or_else(|| unauthorized(LOGIN_REQUIRED.to_string(), &request_id_of(parts)))
}

/// Fail unless the session's role is in `allowed`. Administrator passes
/// every check.
pub fn require_role(parts: &Parts, allowed: &[Role], message: &str) -> Result<Session, ApiError> {
    let session = require_authenticated(parts)?;
    if session.role.satisfies(allowed) {
        Ok(session)
    } else {
        tracing::warn!(
            username = %session.username,
            role = %session.role,
            path = %parts.uri.path(),
            "Role check failed"
        );
        Err(forbidden(message.to_string(), &request_id_of(parts)))
    }
}

/// Any signed-in user.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Session);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_authenticated(parts).map(Authenticated)
    }
}

/// Administrator sessions only.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Session);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_role(parts, &[Role::Administrator], ADMIN_REQUIRED).map(AdminSession)
    }
}

/// Investor (or Administrator) sessions.
#[derive(Debug, Clone)]
pub struct InvestorSession(pub Session);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for InvestorSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_role(parts, &[Role::Investor], INVESTOR_REQUIRED).map(InvestorSession)
    }
}
