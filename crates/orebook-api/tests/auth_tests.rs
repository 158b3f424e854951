//! Login, logout and role gate tests
//!
//! Run with: `cargo test -p orebook-api --test auth_tests`

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{setup, ADMIN, ANALYST, INVESTOR};
use serde_json::json;

#[tokio::test]
async fn test_login_issues_token_and_cookie() {
    let app = setup().await;

    let response = app
        .request(
            "POST",
            "/api/v1/login",
            Some(json!({ "username": "admin", "password": "admin-pw" })),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let token = response.body["token"].as_str().unwrap();
    assert!(token.starts_with("ob_"));
    assert_eq!(response.body["role"], "Administrator");

    let cookie = response.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with(&format!("orebook_session={}", token)));
    assert!(cookie.contains("HttpOnly"));

    assert_eq!(app.audit_actions(), vec!["login_success"]);
}

#[tokio::test]
async fn test_failed_logins_are_audited_with_reason() {
    let app = setup().await;

    let wrong_password = app
        .request(
            "POST",
            "/api/v1/login",
            Some(json!({ "username": "admin", "password": "nope" })),
            None,
        )
        .await;
    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);

    let unknown_user = app
        .request(
            "POST",
            "/api/v1/login",
            Some(json!({ "username": "mallory", "password": "x" })),
            None,
        )
        .await;
    assert_eq!(unknown_user.status, StatusCode::UNAUTHORIZED);
    // Same message either way
    assert_eq!(wrong_password.body["error"], unknown_user.body["error"]);

    let entries = app.state.catalog.data_dir().audit().entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, "login_failed");
    assert_eq!(entries[0].details, "Invalid password");
    assert_eq!(entries[1].username, "mallory");
    assert_eq!(entries[1].details, "Unknown username");
    assert!(app.state.sessions.is_empty());
}

#[tokio::test]
async fn test_plaintext_password_never_authenticates() {
    let app = setup().await;
    app.state
        .catalog
        .create(
            orebook_core::EntityKind::Users,
            common::values(&[("Username", "legacy"), ("PasswordHash", "secret"), ("RoleID", "1")]),
        )
        .await
        .unwrap();

    let response = app
        .request(
            "POST",
            "/api/v1/login",
            Some(json!({ "username": "legacy", "password": "secret" })),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unauthenticated_requests_redirect_to_login() {
    let app = setup().await;

    for path in ["/api/v1/dashboard", "/api/v1/map", "/api/v1/admin", "/api/v1/dataset"] {
        let response = app.request("GET", path, None, None).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{}", path);
        assert_eq!(response.body["redirect"], "/login");
        assert!(response.body["request_id"].as_str().is_some());
    }

    let response = app.get("/api/v1/dashboard", "ob_not-a-session").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_role_gates() {
    let app = setup().await;
    let investor = app.login(INVESTOR).await;
    let analyst = app.login(ANALYST).await;
    let admin = app.login(ADMIN).await;

    let response = app.get("/api/v1/admin", &investor).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "Administrator access required.");
    assert_eq!(response.body["redirect"], "/dashboard");

    let response = app.get("/api/v1/investor", &analyst).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "Investor access required.");

    // Administrator passes every gate
    assert_eq!(app.get("/api/v1/investor", &admin).await.status, StatusCode::OK);
    assert_eq!(app.get("/api/v1/investor", &investor).await.status, StatusCode::OK);
    assert_eq!(app.get("/api/v1/admin", &admin).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_session_cookie_is_accepted() {
    let app = setup().await;
    let token = app.login(ADMIN).await;

    let request = Request::builder()
        .uri("/api/v1/map")
        .header(header::COOKIE, format!("orebook_session={}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = setup().await;
    let token = app.login(ADMIN).await;

    let response = app
        .request("POST", "/api/v1/logout", None, Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.headers[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .contains("Max-Age=0"));

    let response = app.get("/api/v1/dashboard", &token).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let entries = app.state.catalog.data_dir().audit().entries().unwrap();
    let logout = entries.last().unwrap();
    assert_eq!(logout.action, "logout");
    assert_eq!(logout.details, "User logged out");
    assert_eq!(logout.path, "/api/v1/logout");
}
