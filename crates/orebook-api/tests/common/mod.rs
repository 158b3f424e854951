//! Shared test infrastructure for the API integration tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use orebook_api::{build_router, ApiConfig, AppState};
use orebook_core::{EntityKind, FieldValues};
use orebook_storage::{Catalog, DataDir};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const ADMIN: (&str, &str) = ("admin", "admin-pw");
pub const INVESTOR: (&str, &str) = ("ivy", "investor-pw");
pub const ANALYST: (&str, &str) = ("ana", "analyst-pw");

/// Router over a fresh, seeded data directory.
pub struct TestApp {
    pub tmp: TempDir,
    pub state: AppState,
    pub router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub fn values(pairs: &[(&str, &str)]) -> FieldValues {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn add_user(dir: &DataDir, (username, password): (&str, &str), role_id: &str) {
    let hash = bcrypt::hash(password, 4).unwrap();
    dir.create(
        EntityKind::Users,
        &values(&[
            ("Username", username),
            ("PasswordHash", hash.as_str()),
            ("RoleID", role_id),
        ]),
    )
    .unwrap();
}

/// Data directory with an admin, an investor, an analyst (unknown role
/// name) and a little reference data.
pub async fn setup() -> TestApp {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("data");

    let (dir, _) = DataDir::init(&root, false).unwrap();
    dir.roles()
        .append(orebook_core::Record::from_pairs([
            ("RoleID", "3"),
            ("RoleName", "Analyst"),
        ]))
        .unwrap();
    add_user(&dir, ADMIN, "1");
    add_user(&dir, INVESTOR, "2");
    add_user(&dir, ANALYST, "3");

    dir.create(
        EntityKind::Countries,
        &values(&[("CountryName", "Testland"), ("GDP_BillionUSD", "10")]),
    )
    .unwrap();
    dir.create(EntityKind::Minerals, &values(&[("MineralName", "Cobalt")]))
        .unwrap();
    for (year, tonnes, export) in [("2022", "100", "1.0"), ("2023", "150", "1.5")] {
        dir.create(
            EntityKind::Production,
            &values(&[
                ("Year", year),
                ("CountryID", "1"),
                ("MineralID", "1"),
                ("Production_tonnes", tonnes),
                ("ExportValue_BillionUSD", export),
            ]),
        )
        .unwrap();
    }

    let catalog = Catalog::from_data_dir(dir).await.unwrap();
    let config = ApiConfig {
        data_dir: root,
        bcrypt_cost: 4,
        ..Default::default()
    };
    let state = AppState::new(catalog, config);
    let router = build_router(state.clone());

    TestApp { tmp, state, router }
}

impl TestApp {
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .uri(path)
            .method(method)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(v) => Body::from(serde_json::to_string(&v).unwrap()),
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()));
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Upload raw file bytes as the shared dataset.
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>, token: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/v1/admin/dataset/upload?filename={}", filename))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(bytes))
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, path: &str, token: &str) -> TestResponse {
        self.request("GET", path, None, Some(token)).await
    }

    /// Log in and return the session token.
    pub async fn login(&self, (username, password): (&str, &str)) -> String {
        let response = self
            .request(
                "POST",
                "/api/v1/login",
                Some(serde_json::json!({ "username": username, "password": password })),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);
        response.body["token"].as_str().unwrap().to_string()
    }

    /// Audit actions currently on disk, oldest first.
    pub fn audit_actions(&self) -> Vec<String> {
        self.state
            .catalog
            .data_dir()
            .audit()
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect()
    }
}
