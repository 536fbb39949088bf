//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a mock generation provider and compositor injected, backed by a
//! SQLite store in a temporary directory.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use kiosk_core::{
    create_authenticator, load_config_from_str,
    provider::SubTaskStatus,
    testing::{MockCompositor, MockGenerationProvider},
    AccessTokenSigner, Authenticator, CredentialCache, Kiosk, KvStore, SqliteKvStore,
};
use kiosk_server::state::AppState;

/// Config with every guard open.
pub const OPEN_CONFIG: &str = r#"
[auth]
method = "none"
require_access_token = false
"#;

/// Config with a management token and access tokens required.
pub const GUARDED_CONFIG: &str = r#"
[auth]
method = "token"
management_token = "mgmt-secret"
"#;

/// Test fixture for E2E testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_task_creation() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/tasks/styled_image/new", json!({
///         "image": "https://uploads.example/a.jpg"
///     })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock provider - control sub-task statuses
    pub provider: Arc<MockGenerationProvider>,
    /// Mock compositor - inspect compositions
    pub compositor: Arc<MockCompositor>,
    pub state: Arc<AppState>,
    /// Temporary directory holding the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    /// The `data` member of the response envelope.
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }
}

impl TestFixture {
    /// Create a new test fixture with every guard open.
    pub async fn new() -> Self {
        Self::with_config(OPEN_CONFIG).await
    }

    /// Create a test fixture from a TOML config.
    pub async fn with_config(toml: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = load_config_from_str(toml).expect("Invalid test config");
        config.database.path = temp_dir.path().join("test.db");

        let store: Arc<dyn KvStore> = Arc::new(
            SqliteKvStore::new(&config.database.path).expect("Failed to create store"),
        );
        let provider = Arc::new(MockGenerationProvider::new());
        let compositor = Arc::new(MockCompositor::new());

        let authenticator: Arc<dyn Authenticator> = Arc::from(
            create_authenticator(&config.auth).expect("Failed to create authenticator"),
        );
        let access_tokens = Arc::new(CredentialCache::new(
            AccessTokenSigner::new(&config.credential),
            Arc::clone(&store),
        ));
        let kiosk = Arc::new(Kiosk::new(
            store,
            provider.clone(),
            compositor.clone(),
            config.tasks.clone(),
            config.printing.clone(),
        ));

        let state = Arc::new(AppState::new(config, authenticator, kiosk, access_tokens));
        let router = kiosk_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            provider,
            compositor,
            state,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, &[]).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), &[]).await
    }

    /// Send a request with extra headers (`Activity`, `Authorization`).
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            request_builder = request_builder.header(*name, *value);
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    /// Create a stylized image task and drive it to SUCCEED.
    ///
    /// Returns the task code.
    pub async fn finished_image_task(&self, image: &str) -> String {
        let response = self
            .post(
                "/api/v1/tasks/styled_image/new",
                serde_json::json!({ "image": image }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        let name = response.data()["name"].as_str().unwrap().to_string();

        self.provider.set_all_status(SubTaskStatus::Succeed).await;
        let response = self
            .get(&format!("/api/v1/tasks/styled_image/{}", name))
            .await;
        assert_eq!(response.data()["status"], "SUCCEED");
        name
    }
}
