//! End-to-end tests over the HTTP API with a mock provider.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use common::{TestFixture, GUARDED_CONFIG};
use kiosk_core::ProviderError;

#[tokio::test]
async fn test_health_reports_config_hash() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(
        response.body["config_hash"].as_str().unwrap(),
        fixture.state.config_hash()
    );
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::with_config(GUARDED_CONFIG).await;

    let response = fixture
        .request(
            "GET",
            "/api/v1/config",
            None,
            &[("Authorization", "Token mgmt-secret")],
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["auth"]["method"], "token");
    assert_eq!(response.body["auth"]["management_token_configured"], true);
    assert!(!response.body.to_string().contains("mgmt-secret"));
}

#[tokio::test]
async fn test_image_task_create_poll_and_print() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/tasks/styled_image/new",
            json!({ "url": "https://uploads.example/a.jpg" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "SUCCEED");
    let task = response.data();
    assert_eq!(task["name"], "No.1001");
    assert_eq!(task["type"], "STYLED_IMAGE");
    assert_eq!(task["status"], "SUBMITTED");
    assert_eq!(task["sub_task_ids"].as_array().unwrap().len(), 9);

    // Not finished yet: cannot be printed
    let response = fixture
        .post("/api/v1/tasks/styled_image/No.1001/print", json!({}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["status"], "INVALID_REQUEST");

    fixture
        .provider
        .set_all_status(kiosk_core::provider::SubTaskStatus::Succeed)
        .await;
    let response = fixture.get("/api/v1/tasks/styled_image/No.1001").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["status"], "SUCCEED");
    assert_eq!(
        response.data()["output"]["url"],
        "https://cdn.example/No.1001.jpg"
    );
    assert_eq!(fixture.compositor.compositions().await.len(), 1);

    let response = fixture
        .post("/api/v1/tasks/styled_image/No.1001/print", json!({}))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["name"], "printing:No.1001");
    assert_eq!(response.data()["status"], "READY");
    assert_eq!(response.data()["ahead"], 0);

    // Second visitor request is refused
    let response = fixture
        .post("/api/v1/tasks/styled_image/No.1001/print", json!({}))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["status"], "DUPLICATE_PRINT");

    // Console reprints are allowed
    let response = fixture
        .post(
            "/api/v1/tasks/styled_image/No.1001/printFromConsole",
            json!({}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_printer_station_flow() {
    let fixture = TestFixture::new().await;
    let name = fixture
        .finished_image_task("https://uploads.example/a.jpg")
        .await;
    fixture
        .post(&format!("/api/v1/tasks/styled_image/{}/print", name), json!({}))
        .await;

    let response = fixture.get(&format!("/api/v1/printings/{}", name)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["status"], "READY");

    let response = fixture.post("/api/v1/printings/fetch", json!({})).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["name"], "printing:No.1001");

    // Queue drained
    let response = fixture.post("/api/v1/printings/fetch", json!({})).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.data().is_null());

    let response = fixture
        .post(
            "/api/v1/printings/printing:No.1001/update",
            json!({ "status": "completed" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["status"], "COMPLETED");

    let response = fixture.get("/api/v1/printings/printing:No.1001").await;
    assert_eq!(response.data()["ahead"], -1);

    let response = fixture
        .post(
            "/api/v1/printings/printing:No.1001/update",
            json!({ "status": "SHREDDED" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_batch_fetch_and_printer_callback() {
    let fixture = TestFixture::new().await;
    for image in ["https://uploads.example/a.jpg", "https://uploads.example/b.jpg"] {
        let name = fixture.finished_image_task(image).await;
        let response = fixture
            .post(&format!("/api/v1/tasks/styled_image/{}/print", name), json!({}))
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let response = fixture
        .post("/api/v1/printings/batch_fetch", json!({ "count": 5 }))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let names: Vec<&str> = response
        .data()
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["printing:No.1001", "printing:No.1002"]);

    let response = fixture
        .post(
            "/api/v1/printings/callback",
            json!({
                "job_name": "Batch:printing:No.1001-printing:No.1002",
                "event": "completed"
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data().as_array().unwrap().len(), 2);

    let response = fixture.get("/api/v1/printings/queryAll?keyword=1002").await;
    let items = response.data().as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["status"], "COMPLETED");

    let response = fixture
        .post("/api/v1/printings/batch_fetch", json!({ "count": 0 }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_printer_job_count() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/printings/setPrinterQueuedJobCount",
            json!({ "count": 3 }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data(), &json!(3));

    let response = fixture
        .get("/api/v1/printings/getPrinterQueuedJobCount")
        .await;
    assert_eq!(response.data(), &json!(3));
}

#[tokio::test]
async fn test_casting_screen_and_operations() {
    let fixture = TestFixture::new().await;
    fixture
        .finished_image_task("https://uploads.example/a.jpg")
        .await;
    fixture
        .finished_image_task("https://uploads.example/b.jpg")
        .await;

    let response = fixture.get("/api/v1/castings/styled_image/count").await;
    assert_eq!(response.data(), &json!(2));

    let response = fixture
        .get("/api/v1/castings/styled_image/screen?num=1")
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let shown = response.data().as_array().unwrap();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0]["name"], "casting:No.1001");

    let response = fixture
        .post(
            "/api/v1/castings/styled_image/operate",
            json!({ "name": "No.1001", "action": "pin" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = fixture.get("/api/v1/castings/styled_image/pinned").await;
    assert_eq!(response.data()["name"], "casting:No.1001");

    let response = fixture
        .get("/api/v1/castings/styled_image/list?pageSize=1&pageNum=1")
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["total"], 2);
    assert_eq!(response.data()["has_more"], true);
    assert_eq!(response.data()["items"][0]["name"], "casting:No.1002");

    let response = fixture
        .post(
            "/api/v1/castings/styled_image/operate",
            json!({ "name": "No.1001", "action": "shuffle" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = fixture
        .post(
            "/api/v1/castings/styled_image/operate",
            json!({ "name": "No.1001", "action": "delete" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let response = fixture.get("/api/v1/castings/styled_image/count").await;
    assert_eq!(response.data(), &json!(1));
    let response = fixture.get("/api/v1/castings/styled_image/pinned").await;
    assert!(response.data().is_null());
}

#[tokio::test]
async fn test_unknown_type_and_task() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/tasks/oil_painting/new",
            json!({ "image": "https://uploads.example/a.jpg" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = fixture.get("/api/v1/tasks/styled_image/No.4242").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["status"], "NOT_FOUND");

    let response = fixture.get("/api/v1/printings/No.4242").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_offline_task_type() {
    let fixture = TestFixture::with_config(
        r#"
[auth]
method = "none"
require_access_token = false

[tasks]
video_online = false
"#,
    )
    .await;

    let response = fixture
        .post(
            "/api/v1/tasks/video_effect/new",
            json!({ "image": "https://uploads.example/a.jpg" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["status"], "SERVICE_OFFLINE");
    assert!(fixture.provider.created_requests().await.is_empty());
}

#[tokio::test]
async fn test_admin_settings_change_behavior_at_runtime() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/admin/config").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["allow_print"], true);
    assert_eq!(response.data()["image_service_online"], true);
    assert_eq!(response.data()["max_printer_job_count"], 10);

    let name = fixture
        .finished_image_task("https://uploads.example/a.jpg")
        .await;

    let response = fixture
        .post(
            "/api/v1/admin/config",
            json!({ "image_service_online": false, "allow_print": false }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["image_service_online"], false);
    assert_eq!(response.data()["video_service_online"], true);

    let response = fixture
        .post(
            "/api/v1/tasks/styled_image/new",
            json!({ "image": "https://uploads.example/b.jpg" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["status"], "SERVICE_OFFLINE");

    let response = fixture
        .post(&format!("/api/v1/tasks/styled_image/{}/print", name), json!({}))
        .await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);

    // Printing back on with a tighter printer ceiling
    let response = fixture
        .post(
            "/api/v1/admin/config",
            json!({ "allow_print": true, "max_printer_job_count": 1 }),
        )
        .await;
    assert_eq!(response.data()["max_printer_job_count"], 1);
    let response = fixture
        .post(&format!("/api/v1/tasks/styled_image/{}/print", name), json!({}))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    fixture
        .post(
            "/api/v1/printings/setPrinterQueuedJobCount",
            json!({ "count": 2 }),
        )
        .await;
    let response = fixture.post("/api/v1/printings/fetch", json!({})).await;
    assert!(response.data().is_null());

    let response = fixture
        .post("/api/v1/admin/config", json!({ "max_printer_job_count": -3 }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_provider_rejection_is_reported_with_payload() {
    let fixture = TestFixture::new().await;
    fixture
        .provider
        .set_next_error(ProviderError::Api {
            code: 1301,
            message: "content risk".to_string(),
            payload: json!({ "code": 1301, "message": "content risk" }),
        })
        .await;

    let response = fixture
        .post(
            "/api/v1/tasks/video_effect/new",
            json!({ "image": "https://uploads.example/a.jpg" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.body["status"], "KLING_OPEN_API_EXCEPTION");
    assert_eq!(response.body["provider_result"]["code"], 1301);
}

#[tokio::test]
async fn test_guards() {
    let fixture = TestFixture::with_config(GUARDED_CONFIG).await;
    let management = ("Authorization", "Token mgmt-secret");
    let activity = ("Activity", "expo");

    // Management routes need the management token
    let response = fixture.get("/api/v1/castings/styled_image/count").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["status"], "UNAUTHORIZED");
    let response = fixture.get("/api/v1/admin/config").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    // Task creation needs an access token
    let response = fixture
        .request(
            "POST",
            "/api/v1/tasks/styled_image/new",
            Some(json!({ "image": "https://uploads.example/a.jpg" })),
            &[activity],
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = fixture
        .request("GET", "/api/v1/tokens/latest", None, &[management, activity])
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let token = response.data()["value"].as_str().unwrap().to_string();
    let authorization = format!("Token {}", token);

    let response = fixture
        .request(
            "GET",
            &format!("/api/v1/tokens/{}", token),
            None,
            &[management, activity],
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["id"], 1);

    let response = fixture
        .request(
            "POST",
            "/api/v1/tasks/styled_image/new",
            Some(json!({ "image": "https://uploads.example/a.jpg" })),
            &[activity, ("Authorization", authorization.as_str())],
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["name"], "No.1001");

    // Queue position lookup is public
    let response = fixture.get("/api/v1/printings/No.1001").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .request(
            "POST",
            "/api/v1/tasks/styled_image/new",
            Some(json!({ "image": "https://uploads.example/a.jpg" })),
            &[("Activity", "expo-a")],
        )
        .await;
    assert_eq!(response.data()["name"], "No.1001");

    let response = fixture
        .request(
            "GET",
            "/api/v1/tasks/styled_image/No.1001",
            None,
            &[("Activity", "expo-b")],
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    // Codes are counted per tenant
    let response = fixture
        .request(
            "POST",
            "/api/v1/tasks/styled_image/new",
            Some(json!({ "image": "https://uploads.example/b.jpg" })),
            &[("Activity", "expo-b")],
        )
        .await;
    assert_eq!(response.data()["name"], "No.1001");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/health").await;

    let response = fixture
        .router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .uri("/metrics")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("kiosk_http_requests_total"));
}
