//! Integration tests for the admin API

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use reqlog_api::{models::*, ApiServer, ApiServerConfig};
use reqlog_capture::{
    HttpResponse, Observer, RequestStore, RetentionTask, Settings, SettingsHandle,
};
use serde_json::{json, Value};
use tower::ServiceExt; // For `oneshot` method

/// Helper to create a test router over an in-memory store
async fn create_test_app(settings: Settings) -> (Router, Observer) {
    let store = RequestStore::open("sqlite::memory:")
        .await
        .expect("Failed to create in-memory store");
    let handle = SettingsHandle::new(settings);
    let observer = Observer::new(handle.clone(), store.clone());
    let retention = RetentionTask::new(store, handle);

    let config = ApiServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
        enable_cors: true,
    };
    let server = ApiServer::new(config, observer.clone(), retention);

    (server.build_router(), observer)
}

async fn seed(observer: &Observer, entries: &[(&str, u16, &str)]) -> Vec<i64> {
    let mut ids = Vec::new();
    for (url, code, message) in entries {
        let outcome = observer
            .on_response(
                url,
                &json!({"method": "POST", "body": {"amount": 10}}),
                &HttpResponse::new(*code)
                    .with_message(*message)
                    .with_header("content-type", "application/json")
                    .with_body(r#"{"ok":true}"#)
                    .into(),
            )
            .await;
        if let reqlog_capture::CaptureOutcome::Captured { id, .. } = outcome {
            ids.push(id);
        }
    }
    ids
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().uri(uri).method(method);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, body.to_vec())
}

#[tokio::test]
async fn test_health_check() {
    let (app, observer) = create_test_app(Settings::default()).await;
    seed(&observer, &[("https://api.paypal.com/v1/x", 200, "OK")]).await;

    let (status, body) = send(&app, "GET", "/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.stored_requests, 1);
}

#[tokio::test]
async fn test_list_requests_defaults() {
    let (app, observer) = create_test_app(Settings::default()).await;
    let entries: Vec<(String, u16, &str)> = (0..12)
        .map(|i| (format!("https://api.paypal.com/v1/{}", i), 200, "OK"))
        .collect();
    let borrowed: Vec<(&str, u16, &str)> = entries.iter().map(|(u, c, m)| (u.as_str(), *c, *m)).collect();
    let ids = seed(&observer, &borrowed).await;

    let (status, body) = send(&app, "GET", "/api/requests", None).await;

    assert_eq!(status, StatusCode::OK);
    let list: RequestList = serde_json::from_slice(&body).unwrap();
    assert_eq!(list.total, 12);
    assert_eq!(list.page, 1);
    assert_eq!(list.per_page, 10);
    assert_eq!(list.total_pages, 2);
    assert_eq!(list.items.len(), 10);
    // Newest first
    assert_eq!(list.items[0].id, *ids.last().unwrap());

    let (_, body) = send(&app, "GET", "/api/requests?page=2", None).await;
    let second: RequestList = serde_json::from_slice(&body).unwrap();
    assert_eq!(second.items.len(), 2);
}

#[tokio::test]
async fn test_list_requests_page_past_the_end() {
    let (app, observer) = create_test_app(Settings::default()).await;
    seed(&observer, &[("https://api.paypal.com/v1/a", 200, "OK")]).await;

    let uri = format!("/api/requests?page={}&per_page={}", u64::MAX, MAX_PER_PAGE);
    let (status, body) = send(&app, "GET", &uri, None).await;

    assert_eq!(status, StatusCode::OK);
    let list: RequestList = serde_json::from_slice(&body).unwrap();
    assert!(list.items.is_empty());
    assert_eq!(list.total, 1);
    assert_eq!(list.page, u64::MAX);
}

#[tokio::test]
async fn test_list_requests_search_and_sort() {
    let (app, observer) = create_test_app(Settings::default()).await;
    seed(
        &observer,
        &[
            ("https://api.paypal.com/v1/payments", 500, "Internal Server Error"),
            ("https://slack.com/api/chat.postMessage", 404, "Not Found"),
            ("https://api.paypal.com/v1/refunds", 201, "Created"),
        ],
    )
    .await;

    let (status, body) = send(
        &app,
        "GET",
        "/api/requests?s=paypal&orderby=response_code&order=asc",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let list: RequestList = serde_json::from_slice(&body).unwrap();
    assert_eq!(list.total, 2);
    let codes: Vec<Option<i32>> = list.items.iter().map(|i| i.response_code).collect();
    assert_eq!(codes, vec![Some(201), Some(500)]);

    let (_, body) = send(&app, "GET", "/api/requests?s=Not%20Found", None).await;
    let list: RequestList = serde_json::from_slice(&body).unwrap();
    assert_eq!(list.total, 1);
    assert_eq!(list.items[0].matched_pattern, "slack.com/api");
}

#[tokio::test]
async fn test_list_requests_rejects_unknown_sort() {
    let (app, _) = create_test_app(Settings::default()).await;

    let (status, body) = send(&app, "GET", "/api/requests?orderby=password", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.code.as_deref(), Some("INVALID_ORDERBY"));
}

#[tokio::test]
async fn test_get_request_detail() {
    let (app, observer) = create_test_app(Settings::default()).await;
    let ids = seed(&observer, &[("https://api.mollie.com/v2/payments", 201, "Created")]).await;

    let (status, body) = send(&app, "GET", &format!("/api/requests/{}", ids[0]), None).await;

    assert_eq!(status, StatusCode::OK);
    let detail: RequestDetail = serde_json::from_slice(&body).unwrap();
    assert_eq!(detail.matched_pattern, "api.mollie.com");
    assert_eq!(detail.request_args["body"]["amount"], json!(10));
    assert_eq!(
        detail.response_headers,
        Some(json!({"content-type": "application/json"}))
    );
    assert_eq!(detail.response_body.as_deref(), Some("{\n  \"ok\": true\n}"));
}

#[tokio::test]
async fn test_get_missing_request() {
    let (app, _) = create_test_app(Settings::default()).await;

    let (status, body) = send(&app, "GET", "/api/requests/42", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.code.as_deref(), Some("REQUEST_NOT_FOUND"));
}

#[tokio::test]
async fn test_delete_request() {
    let (app, observer) = create_test_app(Settings::default()).await;
    let ids = seed(&observer, &[("https://api.paypal.com/v1/x", 200, "OK")]).await;
    let uri = format!("/api/requests/{}", ids[0]);

    let (status, _) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bulk_delete() {
    let (app, observer) = create_test_app(Settings::default()).await;
    let ids = seed(
        &observer,
        &[
            ("https://api.paypal.com/v1/a", 200, "OK"),
            ("https://api.paypal.com/v1/b", 200, "OK"),
            ("https://api.paypal.com/v1/c", 200, "OK"),
        ],
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/requests/bulk-delete",
        Some(json!({"ids": [ids[0], ids[2], 999]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let report: BulkDeleteResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(report.deleted, vec![ids[0], ids[2]]);
    assert_eq!(report.not_found, vec![999]);
    assert_eq!(observer.store().count(None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_submit_event() {
    let (app, observer) = create_test_app(Settings::default()).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/events",
        Some(json!({
            "url": "https://hooks.zapier.com/hooks/catch/1",
            "request_args": {"method": "POST"},
            "response": {"code": 200, "message": "OK", "headers": {"x-id": ["1", "2"]}}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let capture: CaptureResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(capture.outcome, "captured");
    assert_eq!(capture.pattern.as_deref(), Some("hooks.zapier.com"));
    assert_eq!(observer.store().count(None).await.unwrap(), 1);

    let (_, body) = send(
        &app,
        "POST",
        "/api/events",
        Some(json!({
            "url": "https://example.org/",
            "response": {"transport_error": "Could not resolve host"}
        })),
    )
    .await;
    let capture: CaptureResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(capture.outcome, "no_match");
}

#[tokio::test]
async fn test_manual_cleanup() {
    let (app, observer) = create_test_app(Settings {
        max_records: 1,
        ..Default::default()
    })
    .await;
    seed(
        &observer,
        &[
            ("https://api.paypal.com/v1/a", 200, "OK"),
            ("https://api.paypal.com/v1/b", 404, "Not Found"),
        ],
    )
    .await;

    let (status, body) = send(&app, "POST", "/api/cleanup", None).await;

    assert_eq!(status, StatusCode::OK);
    let report: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(report["status"], "pruned");
    assert_eq!(report["deleted"], 1);

    let (_, body) = send(&app, "POST", "/api/cleanup", None).await;
    let report: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(report["status"], "nothing_to_do");
}

#[tokio::test]
async fn test_oversized_max_records_is_capped() {
    let (app, observer) = create_test_app(Settings::default()).await;
    seed(&observer, &[("https://api.paypal.com/v1/a", 200, "OK")]).await;

    let (_, body) = send(&app, "GET", "/api/settings", None).await;
    let mut settings: SettingsBody = serde_json::from_slice(&body).unwrap();
    settings.max_records = u64::MAX;
    let (status, body) = send(
        &app,
        "PUT",
        "/api/settings",
        Some(serde_json::to_value(&settings).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let updated: SettingsBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(updated.max_records, i64::MAX as u64);

    let (status, body) = send(&app, "POST", "/api/cleanup", None).await;
    assert_eq!(status, StatusCode::OK);
    let report: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(report["status"], "nothing_to_do");
}

#[tokio::test]
async fn test_update_settings_applies_to_next_event() {
    let (app, _) = create_test_app(Settings::default()).await;

    let (status, body) = send(&app, "GET", "/api/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    let mut settings: SettingsBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(settings.max_records, 100_000);
    assert!(settings.effective_patterns.contains(&"api.paypal.com".to_string()));

    settings.extra_patterns = "myhook.io".to_string();
    settings.disable_default_patterns = true;
    settings.code_classes.client_error = false;
    let (status, body) = send(
        &app,
        "PUT",
        "/api/settings",
        Some(serde_json::to_value(&settings).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let updated: SettingsBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(updated.effective_patterns, vec!["myhook.io".to_string()]);

    let (_, body) = send(
        &app,
        "POST",
        "/api/events",
        Some(json!({"url": "https://api.paypal.com/v1/x", "response": {"code": 200}})),
    )
    .await;
    let capture: CaptureResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(capture.outcome, "no_match");

    let (_, body) = send(
        &app,
        "POST",
        "/api/events",
        Some(json!({"url": "https://myhook.io/in", "response": {"code": 404}})),
    )
    .await;
    let capture: CaptureResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(capture.outcome, "filtered");
}

#[tokio::test]
async fn test_openapi_json_served() {
    let (app, _) = create_test_app(Settings::default()).await;

    let (status, body) = send(&app, "GET", "/api/openapi.json", None).await;

    assert_eq!(status, StatusCode::OK);
    let doc: Value = serde_json::from_slice(&body).unwrap();
    assert!(doc["paths"]["/api/settings"].is_object());
}
