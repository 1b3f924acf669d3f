//! Integration tests for the HTTP API.
//!
//! Uses axum-test's in-process TestServer over an in-memory store.

#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::StatusCode;
use axum_test::TestServer;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use dashgrid::api::{AddWidgetResponse, AppState, CompactResponse, ExportResponse, PutResponse, router};
use dashgrid::config::Config;
use dashgrid::storage::BoxedStore;
use dashgrid_core::formats::decode_binary;
use dashgrid_core::{DashboardService, DashboardState, MemoryStore, Rect, Timestamp, WidgetKind};
use serde_json::json;

// =============================================================================
// HELPERS
// =============================================================================

fn test_config(api_key: Option<&str>) -> Config {
    Config {
        api_key: api_key.map(str::to_string),
        rate_limit: 0,
        ..Config::default()
    }
}

fn server_with(config: &Config) -> TestServer {
    let store: BoxedStore = Box::new(MemoryStore::new("default"));
    TestServer::new(router(AppState::new(store, config))).unwrap()
}

fn server() -> TestServer {
    server_with(&test_config(None))
}

fn dashboard(updated_at: u64, widgets: usize) -> DashboardState {
    let mut svc = DashboardService::new(12).unwrap();
    for _ in 0..widgets {
        svc.add_widget(WidgetKind::Stats, None, None, Timestamp(updated_at))
            .unwrap();
    }
    svc.into_state()
}

// =============================================================================
// HEALTH
// =============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let server = server_with(&test_config(Some("secret")));
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
}

// =============================================================================
// DASHBOARD DOCUMENT
// =============================================================================

#[tokio::test]
async fn test_get_dashboard_404_before_first_write() {
    let server = server();
    let response = server.get("/dashboard").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_put_then_get_round_trip() {
    let server = server();
    let doc = dashboard(100, 2);

    let response = server.put("/dashboard").json(&doc).await;
    response.assert_status_ok();
    let put: PutResponse = response.json();
    assert!(put.accepted);
    assert_eq!(put.revision, doc.revision);

    let fetched: DashboardState = server.get("/dashboard").await.json();
    assert_eq!(fetched, doc);
}

#[tokio::test]
async fn test_put_stale_document_returns_409_with_current() {
    let server = server();
    let newer = dashboard(200, 2);
    let older = dashboard(100, 1);

    server.put("/dashboard").json(&newer).await.assert_status_ok();

    let response = server.put("/dashboard").json(&older).await;
    response.assert_status(StatusCode::CONFLICT);
    let current: DashboardState = response.json();
    assert_eq!(current, newer);
}

#[tokio::test]
async fn test_put_same_document_is_accepted() {
    let server = server();
    let doc = dashboard(100, 1);

    server.put("/dashboard").json(&doc).await.assert_status_ok();
    server.put("/dashboard").json(&doc).await.assert_status_ok();
}

#[tokio::test]
async fn test_put_rejects_invalid_document() {
    let server = server();
    let mut doc = dashboard(100, 2);
    doc.widgets[1].rect = doc.widgets[0].rect;

    let response = server.put("/dashboard").json(&doc).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    server
        .get("/dashboard")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_put_rejects_newer_schema() {
    let server = server();
    let response = server
        .put("/dashboard")
        .json(&json!({ "schema_version": 99, "columns": 12, "widgets": [], "updated_at": 1 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

// =============================================================================
// WIDGETS
// =============================================================================

#[tokio::test]
async fn test_add_widget_creates_dashboard() {
    let server = server();

    let response = server
        .post("/widgets")
        .json(&json!({ "kind": "task-list", "title": "Inbox" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let added: AddWidgetResponse = response.json();
    assert_eq!(added.rect, Rect::new(0, 0, 4, 6));

    let second: AddWidgetResponse = server
        .post("/widgets")
        .json(&json!({ "kind": "stats", "w": 2 }))
        .await
        .json();
    assert_eq!(second.rect, Rect::new(4, 0, 2, 2));

    let doc: DashboardState = server.get("/dashboard").await.json();
    assert_eq!(doc.columns, 12);
    assert_eq!(doc.widget_count(), 2);
    assert_eq!(doc.widget(added.id).unwrap().title, "Inbox");
}

#[tokio::test]
async fn test_add_widget_rejects_unknown_kind() {
    let server = server();
    let response = server
        .post("/widgets")
        .json(&json!({ "kind": "weather" }))
        .await;
    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_remove_widget() {
    let server = server();
    let added: AddWidgetResponse = server
        .post("/widgets")
        .json(&json!({ "kind": "notes" }))
        .await
        .json();

    let path = format!("/widgets/{}", added.id);
    server.delete(&path).await.assert_status(StatusCode::NO_CONTENT);
    server.delete(&path).await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_compact_moves_widgets_up() {
    let server = server();
    let mut svc = DashboardService::new(12).unwrap();
    svc.add_widget_at(WidgetKind::Stats, None, Rect::new(0, 7, 3, 2), Timestamp(5))
        .unwrap();
    server
        .put("/dashboard")
        .json(svc.state())
        .await
        .assert_status_ok();

    let compacted: CompactResponse = server.post("/compact").await.json();
    assert_eq!(compacted.moved, 1);

    let doc: DashboardState = server.get("/dashboard").await.json();
    assert_eq!(doc.widgets[0].rect, Rect::new(0, 0, 3, 2));
}

#[tokio::test]
async fn test_export_returns_binary_envelope() {
    let server = server();
    let doc = dashboard(100, 3);
    server.put("/dashboard").json(&doc).await.assert_status_ok();

    let export: ExportResponse = server.get("/export").await.json();
    assert_eq!(export.format, "dgrd");
    assert!(!export.checksum.is_empty());

    let bytes = BASE64.decode(export.data).unwrap();
    assert_eq!(decode_binary(&bytes).unwrap(), doc);
}

// =============================================================================
// AUTH AND RATE LIMITING
// =============================================================================

#[tokio::test]
async fn test_api_key_required_when_configured() {
    let server = server_with(&test_config(Some("secret")));

    server
        .get("/dashboard")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/dashboard")
        .authorization_bearer("wrong")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/dashboard")
        .authorization_bearer("secret")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limit_rejects_burst() {
    let config = Config {
        rate_limit: 1,
        ..test_config(None)
    };
    let server = server_with(&config);

    server.get("/health").await.assert_status_ok();
    server
        .get("/health")
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}
