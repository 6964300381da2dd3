//! End-to-end tests for the wizard HTTP API.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use allot::api::{AppState, router};
use allot::import::{CsvAnalysis, CsvBackend, GeneratedSchema, UploadedFile};
use allot::store::{JsonFileStore, MemoryStore};

fn app() -> axum::Router {
    router(AppState::load(Box::new(MemoryStore::new())).expect("memory store"))
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let cache = response
        .headers()
        .get("cache-control")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    assert_eq!(cache.as_deref(), Some("no-store"));
    let body = response.into_body().collect().await.expect("body").to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap_or(json!({}));
    (status, json)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    send(app, request).await
}

async fn post_json(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request");
    send(app, request).await
}

async fn post_empty(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    send(app, request).await
}

#[tokio::test]
async fn health_reports_version() {
    let (status, json) = get_json(&app(), "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let (status, json) = get_json(&app(), "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Not found");
}

#[tokio::test]
async fn strategies_lists_catalog() {
    let (status, json) = get_json(&app(), "/api/strategies").await;
    assert_eq!(status, StatusCode::OK);
    let strategies = json.as_array().expect("array");
    assert_eq!(strategies.len(), 5);
    assert_eq!(strategies[0]["key"], "diversification");
    assert_eq!(strategies[0]["volatility"]["label"], "MODERATE");
    assert!(strategies[4]["allocation"].is_null());
}

#[tokio::test]
async fn risk_get_and_post_agree() {
    let app = app();
    let (status, from_query) =
        get_json(&app, "/api/risk?equities=35&bonds=20&cash=5&alternatives=40").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(from_query["score"], 3.0);
    assert_eq!(from_query["label"], "MODERATE");

    let (_, from_body) = post_json(
        &app,
        "/api/risk",
        json!({"equities": 35, "bonds": 20, "cash": 5, "alternatives": 40}),
    )
    .await;
    assert_eq!(from_query, from_body);

    let (status, json) = post_json(&app, "/api/risk", json!({"cash": -5})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().expect("message").contains("cash"));
}

#[tokio::test]
async fn allocation_updates_respect_total() {
    let app = app();
    let (_, session) = get_json(&app, "/api/session").await;
    assert_eq!(session["totalAllocation"], 100.0);
    assert_eq!(session["canContinue"], true);

    let (status, json) = post_json(
        &app,
        "/api/session/allocation",
        json!({"category": "cash", "value": 10}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["applied"], false);
    assert_eq!(json["session"]["allocation"]["cash"], 0.0);

    let (_, json) = post_json(
        &app,
        "/api/session/allocation",
        json!({"category": "equities", "value": 50}),
    )
    .await;
    assert_eq!(json["applied"], true);
    assert_eq!(json["session"]["canContinue"], false);

    let (status, _) = post_json(
        &app,
        "/api/session/allocation",
        json!({"category": "gold", "value": 5}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn size_change_resets_and_dollars_convert() {
    let app = app();
    post_json(
        &app,
        "/api/session/allocation",
        json!({"category": "equities", "value": 20}),
    )
    .await;

    let (_, json) = post_json(
        &app,
        "/api/session/portfolio-size",
        json!({"portfolioSize": 500000}),
    )
    .await;
    assert_eq!(json["applied"], true);
    assert_eq!(json["session"]["allocation"]["equities"], 60.0);
    assert_eq!(json["session"]["dollarValues"][0]["dollars"], "$300,000");

    post_json(
        &app,
        "/api/session/allocation",
        json!({"category": "bonds", "value": 0}),
    )
    .await;
    let (_, json) = post_json(
        &app,
        "/api/session/allocation/dollars",
        json!({"category": "cash", "dollars": "$125,000"}),
    )
    .await;
    assert_eq!(json["applied"], true);
    assert_eq!(json["session"]["allocation"]["cash"], 25.0);
}

#[tokio::test]
async fn alternatives_dialog_flow() {
    let app = app();
    let (status, _) = post_empty(&app, "/api/session/alternatives/dialog/apply").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, json) = post_json(
        &app,
        "/api/session/strategy",
        json!({"strategy": "advanced"}),
    )
    .await;
    assert_eq!(json["session"]["alternativesTotal"], 0.0);

    let (_, json) = post_empty(&app, "/api/session/alternatives/dialog/open").await;
    assert_eq!(json["session"]["dialog"]["state"], "open");

    for (category, value) in [
        ("Private Equity", json!(60)),
        ("real-estate", json!("39.5")),
    ] {
        post_json(
            &app,
            "/api/session/alternatives/dialog/edit",
            json!({"category": category, "value": value}),
        )
        .await;
    }
    let (_, json) = get_json(&app, "/api/session").await;
    assert_eq!(json["dialog"]["state"], "editing");
    assert_eq!(json["canApply"], false);

    let (status, json) = post_empty(&app, "/api/session/alternatives/dialog/apply").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().expect("message").contains("99.5"));

    post_json(
        &app,
        "/api/session/alternatives/dialog/edit",
        json!({"category": "Real Estate", "value": 40}),
    )
    .await;
    let (status, json) = post_empty(&app, "/api/session/alternatives/dialog/apply").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["session"]["dialog"]["state"], "closed");
    assert_eq!(json["session"]["alternatives"]["Private Equity"], 60.0);
    assert_eq!(json["session"]["alternativesTotal"], 100.0);
}

#[tokio::test]
async fn hidden_categories_drop_out_of_chart() {
    let app = app();
    let (_, json) = post_json(
        &app,
        "/api/session/alternatives/visibility",
        json!({"category": "Commodities"}),
    )
    .await;
    assert_eq!(json["applied"], true);
    assert_eq!(json["session"]["hiddenCategories"], json!(["Commodities"]));

    let (_, charts) = get_json(&app, "/api/session/charts").await;
    let alternatives = charts["alternatives"].as_array().expect("array");
    assert_eq!(alternatives.len(), 7);
    assert!(alternatives.iter().all(|e| e["category"] != "Commodities"));
    assert_eq!(charts["allocation"].as_array().expect("array").len(), 4);
}

#[tokio::test]
async fn session_survives_restart_with_file_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.json");

    let first = router(
        AppState::load(Box::new(JsonFileStore::open(&path).expect("open"))).expect("load"),
    );
    post_json(&first, "/api/session/strategy", json!({"strategy": "growth"})).await;
    post_json(
        &first,
        "/api/session/portfolio-size",
        json!({"portfolioSize": 2_000_000}),
    )
    .await;
    drop(first);

    let second = router(
        AppState::load(Box::new(JsonFileStore::open(&path).expect("reopen"))).expect("load"),
    );
    let (_, json) = get_json(&second, "/api/session").await;
    assert_eq!(json["selectedStrategy"], "growth");
    assert_eq!(json["portfolioSize"], 2_000_000);
    assert_eq!(json["risk"]["label"], "HIGH");

    let (_, json) = post_empty(&second, "/api/session/reset").await;
    assert_eq!(json["session"]["selectedStrategy"], "diversification");
}

#[derive(Default)]
struct RecordingBackend {
    executed: Mutex<Vec<String>>,
}

#[async_trait]
impl CsvBackend for RecordingBackend {
    async fn upload_file(&self, file_name: &str, _bytes: &[u8]) -> Result<UploadedFile, String> {
        Ok(UploadedFile {
            path: format!("uploads/{file_name}"),
        })
    }

    async fn analyze_csv(&self, path: &str) -> Result<CsvAnalysis, String> {
        if path.ends_with("broken.csv") {
            return Err("unreadable header".to_string());
        }
        Ok(CsvAnalysis {
            id: "a-1".to_string(),
            status: "completed".to_string(),
            result: json!({}),
        })
    }

    async fn generate_schema(
        &self,
        _analysis_id: &str,
        table_name: &str,
    ) -> Result<GeneratedSchema, String> {
        Ok(GeneratedSchema {
            sql: format!("CREATE TABLE {table_name} (id INT)"),
        })
    }

    async fn execute_sql(&self, sql: &str) -> Result<(), String> {
        self.executed.lock().expect("lock").push(sql.to_string());
        Ok(())
    }

    async fn import_csv_data(&self, _analysis_id: &str, _table_name: &str) -> Result<(), String> {
        Ok(())
    }
}

#[tokio::test]
async fn import_requires_configured_backend() {
    let (status, _) = post_json(
        &app(),
        "/api/import",
        json!({"fileName": "trades.csv", "content": "id\n1\n"}),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn import_runs_against_injected_backend() {
    let backend = Arc::new(RecordingBackend::default());
    let state = AppState::load(Box::new(MemoryStore::new()))
        .expect("memory store")
        .with_import_backend(backend.clone());
    let app = router(state);

    let (status, json) = post_json(
        &app,
        "/api/import",
        json!({"fileName": "Q3 Trades.csv", "content": "id\n1\n", "tableName": "ledger"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tableName"], "ledger");
    assert_eq!(json["analysisId"], "a-1");
    assert_eq!(
        *backend.executed.lock().expect("lock"),
        ["CREATE TABLE ledger (id INT)"]
    );

    let (status, json) = post_json(
        &app,
        "/api/import",
        json!({"fileName": "broken.csv", "content": "x"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error"].as_str().expect("message").contains("analyze"));

    let (status, _) = post_json(
        &app,
        "/api/import",
        json!({"fileName": "empty.csv", "content": ""}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
