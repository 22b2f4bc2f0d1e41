use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use quotecache_server::{api::app_router, build_state, config::Config};
use serde_json::Value;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

/// Router over a temp SQLite file with no providers configured.
async fn build_test_router() -> (Router, TempDir) {
    let tmp = tempdir().unwrap();
    let config = Config {
        db_path: tmp.path().join("test.db").to_string_lossy().to_string(),
        ..Config::default()
    };
    let state = build_state(&config).await.unwrap();
    (app_router(state, &config), tmp)
}

async fn send(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_reports_storage() {
    let (app, _tmp) = build_test_router().await;

    let (status, body) = send(&app, Method::GET, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "sqlite");
    assert_eq!(body["snapshots"], 0);
}

#[tokio::test]
async fn quote_without_providers_is_unavailable() {
    let (app, _tmp) = build_test_router().await;

    let (status, body) = send(&app, Method::GET, "/api/v1/quotes/aapl").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "AAPL");
    assert_eq!(body["unavailable"], true);
    assert_eq!(body["cached"], false);
    assert!(body.get("quote").is_none());
    assert!(body["message"].as_str().unwrap().contains("AAPL"));
}

#[tokio::test]
async fn malformed_symbol_is_bad_request() {
    let (app, _tmp) = build_test_router().await;

    let (status, body) = send(&app, Method::GET, "/api/v1/quotes/AA%20PL").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);

    let (status, _) = send(&app, Method::GET, "/api/v1/quotes/TOOLONGSYMBOL").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_quotes() {
    let (app, _tmp) = build_test_router().await;

    let (status, body) = send(&app, Method::GET, "/api/v1/quotes?symbols=AAPL,msft,AAPL").await;
    assert_eq!(status, StatusCode::OK);
    let map = body.as_object().unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map["MSFT"]["unavailable"], true);

    let (status, _) = send(&app, Method::GET, "/api/v1/quotes").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let too_many: Vec<String> = (0..51).map(|i| format!("S{}", i)).collect();
    let uri = format!("/api/v1/quotes?symbols={}", too_many.join(","));
    let (status, body) = send(&app, Method::GET, &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("51"));
}

#[tokio::test]
async fn clearing_is_idempotent() {
    let (app, _tmp) = build_test_router().await;

    let (status, body) = send(&app, Method::DELETE, "/api/v1/quotes/AAPL").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 0);

    let (status, body) = send(&app, Method::DELETE, "/api/v1/quotes").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 0);
}

#[tokio::test]
async fn market_session_and_providers() {
    let (app, _tmp) = build_test_router().await;

    let (status, body) = send(&app, Method::GET, "/api/v1/market/session").await;
    assert_eq!(status, StatusCode::OK);
    assert!(["OPEN", "EXTENDED", "CLOSED"].contains(&body["session"].as_str().unwrap()));
    assert_eq!(body["exchangeTimezone"], "America/New_York");

    let (status, body) = send(&app, Method::GET, "/api/v1/market/providers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Array(vec![]));
}
