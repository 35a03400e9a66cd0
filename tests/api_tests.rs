mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusBuilder;
use rust_decimal::Decimal;
use tower::ServiceExt;

use polyfront::api::router::create_router;
use polyfront::api::ws_types::WsMessage;
use polyfront::config::AppConfig;
use polyfront::execution::InFlightTable;
use polyfront::models::{ExecutionOutcome, OutcomeRecord, OutcomeStatus, Side, SignalKey};
use polyfront::services::OutcomeLog;
use polyfront::{AppState, Mode};

fn test_config(api_token: Option<&str>) -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        database_url: None,
        api_token: api_token.map(String::from),
        polygon_ws_url: "wss://localhost".into(),
        polygon_rpc_url: "http://localhost".into(),
        data_api_url: "http://localhost".into(),
        clob_api_url: "http://localhost".into(),
        polymarket_private_key: None,
        polymarket_api_key: None,
        polymarket_api_secret: None,
        polymarket_passphrase: None,
        telegram_bot_token: None,
        telegram_chat_id: None,
        bankroll: Decimal::from(1_000),
        pipeline: common::test_config(),
    }
}

fn outcome(market: &str, status: OutcomeStatus) -> OutcomeRecord {
    let key = SignalKey {
        account: common::WATCHED.into(),
        market_id: market.into(),
        side: Side::Buy,
    };
    OutcomeRecord::from(&ExecutionOutcome::skipped(
        key,
        status,
        Decimal::from(200),
        vec![format!("0x{market}")],
    ))
}

async fn build_test_app(api_token: Option<&str>) -> axum::Router {
    let (ws_tx, _) = tokio::sync::broadcast::channel::<WsMessage>(16);
    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

    let outcome_log = Arc::new(OutcomeLog::new(100));
    outcome_log.push(outcome("m1", OutcomeStatus::SkippedBelowThreshold)).await;
    outcome_log.push(outcome("m2", OutcomeStatus::SkippedDuplicate)).await;
    outcome_log.push(outcome("m3", OutcomeStatus::SkippedBelowThreshold)).await;

    let state = AppState {
        db: None,
        config: Arc::new(test_config(api_token)),
        ws_tx,
        metrics_handle,
        outcome_log,
        in_flight: InFlightTable::new(),
        mode: Mode::DryRun,
        wallet_address: None,
    };

    create_router(state)
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let resp = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let app = build_test_app(None).await;

    let (status, json) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["db"], "disabled");
    assert_eq!(json["mode"], "dry_run");
}

#[tokio::test]
async fn test_list_outcomes_newest_first() {
    let app = build_test_app(None).await;

    let (status, json) = get_json(app, "/api/outcomes").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 3);
    assert_eq!(data[0]["market_id"], "m3");
    assert_eq!(data[2]["market_id"], "m1");
}

#[tokio::test]
async fn test_list_outcomes_filters_and_limits() {
    let app = build_test_app(None).await;

    let (_, json) = get_json(
        app.clone(),
        "/api/outcomes?status=skipped_below_threshold&limit=1",
    )
    .await;
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["market_id"], "m3");
    assert_eq!(data[0]["status"], "skipped_below_threshold");

    let (status, json) = get_json(app, "/api/outcomes?status=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_outcome_summary_counts_every_status() {
    let app = build_test_app(None).await;

    let (status, json) = get_json(app, "/api/outcomes/summary").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["skipped_below_threshold"], 2);
    assert_eq!(json["data"]["skipped_duplicate"], 1);
    assert_eq!(json["data"]["submitted"], 0);
}

#[tokio::test]
async fn test_control_status() {
    let app = build_test_app(None).await;

    let (status, json) = get_json(app, "/api/control/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["mode"], "dry_run");
    assert_eq!(json["in_flight"], 0);
    assert_eq!(json["recorded_outcomes"], 3);
    assert_eq!(json["watched_accounts"][0], common::WATCHED);
    assert_eq!(json["aggregation_enabled"], false);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = build_test_app(Some("secret")).await;

    let (status, _) = get_json(app.clone(), "/api/outcomes").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/outcomes")
                .header("authorization", "Bearer wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/outcomes")
                .header("authorization", "Bearer secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Health and metrics stay public.
    let (status, _) = get_json(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let resp = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
