use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::AppState;

/// GET /api/control/status: current pipeline status.
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    let pipeline = &state.config.pipeline;

    Json(json!({
        "mode": state.mode.as_str(),
        "wallet": state.wallet_address,
        "watched_accounts": pipeline.watched_accounts,
        "in_flight": state.in_flight.len(),
        "recorded_outcomes": state.outcome_log.len().await,
        "aggregation_enabled": pipeline.aggregation_enabled,
        "aggregation_window_ms": pipeline.aggregation_window.as_millis() as u64,
        "poll_interval_ms": pipeline.poll_interval.as_millis() as u64,
        "min_trade_size_usd": pipeline.min_trade_size_usd,
        "frontrun_size_multiplier": pipeline.frontrun_size_multiplier,
        "gas_price_multiplier": pipeline.gas_price_multiplier,
    }))
}
