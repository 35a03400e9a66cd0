use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::AppState;

/// Liveness plus database reachability when a database is configured.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db = match &state.db {
        Some(pool) => {
            if sqlx::query("SELECT 1").execute(pool).await.is_ok() {
                "connected"
            } else {
                "disconnected"
            }
        }
        None => "disabled",
    };

    let status = if db == "disconnected" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    let label = if status == StatusCode::OK { "healthy" } else { "unhealthy" };

    (
        status,
        Json(json!({
            "status": label,
            "db": db,
            "mode": state.mode.as_str(),
        })),
    )
}
