use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::outcome_repo;
use crate::errors::AppError;
use crate::models::{OutcomeRecord, OutcomeStatus};
use crate::AppState;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

const STATUSES: &[OutcomeStatus] = &[
    OutcomeStatus::Submitted,
    OutcomeStatus::Confirmed,
    OutcomeStatus::Failed,
    OutcomeStatus::SkippedBelowThreshold,
    OutcomeStatus::SkippedInsufficientBalance,
    OutcomeStatus::SkippedDuplicate,
];

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OutcomeQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/outcomes: recent terminal outcomes, newest first.
///
/// Reads from Postgres when configured, otherwise from the in-memory log.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<OutcomeQuery>,
) -> Result<Json<ApiResponse<Vec<OutcomeRecord>>>, AppError> {
    let status = query.status.as_deref().filter(|s| !s.is_empty());
    if let Some(s) = status {
        if !STATUSES.iter().any(|known| known.as_str() == s) {
            return Err(AppError::BadRequest(format!("unknown status '{s}'")));
        }
    }
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let records = match &state.db {
        Some(pool) => outcome_repo::recent_outcomes(pool, status, limit as i64).await?,
        None => state.outcome_log.recent(status, limit).await,
    };

    Ok(Json(ApiResponse {
        success: true,
        data: Some(records),
        error: None,
    }))
}

/// GET /api/outcomes/summary: outcome counts per status.
pub async fn summary(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<BTreeMap<String, i64>>>, AppError> {
    let mut counts: BTreeMap<String, i64> = STATUSES
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();

    match &state.db {
        Some(pool) => {
            for (status, count) in outcome_repo::status_counts(pool).await? {
                counts.insert(status, count);
            }
        }
        None => {
            for record in state.outcome_log.recent(None, usize::MAX).await {
                *counts.entry(record.status).or_default() += 1;
            }
        }
    }

    Ok(Json(ApiResponse {
        success: true,
        data: Some(counts),
        error: None,
    }))
}
