use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use super::{Side, SignalKey};

/// Decision Engine output: a sized, priced order for one key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub key_account: String,
    pub key_market: String,
    pub outcome_id: String,
    pub side: Side,
    /// Source size × frontrun multiplier.
    pub requested_size_usd: Decimal,
    /// Price per share to quote (0..1).
    pub limit_price: Decimal,
    /// Current gas price × gas multiplier (gwei).
    pub gas_price_hint: Decimal,
    pub origin_signal_ids: Vec<String>,
    pub first_detected_at: DateTime<Utc>,
}

impl ExecutionRequest {
    pub fn key(&self) -> SignalKey {
        SignalKey {
            account: self.key_account.clone(),
            market_id: self.key_market.clone(),
            side: self.side,
        }
    }
}

/// Exchange acknowledgement of a submitted order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Submitted,
    Confirmed,
    Failed,
    SkippedBelowThreshold,
    SkippedInsufficientBalance,
    SkippedDuplicate,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Submitted => "submitted",
            OutcomeStatus::Confirmed => "confirmed",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::SkippedBelowThreshold => "skipped_below_threshold",
            OutcomeStatus::SkippedInsufficientBalance => "skipped_insufficient_balance",
            OutcomeStatus::SkippedDuplicate => "skipped_duplicate",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal record of one decision or execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub id: Uuid,
    pub key: SignalKey,
    pub status: OutcomeStatus,
    pub attempts: u32,
    pub error: Option<String>,
    pub requested_size_usd: Decimal,
    pub gas_price_hint: Decimal,
    pub order_id: Option<String>,
    pub origin_signal_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionOutcome {
    /// Fresh, non-terminal record for a request about to be submitted.
    pub fn begin(request: &ExecutionRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: request.key(),
            status: OutcomeStatus::Failed,
            attempts: 0,
            error: None,
            requested_size_usd: request.requested_size_usd,
            gas_price_hint: request.gas_price_hint,
            order_id: None,
            origin_signal_ids: request.origin_signal_ids.clone(),
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Terminal record for a signal the Decision Engine declined.
    pub fn skipped(
        key: SignalKey,
        status: OutcomeStatus,
        requested_size_usd: Decimal,
        origin_signal_ids: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            key,
            status,
            attempts: 0,
            error: None,
            requested_size_usd,
            gas_price_hint: Decimal::ZERO,
            order_id: None,
            origin_signal_ids,
            created_at: now,
            finished_at: Some(now),
        }
    }

    pub fn finish(&mut self, status: OutcomeStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// Database row for the frontrun_outcomes table; also the API shape.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OutcomeRecord {
    pub id: Uuid,
    pub account: String,
    pub market_id: String,
    pub side: String,
    pub status: String,
    pub attempts: i32,
    pub error: Option<String>,
    pub requested_size_usd: Decimal,
    pub gas_price_hint: Decimal,
    pub order_id: Option<String>,
    pub origin_signal_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&ExecutionOutcome> for OutcomeRecord {
    fn from(o: &ExecutionOutcome) -> Self {
        Self {
            id: o.id,
            account: o.key.account.clone(),
            market_id: o.key.market_id.clone(),
            side: o.key.side.to_string(),
            status: o.status.as_str().to_string(),
            attempts: i32::try_from(o.attempts).unwrap_or(i32::MAX),
            error: o.error.clone(),
            requested_size_usd: o.requested_size_usd,
            gas_price_hint: o.gas_price_hint,
            order_id: o.order_id.clone(),
            origin_signal_ids: o.origin_signal_ids.clone(),
            created_at: o.created_at,
            finished_at: o.finished_at,
        }
    }
}
