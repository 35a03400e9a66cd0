pub mod order;
pub mod signal;

pub use order::{ExecutionOutcome, ExecutionRequest, OrderReceipt, OutcomeRecord, OutcomeStatus};
pub use signal::AggregatedSignal;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_api_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BUY" | "0" => Some(Side::Buy),
            "SELL" | "1" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

// ---------------------------------------------------------------------------
// Signal provenance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Live,
    Polled,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Live => "live",
            SourceType::Polled => "polled",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far along the network a detected trade is.
///
/// Ordered by information content: a `Confirmed` observation supersedes a
/// `Pending` or `Unknown` one for the same trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationState {
    Unknown,
    Pending,
    Confirmed,
}

impl fmt::Display for ConfirmationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmationState::Unknown => write!(f, "unknown"),
            ConfirmationState::Pending => write!(f, "pending"),
            ConfirmationState::Confirmed => write!(f, "confirmed"),
        }
    }
}

// ---------------------------------------------------------------------------
// SignalKey: (account, order book, side), the unit of aggregation and locking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalKey {
    pub account: String,
    pub market_id: String,
    pub side: Side,
}

impl fmt::Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.account, self.market_id, self.side)
    }
}

// ---------------------------------------------------------------------------
// TradeSignal: core pipeline message
// ---------------------------------------------------------------------------

/// A detected, not-yet-acted-upon trade by a watched account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    /// Stable identity of the underlying trade, shared by both sources.
    pub id: String,
    pub source: SourceType,
    /// Watched address (lowercase).
    pub account: String,
    /// CLOB order book the trade hit. Every outcome has its own book, so
    /// this is the outcome token ID; the condition ID is never used because
    /// it spans opposite outcomes.
    pub market_id: String,
    /// CTF outcome token ID (decimal string).
    pub outcome_id: String,
    pub side: Side,
    pub size_usd: Decimal,
    pub price: Decimal,
    pub detected_at: DateTime<Utc>,
    pub confirmation: ConfirmationState,
}

impl TradeSignal {
    pub fn key(&self) -> SignalKey {
        SignalKey {
            account: self.account.clone(),
            market_id: self.market_id.clone(),
            side: self.side,
        }
    }

    /// Identity of one economic trade inside a transaction. A single
    /// transaction can fill several watched orders, so the hash alone is
    /// not enough.
    pub fn trade_id(tx_hash: &str, account: &str, outcome_id: &str, side: Side) -> String {
        format!(
            "{}:{}:{}:{}",
            tx_hash.to_lowercase(),
            account.to_lowercase(),
            outcome_id,
            side
        )
    }

    /// Identity for a polled trade that carries no transaction hash.
    pub fn polled_id(account: &str, market_id: &str, order_id: &str) -> String {
        format!("{}:{}:{}", account.to_lowercase(), market_id, order_id)
    }
}
