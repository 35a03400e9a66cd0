//! Collaborator seams the detection-and-reaction core calls into.
//!
//! Concrete adapters live in `chain` and `polymarket`; tests substitute
//! in-memory stubs.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::models::{ExecutionRequest, OrderReceipt, Side, TradeSignal};

// ---------------------------------------------------------------------------
// Pending transaction feed
// ---------------------------------------------------------------------------

/// A not-yet-confirmed transaction as delivered by the node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTransaction {
    pub hash: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub input: String,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("subscription rejected: {0}")]
    Subscribe(String),

    #[error("stream error: {0}")]
    Stream(String),
}

pub type PendingTxStream = BoxStream<'static, Result<RawTransaction, FeedError>>;

#[async_trait]
pub trait PendingTxFeed: Send + Sync {
    /// Open a fresh subscription. The stream ends (or yields an error) when
    /// the subscription drops; the caller reconnects.
    async fn subscribe(&self) -> Result<PendingTxStream, FeedError>;
}

// ---------------------------------------------------------------------------
// Transaction decoding
// ---------------------------------------------------------------------------

/// Result of inspecting one pending transaction.
#[derive(Debug, Clone)]
pub enum DecodeResult {
    /// Watched accounts' trades in this transaction, one per
    /// (account, outcome token, side). Never empty.
    Decoded(Vec<TradeSignal>),
    /// Not an order placement, or not by a watched account.
    NotApplicable,
    /// Looked like an order placement but the payload could not be decoded.
    Malformed(String),
}

pub trait TxDecoder: Send + Sync {
    fn try_decode(&self, tx: &RawTransaction) -> DecodeResult;
}

// ---------------------------------------------------------------------------
// Market API
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Recent trades by one account, newest first.
    async fn poll_recent_activity(&self, account: &str) -> anyhow::Result<Vec<TradeSignal>>;
}

/// Order submission failure, split by whether a retry can help.
#[derive(Debug, Clone, Error)]
pub enum SubmitError {
    /// Network timeout, nonce conflict, transient API error.
    #[error("recoverable: {0}")]
    Recoverable(String),

    /// Invalid order parameters, balance rejected by the exchange.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl SubmitError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SubmitError::Recoverable(_))
    }
}

#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    /// Place a priced order answering `request` from our own wallet.
    async fn submit_order(&self, request: &ExecutionRequest) -> Result<OrderReceipt, SubmitError>;
}

// ---------------------------------------------------------------------------
// Oracles
// ---------------------------------------------------------------------------

#[async_trait]
pub trait BalanceOracle: Send + Sync {
    /// Whether our wallet can fund a response of `size_usd` on `side` for
    /// the given outcome token.
    async fn has_sufficient_balance(
        &self,
        outcome_id: &str,
        side: Side,
        size_usd: Decimal,
        price: Decimal,
    ) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait GasPriceOracle: Send + Sync {
    /// Current network gas price in gwei.
    async fn current_gas_price(&self) -> anyhow::Result<Decimal>;
}
