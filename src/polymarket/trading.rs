use std::sync::Arc;

use async_trait::async_trait;
use polymarket_client_sdk::clob::types::Side as SdkSide;
use polymarket_client_sdk::types::U256;
use rust_decimal::Decimal;

use crate::models::{ExecutionRequest, OrderReceipt, Side};
use crate::ports::{OrderSubmitter, SubmitError};

use super::wallet::PolymarketWallet;

/// Transport and gateway failures. Checked first: a dropped connection
/// stays retryable whatever else its message says.
const TRANSPORT_MARKERS: &[&str] = &[
    "error sending request",
    "connection",
    "timed out",
    "timeout",
    "rate limit",
    "too many requests",
    "bad gateway",
    "service unavailable",
    "gateway timeout",
];

/// CLOB rejections that no retry can fix.
const FATAL_MARKERS: &[&str] = &[
    "invalid_order",
    "invalid order",
    "invalid price",
    "invalid size",
    "invalid amount",
    "invalid signature",
    "invalid api key",
    "not enough balance",
    "insufficient balance",
    "insufficient funds",
    "allowance",
    "tick size",
    "min size",
    "minimum order",
    "lower than the minimum",
    "market not found",
    "market closed",
    "market is closed",
    "orderbook does not exist",
    "unauthorized",
];

/// Places limit orders on the CLOB through the SDK client.
pub struct TradingClient {
    wallet: Arc<PolymarketWallet>,
}

impl TradingClient {
    pub fn new(wallet: Arc<PolymarketWallet>) -> Self {
        Self { wallet }
    }

    /// Place a limit order.
    ///
    /// * `token_id`: CTF outcome token ID (decimal string).
    /// * `size`: number of shares.
    /// * `price`: price per share (0..1).
    pub async fn place_limit_order(
        &self,
        token_id: &str,
        side: Side,
        size: Decimal,
        price: Decimal,
    ) -> Result<OrderReceipt, SubmitError> {
        let sdk_side = match side {
            Side::Buy => SdkSide::Buy,
            Side::Sell => SdkSide::Sell,
        };
        let token_id_u256 = U256::from_str_radix(token_id, 10)
            .map_err(|e| SubmitError::Fatal(format!("token id {token_id}: {e}")))?;

        let client = self.wallet.client();

        // Building may fetch tick size and fee rate, so it can fail in transit.
        let signable_order = client
            .limit_order()
            .token_id(token_id_u256)
            .side(sdk_side)
            .price(price)
            .size(size)
            .build()
            .await
            .map_err(|e| classify(&format!("order build failed: {e}")))?;

        // Signing is local; a failure is a parameter problem.
        let signed_order = client
            .sign(self.wallet.signer(), signable_order)
            .await
            .map_err(|e| SubmitError::Fatal(format!("signing failed: {e}")))?;

        let response = client
            .post_order(signed_order)
            .await
            .map_err(|e| classify(&e.to_string()))?;

        tracing::info!(
            order_id = %response.order_id,
            status = ?response.status,
            "Order submitted to CLOB"
        );

        Ok(OrderReceipt {
            order_id: response.order_id,
            status: Some(format!("{:?}", response.status)),
        })
    }
}

#[async_trait]
impl OrderSubmitter for TradingClient {
    async fn submit_order(&self, request: &ExecutionRequest) -> Result<OrderReceipt, SubmitError> {
        let shares = shares_for(request.requested_size_usd, request.limit_price)?;

        // The CLOB settles off-chain; the hint is recorded for correlation.
        tracing::debug!(
            market = %request.key_market,
            gas_price_hint = %request.gas_price_hint,
            shares = %shares,
            "Submitting frontrun order"
        );

        self.place_limit_order(&request.outcome_id, request.side, shares, request.limit_price)
            .await
    }
}

/// Share count for a USD notional at `price`, rounded down to cents.
pub fn shares_for(size_usd: Decimal, price: Decimal) -> Result<Decimal, SubmitError> {
    if price <= Decimal::ZERO || price >= Decimal::ONE {
        return Err(SubmitError::Fatal(format!("price {price} outside (0, 1)")));
    }
    let shares = (size_usd / price).round_dp_with_strategy(2, rust_decimal::RoundingStrategy::ToZero);
    if shares <= Decimal::ZERO {
        return Err(SubmitError::Fatal(format!("size {size_usd} rounds to zero shares")));
    }
    Ok(shares)
}

/// Split a post failure into retryable and terminal. Anything not
/// recognised as a rejection is retried.
pub fn classify(message: &str) -> SubmitError {
    let lower = message.to_lowercase();
    let transport = TRANSPORT_MARKERS.iter().any(|m| lower.contains(m));
    if !transport && FATAL_MARKERS.iter().any(|m| lower.contains(m)) {
        SubmitError::Fatal(message.to_string())
    } else {
        SubmitError::Recoverable(message.to_string())
    }
}
