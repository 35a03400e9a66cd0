use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{ExecutionRequest, OrderReceipt, Side};
use crate::ports::{BalanceOracle, OrderSubmitter, SubmitError};

/// Stand-in submitter used when no wallet is configured. Logs the order it
/// would have placed and returns a synthetic receipt.
#[derive(Debug, Default)]
pub struct DryRunSubmitter {
    seq: AtomicU64,
}

impl DryRunSubmitter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderSubmitter for DryRunSubmitter {
    async fn submit_order(&self, request: &ExecutionRequest) -> Result<OrderReceipt, SubmitError> {
        let n = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            wallet = %request.key_account,
            market = %request.key_market,
            token_id = %request.outcome_id,
            side = %request.side,
            size_usd = %request.requested_size_usd,
            price = %request.limit_price,
            gas_price_hint = %request.gas_price_hint,
            "DRY RUN: would place frontrun order"
        );
        Ok(OrderReceipt {
            order_id: format!("dry-run-{n}"),
            status: Some("dry_run".into()),
        })
    }
}

/// Balance oracle for dry-run mode: a fixed bankroll in USD, with shares
/// valued at the order price.
#[derive(Debug, Clone)]
pub struct PaperBalance {
    bankroll: Decimal,
}

impl PaperBalance {
    pub fn new(bankroll: Decimal) -> Self {
        Self { bankroll }
    }
}

#[async_trait]
impl BalanceOracle for PaperBalance {
    async fn has_sufficient_balance(
        &self,
        _outcome_id: &str,
        _side: Side,
        size_usd: Decimal,
        _price: Decimal,
    ) -> anyhow::Result<bool> {
        Ok(size_usd <= self.bankroll)
    }
}
