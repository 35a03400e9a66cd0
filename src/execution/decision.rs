use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::config::PipelineConfig;
use crate::models::{AggregatedSignal, ExecutionOutcome, ExecutionRequest, OutcomeStatus};
use crate::pipeline::queue::{QueueReceiver, QueueSender};
use crate::ports::{BalanceOracle, GasPriceOracle};

use super::inflight::{InFlightGuard, InFlightTable};
use super::outcomes::OutcomePublisher;

/// Sizing and filtering parameters.
#[derive(Debug, Clone)]
pub struct DecisionConfig {
    pub min_trade_size_usd: Decimal,
    pub frontrun_size_multiplier: Decimal,
    pub gas_price_multiplier: Decimal,
}

impl From<&PipelineConfig> for DecisionConfig {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            min_trade_size_usd: cfg.min_trade_size_usd,
            frontrun_size_multiplier: cfg.frontrun_size_multiplier,
            gas_price_multiplier: cfg.gas_price_multiplier,
        }
    }
}

/// An accepted request together with the lock on its key.
#[derive(Debug)]
pub struct Dispatch {
    pub request: ExecutionRequest,
    pub guard: InFlightGuard,
}

#[derive(Debug)]
pub enum Decision {
    Execute(Dispatch),
    Skip(ExecutionOutcome),
}

/// Filters aggregated signals and sizes the responsive order.
pub struct DecisionEngine {
    config: DecisionConfig,
    in_flight: InFlightTable,
    balance: Arc<dyn BalanceOracle>,
    gas: Arc<dyn GasPriceOracle>,
    last_gas_price: Mutex<Option<Decimal>>,
}

impl DecisionEngine {
    pub fn new(
        config: DecisionConfig,
        in_flight: InFlightTable,
        balance: Arc<dyn BalanceOracle>,
        gas: Arc<dyn GasPriceOracle>,
    ) -> Self {
        Self {
            config,
            in_flight,
            balance,
            gas,
            last_gas_price: Mutex::new(None),
        }
    }

    pub fn in_flight(&self) -> &InFlightTable {
        &self.in_flight
    }

    /// Run one aggregated signal through the filters:
    /// 1. below minimum size (or sized to zero) → skipped
    /// 2. key already in flight → skipped as duplicate
    /// 3. balance cannot fund the response → skipped
    /// 4. compute size and gas hint, emit with the key held
    pub async fn decide(&self, signal: &AggregatedSignal) -> Decision {
        let requested = signal.net_size_usd * self.config.frontrun_size_multiplier;

        // 1. Size filter
        if signal.net_size_usd < self.config.min_trade_size_usd || requested <= Decimal::ZERO {
            tracing::debug!(
                key = %signal.key,
                net_size_usd = %signal.net_size_usd,
                min = %self.config.min_trade_size_usd,
                "Signal below threshold"
            );
            return self.skip(signal, OutcomeStatus::SkippedBelowThreshold, requested);
        }

        // 2. In-flight lock, taken now and released on any later rejection
        let Some(guard) = self.in_flight.try_acquire(&signal.key) else {
            tracing::info!(key = %signal.key, "Key already in flight — duplicate");
            return self.skip(signal, OutcomeStatus::SkippedDuplicate, requested);
        };

        // 3. Balance sufficiency for the response size
        match self
            .balance
            .has_sufficient_balance(&signal.outcome_id, signal.key.side, requested, signal.price)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    key = %signal.key,
                    required_usd = %requested,
                    "Insufficient balance — skipping"
                );
                drop(guard);
                return self.skip(signal, OutcomeStatus::SkippedInsufficientBalance, requested);
            }
            Err(e) => {
                tracing::warn!(
                    key = %signal.key,
                    error = %e,
                    "Balance check failed — treating as insufficient"
                );
                drop(guard);
                return self.skip(signal, OutcomeStatus::SkippedInsufficientBalance, requested);
            }
        }

        // 4. Gas hint
        let gas_price = self.gas_price().await;
        let gas_price_hint = gas_price * self.config.gas_price_multiplier;

        let request = ExecutionRequest {
            key_account: signal.key.account.clone(),
            key_market: signal.key.market_id.clone(),
            outcome_id: signal.outcome_id.clone(),
            side: signal.key.side,
            requested_size_usd: requested,
            limit_price: signal.price,
            gas_price_hint,
            origin_signal_ids: signal.member_ids.clone(),
            first_detected_at: signal.first_detected_at,
        };

        tracing::info!(
            key = %signal.key,
            requested_size_usd = %request.requested_size_usd,
            limit_price = %request.limit_price,
            gas_price_hint = %request.gas_price_hint,
            "ExecutionRequest emitted"
        );

        Decision::Execute(Dispatch { request, guard })
    }

    /// Current gas price, falling back to the last good reading (or zero)
    /// when the oracle errors.
    async fn gas_price(&self) -> Decimal {
        match self.gas.current_gas_price().await {
            Ok(price) => {
                *self.last_gas_price.lock().await = Some(price);
                price
            }
            Err(e) => {
                let fallback = self.last_gas_price.lock().await.unwrap_or(Decimal::ZERO);
                tracing::warn!(error = %e, fallback = %fallback, "Gas oracle failed, using last price");
                fallback
            }
        }
    }

    fn skip(&self, signal: &AggregatedSignal, status: OutcomeStatus, requested: Decimal) -> Decision {
        Decision::Skip(ExecutionOutcome::skipped(
            signal.key.clone(),
            status,
            requested,
            signal.member_ids.clone(),
        ))
    }
}

/// Run the decision stage: one aggregated signal at a time, accepted
/// requests to the executor queue, rejections straight to the publisher.
pub async fn run_decision_engine(
    engine: Arc<DecisionEngine>,
    mut agg_rx: QueueReceiver<AggregatedSignal>,
    exec_tx: QueueSender<Dispatch>,
    outcomes: OutcomePublisher,
) {
    while let Some(signal) = agg_rx.recv().await {
        match engine.decide(&signal).await {
            Decision::Execute(dispatch) => {
                if exec_tx.send(dispatch).is_err() {
                    tracing::error!("Executor queue closed — dropping request");
                    break;
                }
            }
            Decision::Skip(outcome) => outcomes.publish(outcome),
        }
    }

    tracing::info!("Decision engine stopped");
}
