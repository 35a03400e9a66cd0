use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, histogram};
use tokio::task::JoinSet;
use tokio::time::sleep;

use crate::config::PipelineConfig;
use crate::models::{ExecutionOutcome, ExecutionRequest, OutcomeStatus};
use crate::pipeline::queue::QueueReceiver;
use crate::ports::{BalanceOracle, OrderSubmitter};

use super::decision::Dispatch;
use super::outcomes::OutcomePublisher;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Total submission attempts, first one included.
    pub retry_limit: u32,
    /// Backoff before attempt `n + 1` is `retry_backoff × n`.
    pub retry_backoff: Duration,
}

impl From<&PipelineConfig> for ExecutorConfig {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            retry_limit: cfg.retry_limit.max(1),
            retry_backoff: cfg.retry_backoff,
        }
    }
}

/// Submits ExecutionRequests and drives each to a terminal outcome.
pub struct Executor {
    submitter: Arc<dyn OrderSubmitter>,
    balance: Arc<dyn BalanceOracle>,
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(
        submitter: Arc<dyn OrderSubmitter>,
        balance: Arc<dyn BalanceOracle>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            submitter,
            balance,
            config,
        }
    }

    /// Execute one request:
    /// 1. Re-verify balance (time has passed since the decision)
    /// 2. Submit, retrying recoverable failures up to the limit
    /// 3. Stop at once on a fatal failure
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        let key = request.key();

        // 1. Balance re-check
        let funded = self
            .balance
            .has_sufficient_balance(
                &request.outcome_id,
                request.side,
                request.requested_size_usd,
                request.limit_price,
            )
            .await;
        let funded = funded.unwrap_or_else(|e| {
            tracing::warn!(key = %key, error = %e, "Balance re-check failed");
            false
        });
        if !funded {
            tracing::warn!(key = %key, "Balance no longer sufficient at execution time");
            let mut outcome = ExecutionOutcome::begin(request);
            outcome.finish(OutcomeStatus::SkippedInsufficientBalance);
            return outcome;
        }

        // 2-3. Submit with retry
        let mut outcome = ExecutionOutcome::begin(request);
        loop {
            outcome.attempts += 1;
            counter!("submission_attempts_total").increment(1);

            match self.submitter.submit_order(request).await {
                Ok(receipt) => {
                    tracing::info!(
                        key = %key,
                        order_id = %receipt.order_id,
                        attempts = outcome.attempts,
                        "Frontrun order submitted"
                    );
                    outcome.order_id = Some(receipt.order_id);
                    outcome.error = None;
                    outcome.finish(OutcomeStatus::Submitted);

                    let latency = (Utc::now() - request.first_detected_at).num_milliseconds();
                    histogram!("detection_to_submit_seconds").record(latency.max(0) as f64 / 1000.0);
                    return outcome;
                }
                Err(e) => {
                    outcome.error = Some(e.to_string());

                    if !e.is_recoverable() {
                        tracing::error!(key = %key, error = %e, "Non-recoverable submission error");
                        outcome.finish(OutcomeStatus::Failed);
                        return outcome;
                    }

                    if outcome.attempts >= self.config.retry_limit {
                        tracing::error!(
                            key = %key,
                            error = %e,
                            attempts = outcome.attempts,
                            "Retry limit exhausted"
                        );
                        outcome.finish(OutcomeStatus::Failed);
                        return outcome;
                    }

                    let delay = self.config.retry_backoff * outcome.attempts;
                    tracing::warn!(
                        key = %key,
                        error = %e,
                        attempt = outcome.attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Submission failed, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Run the execution stage. Each request runs on its own task so one key's
/// backoff never delays another key. When the queue closes, every task
/// still running is awaited before returning.
pub async fn run_executor(
    executor: Arc<Executor>,
    mut exec_rx: QueueReceiver<Dispatch>,
    outcomes: OutcomePublisher,
) {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            dispatch = exec_rx.recv() => {
                let Some(Dispatch { request, guard }) = dispatch else { break };
                let executor = Arc::clone(&executor);
                let outcomes = outcomes.clone();
                tasks.spawn(async move {
                    let outcome = executor.execute(&request).await;
                    outcomes.publish(outcome);
                    // Key released only after the outcome is visible.
                    drop(guard);
                });
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Execution task panicked");
                }
            }
        }
    }

    let pending = tasks.len();
    if pending > 0 {
        tracing::info!(pending, "Executor draining in-flight requests");
    }
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Execution task panicked");
        }
    }

    tracing::info!("Executor stopped");
}
