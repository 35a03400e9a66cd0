//! Wiring of the detection-and-reaction stages.
//!
//! ```text
//! live listener ─┐
//!                ├─ raw ─▶ merger ─ unique ─▶ aggregator ─ agg ─▶ decision ─ exec ─▶ executor
//! poller ────────┘                                                   │                  │
//!                                                                    └──── outcomes ◀───┘
//! ```
//!
//! Each arrow is a depth-monitored queue; each box is its own task.

pub mod queue;

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::PipelineConfig;
use crate::execution::decision::{run_decision_engine, DecisionConfig, DecisionEngine};
use crate::execution::executor::{run_executor, Executor, ExecutorConfig};
use crate::execution::{InFlightTable, OutcomePublisher};
use crate::ingestion::aggregator::run_aggregator;
use crate::ingestion::mempool_listener::run_mempool_listener;
use crate::ingestion::merger::run_merger;
use crate::ingestion::poller::run_poller;
use crate::ingestion::{Aggregator, SignalMerger};
use crate::models::ExecutionOutcome;
use crate::ports::{
    ActivitySource, BalanceOracle, GasPriceOracle, OrderSubmitter, PendingTxFeed, TxDecoder,
};

/// External capabilities the pipeline is built from.
#[derive(Clone)]
pub struct Collaborators {
    pub feed: Arc<dyn PendingTxFeed>,
    pub decoder: Arc<dyn TxDecoder>,
    pub activity: Arc<dyn ActivitySource>,
    pub submitter: Arc<dyn OrderSubmitter>,
    pub balance: Arc<dyn BalanceOracle>,
    pub gas: Arc<dyn GasPriceOracle>,
}

/// A running pipeline. Lives from `start` until `stop`.
pub struct Pipeline {
    shutdown: watch::Sender<bool>,
    sources: Vec<JoinHandle<()>>,
    stages: Vec<JoinHandle<()>>,
    outcomes: OutcomePublisher,
    in_flight: InFlightTable,
}

impl Pipeline {
    /// Spawn every stage and start both sources.
    pub fn start(config: PipelineConfig, collaborators: Collaborators) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let outcomes = OutcomePublisher::new();
        let in_flight = InFlightTable::new();

        let (raw_tx, raw_rx) = queue::monitored("raw");
        let (unique_tx, unique_rx) = queue::monitored("unique");
        let (agg_tx, agg_rx) = queue::monitored("aggregated");
        let (exec_tx, exec_rx) = queue::monitored("execution");

        let sources = vec![
            tokio::spawn(run_mempool_listener(
                collaborators.feed,
                collaborators.decoder,
                raw_tx.clone(),
                shutdown_rx.clone(),
            )),
            tokio::spawn(run_poller(
                collaborators.activity,
                config.watched_accounts.clone(),
                config.poll_interval,
                config.recent_id_capacity,
                raw_tx,
                shutdown_rx,
            )),
        ];

        let merger = Arc::new(SignalMerger::new(config.dedup_ttl, config.dedup_max_entries));
        let aggregator = Arc::new(Aggregator::new(
            config.aggregation_enabled,
            config.aggregation_window,
        ));
        let engine = Arc::new(DecisionEngine::new(
            DecisionConfig::from(&config),
            in_flight.clone(),
            Arc::clone(&collaborators.balance),
            collaborators.gas,
        ));
        let executor = Arc::new(Executor::new(
            collaborators.submitter,
            collaborators.balance,
            ExecutorConfig::from(&config),
        ));

        let stages = vec![
            tokio::spawn(run_merger(merger, raw_rx, unique_tx)),
            tokio::spawn(run_aggregator(aggregator, unique_rx, agg_tx)),
            tokio::spawn(run_decision_engine(engine, agg_rx, exec_tx, outcomes.clone())),
            tokio::spawn(run_executor(executor, exec_rx, outcomes.clone())),
        ];

        tracing::info!(
            accounts = config.watched_accounts.len(),
            aggregation = config.aggregation_enabled,
            "Pipeline started"
        );

        Self {
            shutdown,
            sources,
            stages,
            outcomes,
            in_flight,
        }
    }

    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<ExecutionOutcome> {
        self.outcomes.subscribe()
    }

    /// Outcome feed that never drops, for persistence.
    pub fn subscribe_outcomes_lossless(&self) -> mpsc::UnboundedReceiver<ExecutionOutcome> {
        self.outcomes.subscribe_lossless()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Shared view of the in-flight table, for status reporting.
    pub fn in_flight_table(&self) -> InFlightTable {
        self.in_flight.clone()
    }

    /// Stop both sources, let every stage drain, and wait until all
    /// accepted requests have a published terminal outcome.
    pub async fn stop(self) {
        tracing::info!("Pipeline stopping");
        let _ = self.shutdown.send(true);

        for handle in self.sources.into_iter().chain(self.stages) {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Pipeline task panicked");
            }
        }

        tracing::info!("Pipeline stopped");
    }
}
