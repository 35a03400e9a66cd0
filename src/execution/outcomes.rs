use std::sync::{Arc, Mutex, PoisonError};

use metrics::counter;
use tokio::sync::{broadcast, mpsc};

use crate::models::{ExecutionOutcome, OutcomeStatus};

const OUTCOME_CHANNEL_CAPACITY: usize = 1024;

/// Fan-out point for terminal ExecutionOutcomes.
///
/// Best-effort subscribers (the dashboard socket, notifications) share a
/// bounded broadcast and lag rather than stall the pipeline. Lossless
/// subscribers (persistence) each get an unbounded queue that sees every
/// outcome.
#[derive(Clone)]
pub struct OutcomePublisher {
    tx: broadcast::Sender<ExecutionOutcome>,
    lossless: Arc<Mutex<Vec<mpsc::UnboundedSender<ExecutionOutcome>>>>,
}

impl Default for OutcomePublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl OutcomePublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);
        Self {
            tx,
            lossless: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionOutcome> {
        self.tx.subscribe()
    }

    /// Every outcome published from now on, never dropped. The receiver
    /// closes once the publisher and all its clones are gone.
    pub fn subscribe_lossless(&self) -> mpsc::UnboundedReceiver<ExecutionOutcome> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lossless
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn publish(&self, outcome: ExecutionOutcome) {
        counter!("execution_outcomes_total", "status" => outcome.status.as_str()).increment(1);

        match outcome.status {
            OutcomeStatus::Submitted | OutcomeStatus::Confirmed => tracing::info!(
                key = %outcome.key,
                status = %outcome.status,
                attempts = outcome.attempts,
                size_usd = %outcome.requested_size_usd,
                order_id = ?outcome.order_id,
                "Execution outcome"
            ),
            OutcomeStatus::Failed => tracing::error!(
                key = %outcome.key,
                attempts = outcome.attempts,
                error = ?outcome.error,
                "Execution failed"
            ),
            _ => tracing::debug!(
                key = %outcome.key,
                status = %outcome.status,
                "Signal skipped"
            ),
        }

        self.lossless
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|sink| sink.send(outcome.clone()).is_ok());

        // No subscribers is not an error.
        let _ = self.tx.send(outcome);
    }
}
