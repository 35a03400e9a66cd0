use std::collections::VecDeque;

use sqlx::PgPool;
use tokio::sync::{mpsc, RwLock};

use crate::db::outcome_repo;
use crate::models::{ExecutionOutcome, OutcomeRecord};

/// In-memory ring of the most recent terminal outcomes, newest first.
#[derive(Debug)]
pub struct OutcomeLog {
    entries: RwLock<VecDeque<OutcomeRecord>>,
    capacity: usize,
}

impl OutcomeLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    pub async fn push(&self, record: OutcomeRecord) {
        let mut entries = self.entries.write().await;
        entries.push_front(record);
        entries.truncate(self.capacity);
    }

    pub async fn recent(&self, status: Option<&str>, limit: usize) -> Vec<OutcomeRecord> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Record every published outcome into the ring and, when configured,
/// Postgres. Fed by a lossless subscription; runs until the publisher is
/// dropped.
pub async fn run_outcome_recorder(
    log: std::sync::Arc<OutcomeLog>,
    db: Option<PgPool>,
    mut rx: mpsc::UnboundedReceiver<ExecutionOutcome>,
) {
    while let Some(outcome) = rx.recv().await {
        if let Some(pool) = &db {
            if let Err(e) = outcome_repo::insert_outcome(pool, &outcome).await {
                tracing::error!(error = %e, outcome_id = %outcome.id, "Failed to persist outcome");
            }
        }
        log.push(OutcomeRecord::from(&outcome)).await;
    }

    tracing::info!("Outcome recorder stopped");
}
