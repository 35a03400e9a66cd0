use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use metrics::counter;
use tokio::time::Instant;

use crate::models::{ConfirmationState, TradeSignal};
use crate::pipeline::queue::{QueueReceiver, QueueSender};

/// What the merger did with one incoming signal.
#[derive(Debug)]
pub enum MergeOutcome {
    /// First sighting of this trade; forward downstream.
    Forward(TradeSignal),
    /// Already forwarded. `upgraded` is true when this copy carried a newer
    /// confirmation state than the one on record.
    Duplicate { upgraded: bool },
}

#[derive(Debug, Clone, Copy)]
struct SeenEntry {
    confirmation: ConfirmationState,
    first_seen: Instant,
}

/// Identity cache deduplicating the union of the live and polled streams.
///
/// Entries expire after `ttl`; when the cache grows past `max_entries` the
/// oldest entries are evicted first. The map is sharded so concurrent
/// admits on unrelated ids do not contend.
pub struct SignalMerger {
    seen: DashMap<String, SeenEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl SignalMerger {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            seen: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Record `signal` and decide whether it is new.
    pub fn admit(&self, signal: TradeSignal) -> MergeOutcome {
        let now = Instant::now();

        let outcome = match self.seen.entry(signal.id.clone()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if now.duration_since(entry.first_seen) >= self.ttl {
                    // Stale identity: treat as a fresh sighting.
                    *entry = SeenEntry {
                        confirmation: signal.confirmation,
                        first_seen: now,
                    };
                    MergeOutcome::Forward(signal)
                } else if signal.confirmation > entry.confirmation {
                    entry.confirmation = signal.confirmation;
                    MergeOutcome::Duplicate { upgraded: true }
                } else {
                    MergeOutcome::Duplicate { upgraded: false }
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(SeenEntry {
                    confirmation: signal.confirmation,
                    first_seen: now,
                });
                MergeOutcome::Forward(signal)
            }
        };

        if matches!(outcome, MergeOutcome::Forward(_)) && self.seen.len() > self.max_entries {
            self.evict(now);
        }

        outcome
    }

    /// Best known confirmation state of a forwarded trade.
    pub fn confirmation_of(&self, id: &str) -> Option<ConfirmationState> {
        self.seen.get(id).map(|e| e.confirmation)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Drop expired entries, then the oldest ones until under the cap.
    pub fn evict(&self, now: Instant) {
        let ttl = self.ttl;
        self.seen.retain(|_, e| now.duration_since(e.first_seen) < ttl);

        let overflow = self.seen.len().saturating_sub(self.max_entries);
        if overflow == 0 {
            return;
        }

        let mut by_age: Vec<(String, Instant)> = self
            .seen
            .iter()
            .map(|e| (e.key().clone(), e.value().first_seen))
            .collect();
        by_age.sort_by_key(|(_, seen)| *seen);
        for (id, _) in by_age.into_iter().take(overflow) {
            self.seen.remove(&id);
        }
    }
}

/// Run the merge stage: consume raw signals from both sources and forward
/// unique ones downstream. Exits once every source has hung up.
pub async fn run_merger(
    merger: std::sync::Arc<SignalMerger>,
    mut raw_rx: QueueReceiver<TradeSignal>,
    unique_tx: QueueSender<TradeSignal>,
) {
    let mut sweep = tokio::time::interval(merger.ttl.max(Duration::from_secs(1)));
    sweep.tick().await;

    loop {
        tokio::select! {
            signal = raw_rx.recv() => {
                let Some(signal) = signal else { break };
                let id = signal.id.clone();
                let source = signal.source;
                match merger.admit(signal) {
                    MergeOutcome::Forward(signal) => {
                        counter!("signals_forwarded_total").increment(1);
                        tracing::debug!(id = %id, source = %source, "Signal forwarded");
                        if unique_tx.send(signal).is_err() {
                            tracing::warn!("Merger downstream closed");
                            break;
                        }
                    }
                    MergeOutcome::Duplicate { upgraded } => {
                        counter!("signals_deduplicated_total").increment(1);
                        tracing::debug!(id = %id, source = %source, upgraded, "Duplicate signal dropped");
                    }
                }
            }
            _ = sweep.tick() => {
                merger.evict(Instant::now());
            }
        }
    }

    tracing::info!("Merger stopped");
}
