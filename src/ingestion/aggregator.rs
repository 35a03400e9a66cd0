use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use metrics::counter;
use tokio::time::Instant;

use crate::models::{AggregatedSignal, SignalKey, TradeSignal};
use crate::pipeline::queue::{QueueReceiver, QueueSender};

struct OpenWindow {
    signal: AggregatedSignal,
    closes_at: Instant,
}

/// Coalesces same-key TradeSignals within a fixed window.
///
/// One open window per `(account, market, side)`. Windows are sealed by
/// [`Aggregator::sweep`], never by an arriving signal, so a signal that
/// arrives after the deadline but before the next sweep still joins.
/// Once sealed, the next signal for that key opens a new window.
pub struct Aggregator {
    enabled: bool,
    window: Duration,
    open: DashMap<SignalKey, OpenWindow>,
}

impl Aggregator {
    pub fn new(enabled: bool, window: Duration) -> Self {
        Self {
            enabled,
            window,
            open: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Feed one unique signal. Returns an aggregate ready for the decision
    /// stage only when aggregation is disabled.
    pub fn add(&self, signal: &TradeSignal) -> Option<AggregatedSignal> {
        if !self.enabled {
            return Some(AggregatedSignal::single(signal));
        }

        match self.open.entry(signal.key()) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().signal.absorb(signal);
                tracing::debug!(
                    key = %signal.key(),
                    members = occupied.get().signal.member_ids.len(),
                    "Signal joined open window"
                );
            }
            Entry::Vacant(vacant) => {
                let start = Utc::now();
                let end = start
                    + chrono::Duration::from_std(self.window).unwrap_or(chrono::Duration::zero());
                vacant.insert(OpenWindow {
                    signal: AggregatedSignal::open(signal, start, end),
                    closes_at: Instant::now() + self.window,
                });
                tracing::debug!(key = %signal.key(), "Aggregation window opened");
            }
        }
        None
    }

    /// Seal and return every window whose deadline has passed.
    pub fn sweep(&self, now: Instant) -> Vec<AggregatedSignal> {
        let expired: Vec<SignalKey> = self
            .open
            .iter()
            .filter(|w| w.closes_at <= now)
            .map(|w| w.key().clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|key| self.open.remove_if(&key, |_, w| w.closes_at <= now))
            .map(|(_, w)| w.signal)
            .collect()
    }

    /// Seal every open window regardless of deadline.
    pub fn drain(&self) -> Vec<AggregatedSignal> {
        let keys: Vec<SignalKey> = self.open.iter().map(|w| w.key().clone()).collect();
        keys.into_iter()
            .filter_map(|key| self.open.remove(&key))
            .map(|(_, w)| w.signal)
            .collect()
    }

    pub fn open_windows(&self) -> usize {
        self.open.len()
    }
}

/// Run the aggregation stage. A periodic sweep seals expired windows; when
/// the upstream queue closes every open window is flushed before exiting.
pub async fn run_aggregator(
    aggregator: Arc<Aggregator>,
    mut unique_rx: QueueReceiver<TradeSignal>,
    agg_tx: QueueSender<AggregatedSignal>,
) {
    let period = (aggregator.window / 4).max(Duration::from_millis(10));
    let mut sweep = tokio::time::interval(period);
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            signal = unique_rx.recv() => {
                let Some(signal) = signal else { break };
                if let Some(agg) = aggregator.add(&signal) {
                    if !forward(&agg_tx, agg) {
                        return;
                    }
                }
            }
            _ = sweep.tick(), if aggregator.is_enabled() => {
                for agg in aggregator.sweep(Instant::now()) {
                    if !forward(&agg_tx, agg) {
                        return;
                    }
                }
            }
        }
    }

    for agg in aggregator.drain() {
        if !forward(&agg_tx, agg) {
            break;
        }
    }
    tracing::info!("Aggregator stopped");
}

fn forward(tx: &QueueSender<AggregatedSignal>, agg: AggregatedSignal) -> bool {
    counter!("aggregated_signals_total").increment(1);
    tracing::info!(
        key = %agg.key,
        net_size_usd = %agg.net_size_usd,
        members = agg.member_ids.len(),
        "Aggregated signal sealed"
    );
    if tx.send(agg).is_err() {
        tracing::warn!("Aggregator downstream closed");
        return false;
    }
    true
}
