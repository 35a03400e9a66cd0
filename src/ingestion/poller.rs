use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use metrics::counter;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::MIN_POLL_INTERVAL;
use crate::models::TradeSignal;
use crate::pipeline::queue::QueueSender;
use crate::ports::ActivitySource;

/// Bounded set of recently emitted trade IDs with FIFO eviction.
#[derive(Debug)]
pub struct RecentIds {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl RecentIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record `id`. Returns false if it was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(id.to_string());
        self.order.push_back(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Poll the market API for watched accounts' recent trades.
///
/// Flow:
/// 1. Accounts are queried concurrently each cycle
/// 2. An account's first successful poll records its visible trades without emitting
/// 3. Later polls forward trades whose ID has not been seen
/// 4. A failing account is logged, counted and retried next cycle
pub async fn run_poller(
    source: Arc<dyn ActivitySource>,
    accounts: Vec<String>,
    poll_interval: Duration,
    recent_capacity: usize,
    signal_tx: QueueSender<TradeSignal>,
    mut shutdown: watch::Receiver<bool>,
) {
    let poll_interval = if poll_interval < MIN_POLL_INTERVAL {
        tracing::warn!(
            requested_ms = poll_interval.as_millis() as u64,
            floor_ms = MIN_POLL_INTERVAL.as_millis() as u64,
            "Poll interval below floor — raising"
        );
        MIN_POLL_INTERVAL
    } else {
        poll_interval
    };

    tracing::info!(
        interval_secs = poll_interval.as_secs(),
        account_count = accounts.len(),
        "Activity poller started"
    );

    let mut recent = RecentIds::new(recent_capacity);
    let mut primed: HashSet<String> = HashSet::new();
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }

        let polls = join_all(accounts.iter().map(|account| {
            let source = &source;
            async move { (account, source.poll_recent_activity(account).await) }
        }));
        let results = tokio::select! {
            results = polls => results,
            _ = shutdown.changed() => break,
        };

        let mut fresh = Vec::new();
        for (account, result) in results {
            let signals = match result {
                Ok(s) => s,
                Err(e) => {
                    counter!("poll_errors_total").increment(1);
                    tracing::warn!(error = %e, address = %account, "Activity poll failed — account skipped this cycle");
                    continue;
                }
            };

            if primed.insert(account.clone()) {
                for signal in &signals {
                    recent.insert(&signal.id);
                }
                tracing::info!(address = %account, known_trades = signals.len(), "Activity poller primed");
                continue;
            }

            // API returns newest first; forward in chronological order.
            fresh.extend(signals.into_iter().rev());
        }

        let mut new_trades = 0u32;
        for signal in fresh {
            if !recent.insert(&signal.id) {
                continue;
            }
            counter!("signals_detected_total", "source" => "polled").increment(1);
            tracing::info!(
                wallet = %signal.account,
                market = %signal.market_id,
                side = %signal.side,
                size_usd = %signal.size_usd,
                "Trade detected via poller"
            );
            if signal_tx.send(signal).is_err() {
                tracing::warn!("Merger queue closed — stopping poller");
                return;
            }
            new_trades += 1;
        }

        if new_trades > 0 {
            tracing::debug!(new_trades, "Poll cycle complete");
        }
    }

    tracing::info!("Activity poller stopped");
}
