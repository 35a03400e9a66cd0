use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use metrics::counter;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::models::TradeSignal;
use crate::pipeline::queue::QueueSender;
use crate::ports::{DecodeResult, PendingTxFeed, TxDecoder};

const BASE_RECONNECT_DELAY: Duration = Duration::from_secs(2);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// Exponential backoff with cap, `attempt` counted from zero.
pub fn reconnect_delay(attempt: u32) -> Duration {
    (BASE_RECONNECT_DELAY * 2u32.saturating_pow(attempt)).min(MAX_RECONNECT_DELAY)
}

/// Run the live pending-transaction listener.
///
/// Subscribes to the feed, decodes each transaction and forwards watched
/// accounts' order submissions. A dropped subscription is re-established
/// with exponential backoff; the poller covers the gap.
pub async fn run_mempool_listener(
    feed: Arc<dyn PendingTxFeed>,
    decoder: Arc<dyn TxDecoder>,
    signal_tx: QueueSender<TradeSignal>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;

    while !*shutdown.borrow() {
        let subscribed = tokio::select! {
            result = feed.subscribe() => result,
            _ = shutdown.changed() => break,
        };

        match subscribed {
            Ok(mut stream) => {
                tracing::info!("Pending transaction feed subscribed");
                attempt = 0;

                loop {
                    tokio::select! {
                        item = stream.next() => match item {
                            Some(Ok(tx)) => match decoder.try_decode(&tx) {
                                DecodeResult::Decoded(signals) => {
                                    for signal in signals {
                                        counter!("signals_detected_total", "source" => "live").increment(1);
                                        tracing::info!(
                                            wallet = %signal.account,
                                            market = %signal.market_id,
                                            side = %signal.side,
                                            size_usd = %signal.size_usd,
                                            price = %signal.price,
                                            id = %signal.id,
                                            "Pending trade detected"
                                        );
                                        if signal_tx.send(signal).is_err() {
                                            tracing::warn!("Merger queue closed — stopping live listener");
                                            return;
                                        }
                                    }
                                }
                                DecodeResult::NotApplicable => {}
                                DecodeResult::Malformed(reason) => {
                                    counter!("decode_errors_total").increment(1);
                                    tracing::debug!(tx = %tx.hash, reason = %reason, "Malformed order payload");
                                }
                            },
                            Some(Err(e)) => {
                                tracing::error!(error = %e, "Pending transaction feed error");
                                break;
                            }
                            None => {
                                tracing::warn!("Pending transaction feed ended");
                                break;
                            }
                        },
                        _ = shutdown.changed() => {
                            tracing::info!("Live listener stopped");
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Pending transaction feed subscription failed");
            }
        }

        counter!("feed_reconnects_total").increment(1);
        let delay = reconnect_delay(attempt);
        attempt = attempt.saturating_add(1);
        tracing::info!(delay_secs = delay.as_secs(), attempt, "Live feed reconnecting...");

        tokio::select! {
            _ = sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    tracing::info!("Live listener stopped");
}
