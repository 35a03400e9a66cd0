use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc};

use polyfront::config::PipelineConfig;
use polyfront::models::{
    ConfirmationState, ExecutionOutcome, ExecutionRequest, OrderReceipt, Side, SourceType,
    TradeSignal,
};
use polyfront::pipeline::Collaborators;
use polyfront::ports::{
    ActivitySource, BalanceOracle, DecodeResult, FeedError, GasPriceOracle, OrderSubmitter,
    PendingTxFeed, PendingTxStream, RawTransaction, SubmitError, TxDecoder,
};

pub const WATCHED: &str = "0xabc";

/// Pipeline settings with short timings for tests.
#[allow(dead_code)]
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        watched_accounts: vec![WATCHED.into()],
        poll_interval: Duration::from_secs(2),
        min_trade_size_usd: Decimal::from(100),
        frontrun_size_multiplier: Decimal::new(5, 1),
        gas_price_multiplier: Decimal::new(12, 1),
        retry_limit: 3,
        retry_backoff: Duration::from_millis(10),
        aggregation_enabled: false,
        aggregation_window: Duration::from_secs(1),
        ..PipelineConfig::default()
    }
}

#[allow(dead_code)]
pub fn signal(id: &str, source: SourceType, market: &str, size: i64) -> TradeSignal {
    TradeSignal {
        id: id.into(),
        source,
        account: WATCHED.into(),
        market_id: market.into(),
        outcome_id: market.into(),
        side: Side::Buy,
        size_usd: Decimal::from(size),
        price: Decimal::new(5, 1),
        detected_at: Utc::now(),
        confirmation: match source {
            SourceType::Live => ConfirmationState::Pending,
            SourceType::Polled => ConfirmationState::Confirmed,
        },
    }
}

// ---------------------------------------------------------------------------
// Live side
// ---------------------------------------------------------------------------

/// Feed backed by a channel. The first subscription gets the channel;
/// later ones get a stream that never yields.
pub struct ChannelFeed {
    rx: Mutex<Option<mpsc::UnboundedReceiver<RawTransaction>>>,
}

impl ChannelFeed {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<RawTransaction>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { rx: Mutex::new(Some(rx)) }), tx)
    }
}

#[async_trait]
impl PendingTxFeed for ChannelFeed {
    async fn subscribe(&self) -> Result<PendingTxStream, FeedError> {
        let taken = self.rx.lock().unwrap().take();
        match taken {
            Some(rx) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|tx| (Ok::<_, FeedError>(tx), rx))
            })
            .boxed()),
            None => Ok(stream::pending().boxed()),
        }
    }
}

/// Decoder that looks signals up by transaction hash.
#[derive(Default)]
pub struct TableDecoder {
    signals: HashMap<String, TradeSignal>,
}

impl TableDecoder {
    pub fn new(signals: Vec<TradeSignal>) -> Arc<Self> {
        Arc::new(Self {
            signals: signals.into_iter().map(|s| (s.id.clone(), s)).collect(),
        })
    }
}

impl TxDecoder for TableDecoder {
    fn try_decode(&self, tx: &RawTransaction) -> DecodeResult {
        match self.signals.get(&tx.hash) {
            Some(signal) => DecodeResult::Decoded(vec![signal.clone()]),
            None => DecodeResult::NotApplicable,
        }
    }
}

#[allow(dead_code)]
pub fn pending_tx(hash: &str) -> RawTransaction {
    RawTransaction {
        hash: hash.into(),
        from: Some(WATCHED.into()),
        to: None,
        input: "0x".into(),
    }
}

// ---------------------------------------------------------------------------
// Polling side
// ---------------------------------------------------------------------------

/// Returns one scripted batch per poll of the watched account, then empty
/// batches. Each batch is newest first.
pub struct ScriptedActivity {
    cycles: Mutex<VecDeque<Vec<TradeSignal>>>,
}

impl ScriptedActivity {
    pub fn new(cycles: Vec<Vec<TradeSignal>>) -> Arc<Self> {
        Arc::new(Self {
            cycles: Mutex::new(cycles.into()),
        })
    }
}

#[async_trait]
impl ActivitySource for ScriptedActivity {
    async fn poll_recent_activity(&self, account: &str) -> anyhow::Result<Vec<TradeSignal>> {
        if account != WATCHED {
            return Ok(Vec::new());
        }
        Ok(self.cycles.lock().unwrap().pop_front().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Execution side
// ---------------------------------------------------------------------------

/// Fails the first `fail_first` calls with `error`, then succeeds after
/// holding each call for `delay`.
pub struct ScriptedSubmitter {
    fail_first: u32,
    error: SubmitError,
    delay: Duration,
    calls: AtomicU32,
}

#[allow(dead_code)]
impl ScriptedSubmitter {
    pub fn ok() -> Arc<Self> {
        Self::build(0, SubmitError::Recoverable(String::new()), Duration::ZERO)
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Self::build(0, SubmitError::Recoverable(String::new()), delay)
    }

    pub fn failing(fail_first: u32, error: SubmitError) -> Arc<Self> {
        Self::build(fail_first, error, Duration::ZERO)
    }

    fn build(fail_first: u32, error: SubmitError, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            fail_first,
            error,
            delay,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderSubmitter for ScriptedSubmitter {
    async fn submit_order(&self, _request: &ExecutionRequest) -> Result<OrderReceipt, SubmitError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if n <= self.fail_first {
            return Err(self.error.clone());
        }
        Ok(OrderReceipt {
            order_id: format!("order-{n}"),
            status: Some("live".into()),
        })
    }
}

pub struct FixedBalance(pub bool);

#[async_trait]
impl BalanceOracle for FixedBalance {
    async fn has_sufficient_balance(
        &self,
        _outcome_id: &str,
        _side: Side,
        _size_usd: Decimal,
        _price: Decimal,
    ) -> anyhow::Result<bool> {
        Ok(self.0)
    }
}

pub struct FixedGas(pub Decimal);

#[async_trait]
impl GasPriceOracle for FixedGas {
    async fn current_gas_price(&self) -> anyhow::Result<Decimal> {
        Ok(self.0)
    }
}

/// Wire the stubs together. The feed sender is returned for the test to drive.
#[allow(dead_code)]
pub fn collaborators(
    decoded: Vec<TradeSignal>,
    polls: Vec<Vec<TradeSignal>>,
    submitter: Arc<ScriptedSubmitter>,
    funded: bool,
) -> (Collaborators, mpsc::UnboundedSender<RawTransaction>) {
    let (feed, feed_tx) = ChannelFeed::new();
    let collaborators = Collaborators {
        feed,
        decoder: TableDecoder::new(decoded),
        activity: ScriptedActivity::new(polls),
        submitter,
        balance: Arc::new(FixedBalance(funded)),
        gas: Arc::new(FixedGas(Decimal::from(30))),
    };
    (collaborators, feed_tx)
}

/// Everything published until the channel closes.
#[allow(dead_code)]
pub async fn drain(mut rx: broadcast::Receiver<ExecutionOutcome>) -> Vec<ExecutionOutcome> {
    let mut out = Vec::new();
    loop {
        match rx.recv().await {
            Ok(outcome) => out.push(outcome),
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return out,
        }
    }
}
