mod common;

use std::time::Duration;

use rust_decimal::Decimal;
use tokio::time::sleep;

use polyfront::config::PipelineConfig;
use polyfront::models::{OutcomeStatus, SourceType};
use polyfront::pipeline::Pipeline;
use polyfront::ports::SubmitError;

use common::{collaborators, drain, pending_tx, signal, test_config, ScriptedSubmitter};

#[tokio::test(start_paused = true)]
async fn test_same_trade_from_both_sources_executes_once() {
    let live = signal("0xaaa", SourceType::Live, "m1", 400);
    let polled = signal("0xaaa", SourceType::Polled, "m1", 400);
    let submitter = ScriptedSubmitter::ok();

    // First poll primes; the second reports the trade the mempool already saw.
    let (collab, feed_tx) = collaborators(vec![live], vec![vec![], vec![polled]], submitter.clone(), true);
    let pipeline = Pipeline::start(test_config(), collab);
    let rx = pipeline.subscribe_outcomes();

    feed_tx.send(pending_tx("0xaaa")).unwrap();
    sleep(Duration::from_secs(5)).await;
    pipeline.stop().await;

    let outcomes = drain(rx).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, OutcomeStatus::Submitted);
    assert_eq!(outcomes[0].origin_signal_ids, vec!["0xaaa".to_string()]);
    assert_eq!(submitter.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_polled_trade_after_priming_is_executed() {
    let old = signal("0xold", SourceType::Polled, "m1", 400);
    let new = signal("0xnew", SourceType::Polled, "m2", 400);
    let submitter = ScriptedSubmitter::ok();

    let (collab, _feed_tx) = collaborators(
        vec![],
        vec![vec![old.clone()], vec![new, old]],
        submitter.clone(),
        true,
    );
    let pipeline = Pipeline::start(test_config(), collab);
    let rx = pipeline.subscribe_outcomes();

    sleep(Duration::from_secs(5)).await;
    pipeline.stop().await;

    let outcomes = drain(rx).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].key.market_id, "m2");
    assert_eq!(outcomes[0].origin_signal_ids, vec!["0xnew".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_aggregation_merges_same_key_signals() {
    let config = PipelineConfig {
        aggregation_enabled: true,
        ..test_config()
    };
    // Each alone is under the 100 USD threshold; together they clear it.
    let a = signal("0x1", SourceType::Live, "m1", 60);
    let b = signal("0x2", SourceType::Live, "m1", 80);
    let submitter = ScriptedSubmitter::ok();

    let (collab, feed_tx) = collaborators(vec![a, b], vec![], submitter.clone(), true);
    let pipeline = Pipeline::start(config, collab);
    let rx = pipeline.subscribe_outcomes();

    feed_tx.send(pending_tx("0x1")).unwrap();
    feed_tx.send(pending_tx("0x2")).unwrap();
    sleep(Duration::from_secs(3)).await;
    pipeline.stop().await;

    let outcomes = drain(rx).await;
    assert_eq!(outcomes.len(), 1);
    let outcome = &outcomes[0];
    assert_eq!(outcome.status, OutcomeStatus::Submitted);
    assert_eq!(outcome.origin_signal_ids, vec!["0x1".to_string(), "0x2".to_string()]);
    // (60 + 80) × 0.5
    assert_eq!(outcome.requested_size_usd, Decimal::from(70));
    // 30 gwei × 1.2
    assert_eq!(outcome.gas_price_hint, Decimal::from(36));
}

#[tokio::test(start_paused = true)]
async fn test_one_request_in_flight_per_key() {
    let signals = vec![
        signal("0x1", SourceType::Live, "m1", 400),
        signal("0x2", SourceType::Live, "m1", 500),
        signal("0x3", SourceType::Live, "m1", 600),
    ];
    let submitter = ScriptedSubmitter::slow(Duration::from_secs(1));

    let (collab, feed_tx) = collaborators(signals, vec![], submitter.clone(), true);
    let pipeline = Pipeline::start(test_config(), collab);
    let rx = pipeline.subscribe_outcomes();

    feed_tx.send(pending_tx("0x1")).unwrap();
    feed_tx.send(pending_tx("0x2")).unwrap();
    sleep(Duration::from_secs(3)).await;

    // Key released once the first outcome is out.
    feed_tx.send(pending_tx("0x3")).unwrap();
    sleep(Duration::from_secs(3)).await;
    pipeline.stop().await;

    let outcomes = drain(rx).await;
    let statuses: Vec<OutcomeStatus> = outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            OutcomeStatus::SkippedDuplicate,
            OutcomeStatus::Submitted,
            OutcomeStatus::Submitted,
        ]
    );
    assert_eq!(outcomes[0].origin_signal_ids, vec!["0x2".to_string()]);
    assert_eq!(submitter.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_small_trade_skipped_below_threshold() {
    let small = signal("0xsmall", SourceType::Live, "m1", 50);
    let submitter = ScriptedSubmitter::ok();

    let (collab, feed_tx) = collaborators(vec![small], vec![], submitter.clone(), true);
    let pipeline = Pipeline::start(test_config(), collab);
    let rx = pipeline.subscribe_outcomes();

    feed_tx.send(pending_tx("0xsmall")).unwrap();
    sleep(Duration::from_secs(1)).await;
    pipeline.stop().await;

    let outcomes = drain(rx).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, OutcomeStatus::SkippedBelowThreshold);
    assert_eq!(outcomes[0].attempts, 0);
    assert_eq!(submitter.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unfunded_trade_skipped_for_balance() {
    let trade = signal("0xbig", SourceType::Live, "m1", 5_000);
    let submitter = ScriptedSubmitter::ok();

    let (collab, feed_tx) = collaborators(vec![trade], vec![], submitter.clone(), false);
    let pipeline = Pipeline::start(test_config(), collab);
    let in_flight = pipeline.in_flight_table();
    let rx = pipeline.subscribe_outcomes();

    feed_tx.send(pending_tx("0xbig")).unwrap();
    sleep(Duration::from_secs(1)).await;
    pipeline.stop().await;

    let outcomes = drain(rx).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, OutcomeStatus::SkippedInsufficientBalance);
    assert_eq!(submitter.calls(), 0);
    assert!(in_flight.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_recoverable_failures_retried_until_submitted() {
    let trade = signal("0xretry", SourceType::Live, "m1", 400);
    let submitter = ScriptedSubmitter::failing(2, SubmitError::Recoverable("timeout".into()));

    let (collab, feed_tx) = collaborators(vec![trade], vec![], submitter.clone(), true);
    let pipeline = Pipeline::start(test_config(), collab);
    let rx = pipeline.subscribe_outcomes();

    feed_tx.send(pending_tx("0xretry")).unwrap();
    sleep(Duration::from_secs(1)).await;
    pipeline.stop().await;

    let outcomes = drain(rx).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, OutcomeStatus::Submitted);
    assert_eq!(outcomes[0].attempts, 3);
    assert_eq!(outcomes[0].order_id.as_deref(), Some("order-3"));
    assert!(outcomes[0].error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_retry_limit_and_fatal_errors_fail() {
    let trades = vec![
        signal("0xflaky", SourceType::Live, "m1", 400),
        signal("0xbad", SourceType::Live, "m2", 400),
    ];

    // Recoverable forever: stops at the retry limit.
    let flaky = ScriptedSubmitter::failing(10, SubmitError::Recoverable("502".into()));
    let (collab, feed_tx) = collaborators(trades.clone(), vec![], flaky.clone(), true);
    let pipeline = Pipeline::start(test_config(), collab);
    let rx = pipeline.subscribe_outcomes();
    feed_tx.send(pending_tx("0xflaky")).unwrap();
    sleep(Duration::from_secs(1)).await;
    pipeline.stop().await;

    let outcomes = drain(rx).await;
    assert_eq!(outcomes[0].status, OutcomeStatus::Failed);
    assert_eq!(outcomes[0].attempts, 3);
    assert_eq!(flaky.calls(), 3);

    // Fatal: no retry.
    let rejecting = ScriptedSubmitter::failing(10, SubmitError::Fatal("invalid tick size".into()));
    let (collab, feed_tx) = collaborators(trades, vec![], rejecting.clone(), true);
    let pipeline = Pipeline::start(test_config(), collab);
    let rx = pipeline.subscribe_outcomes();
    feed_tx.send(pending_tx("0xbad")).unwrap();
    sleep(Duration::from_secs(1)).await;
    pipeline.stop().await;

    let outcomes = drain(rx).await;
    assert_eq!(outcomes[0].status, OutcomeStatus::Failed);
    assert_eq!(outcomes[0].attempts, 1);
    assert!(outcomes[0].error.as_deref().unwrap().contains("invalid tick size"));
    assert_eq!(rejecting.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_waits_for_in_flight_requests() {
    let trade = signal("0xslow", SourceType::Live, "m1", 400);
    let submitter = ScriptedSubmitter::slow(Duration::from_millis(500));

    let (collab, feed_tx) = collaborators(vec![trade], vec![], submitter.clone(), true);
    let pipeline = Pipeline::start(test_config(), collab);
    let in_flight = pipeline.in_flight_table();
    let rx = pipeline.subscribe_outcomes();

    feed_tx.send(pending_tx("0xslow")).unwrap();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(pipeline.in_flight_count(), 1);

    pipeline.stop().await;

    assert!(in_flight.is_empty());
    let outcomes = drain(rx).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, OutcomeStatus::Submitted);
    assert!(outcomes[0].finished_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_aggregation_window_flushed_on_stop() {
    let config = PipelineConfig {
        aggregation_enabled: true,
        aggregation_window: Duration::from_secs(30),
        ..test_config()
    };
    let trade = signal("0xopen", SourceType::Live, "m1", 400);
    let submitter = ScriptedSubmitter::ok();

    let (collab, feed_tx) = collaborators(vec![trade], vec![], submitter.clone(), true);
    let pipeline = Pipeline::start(config, collab);
    let rx = pipeline.subscribe_outcomes();

    feed_tx.send(pending_tx("0xopen")).unwrap();
    sleep(Duration::from_millis(100)).await;
    pipeline.stop().await;

    let outcomes = drain(rx).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, OutcomeStatus::Submitted);
}
