use std::sync::Arc;

use tokio::sync::broadcast;

use polyfront::api::router::create_router;
use polyfront::api::ws_types::WsMessage;
use polyfront::chain::{RpcGasOracle, WsPendingTxFeed};
use polyfront::config::AppConfig;
use polyfront::ingestion::CtfOrderDecoder;
use polyfront::models::{ExecutionOutcome, OutcomeRecord};
use polyfront::pipeline::{Collaborators, Pipeline};
use polyfront::polymarket::{
    ClobClient, DataClient, DryRunSubmitter, PaperBalance, PolymarketAuth, PolymarketWallet,
    TradingClient,
};
use polyfront::ports::{BalanceOracle, OrderSubmitter};
use polyfront::services::notifier::run_outcome_notifier;
use polyfront::services::outcome_log::run_outcome_recorder;
use polyfront::services::{Notifier, OutcomeLog};
use polyfront::{db, metrics, AppState, Mode};

const OUTCOME_LOG_CAPACITY: usize = 1_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // tokio-tungstenite and reqwest both pull rustls; pick the provider once.
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        tracing::debug!("rustls crypto provider already installed");
    }

    let config = Arc::new(AppConfig::from_env()?);
    let metrics_handle = metrics::init_metrics()?;
    let addr = format!("{}:{}", config.host, config.port);

    let db = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::init_pool(url).await?;
            tracing::info!("Database connected");
            Some(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set — outcomes kept in memory only");
            None
        }
    };

    let http = reqwest::Client::new();

    // --- Order side: live wallet or dry run ---
    let wallet = match &config.polymarket_private_key {
        Some(key) => Some(Arc::new(
            PolymarketWallet::connect(&config.clob_api_url, key).await?,
        )),
        None => {
            tracing::warn!("No POLYMARKET_PRIVATE_KEY — orders will be dry-run");
            None
        }
    };
    let mode = if wallet.is_some() { Mode::Live } else { Mode::DryRun };
    let wallet_address = wallet.as_ref().map(|w| w.address());

    let submitter: Arc<dyn OrderSubmitter> = match &wallet {
        Some(w) => Arc::new(TradingClient::new(Arc::clone(w))),
        None => Arc::new(DryRunSubmitter::new()),
    };

    let balance: Arc<dyn BalanceOracle> = match (&wallet_address, clob_auth(&config)) {
        (Some(address), Some(auth)) => Arc::new(ClobClient::new(
            http.clone(),
            config.clob_api_url.clone(),
            auth.with_address(address.clone()),
        )),
        _ => {
            if mode == Mode::Live {
                tracing::warn!("Polymarket API credentials missing — balance checks use BANKROLL");
            }
            Arc::new(PaperBalance::new(config.bankroll))
        }
    };

    // --- Detection side ---
    let collaborators = Collaborators {
        feed: Arc::new(WsPendingTxFeed::new(config.polygon_ws_url.clone())),
        decoder: Arc::new(CtfOrderDecoder::new(&config.pipeline.watched_accounts)),
        activity: Arc::new(DataClient::new(
            http.clone(),
            config.data_api_url.clone(),
            config.pipeline.poll_trade_limit,
        )),
        submitter,
        balance,
        gas: Arc::new(RpcGasOracle::new(http.clone(), config.polygon_rpc_url.clone())),
    };

    let pipeline = Pipeline::start(config.pipeline.clone(), collaborators);

    tracing::info!(
        mode = mode.as_str(),
        wallet = wallet_address.as_deref().unwrap_or("-"),
        accounts = config.pipeline.watched_accounts.len(),
        "Frontrun pipeline running"
    );

    // --- Outcome consumers ---
    let outcome_log = Arc::new(OutcomeLog::new(OUTCOME_LOG_CAPACITY));
    let recorder = tokio::spawn(run_outcome_recorder(
        Arc::clone(&outcome_log),
        db.clone(),
        pipeline.subscribe_outcomes_lossless(),
    ));

    match (&config.telegram_bot_token, &config.telegram_chat_id) {
        (Some(token), Some(chat_id)) => {
            let notifier = Notifier::new(http.clone(), token.clone(), chat_id.clone());
            tokio::spawn(run_outcome_notifier(notifier, pipeline.subscribe_outcomes()));
            tracing::info!("Telegram notifications enabled");
        }
        _ => tracing::info!("Telegram notifications disabled"),
    }

    let (ws_tx, _) = broadcast::channel::<WsMessage>(256);
    tokio::spawn(forward_outcomes_to_ws(pipeline.subscribe_outcomes(), ws_tx.clone()));

    // --- HTTP API ---
    let state = AppState {
        db,
        config: Arc::clone(&config),
        ws_tx,
        metrics_handle,
        outcome_log,
        in_flight: pipeline.in_flight_table(),
        mode,
        wallet_address,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pipeline.stop().await;
    if let Err(e) = recorder.await {
        tracing::error!(error = %e, "Outcome recorder panicked");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn clob_auth(config: &AppConfig) -> Option<PolymarketAuth> {
    Some(PolymarketAuth::new(
        config.polymarket_api_key.clone()?,
        config.polymarket_api_secret.clone()?,
        config.polymarket_passphrase.clone()?,
    ))
}

async fn forward_outcomes_to_ws(
    mut rx: broadcast::Receiver<ExecutionOutcome>,
    ws_tx: broadcast::Sender<WsMessage>,
) {
    loop {
        match rx.recv().await {
            Ok(outcome) => {
                // No connected clients is not an error.
                let _ = ws_tx.send(WsMessage::Outcome(OutcomeRecord::from(&outcome)));
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "WS forwarder lagging — outcomes dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
