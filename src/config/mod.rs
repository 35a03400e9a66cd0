use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_POLYGON_WS_URL: &str = "wss://polygon-bor-rpc.publicnode.com";
const DEFAULT_POLYGON_RPC_URL: &str = "https://polygon-rpc.com";
const DEFAULT_DATA_API_URL: &str = "https://data-api.polymarket.com";
const DEFAULT_CLOB_API_URL: &str = "https://clob.polymarket.com";

/// Poll intervals below this are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Values the detection-and-reaction pipeline runs on.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Lowercase watched addresses.
    pub watched_accounts: Vec<String>,
    pub poll_interval: Duration,
    pub poll_trade_limit: u32,
    pub min_trade_size_usd: Decimal,
    /// 0.0..=1.0
    pub frontrun_size_multiplier: Decimal,
    /// >= 1.0
    pub gas_price_multiplier: Decimal,
    /// Total submission attempts per request (>= 1).
    pub retry_limit: u32,
    pub retry_backoff: Duration,
    pub aggregation_enabled: bool,
    pub aggregation_window: Duration,
    pub dedup_ttl: Duration,
    pub dedup_max_entries: usize,
    pub recent_id_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            watched_accounts: Vec::new(),
            poll_interval: Duration::from_secs(5),
            poll_trade_limit: 20,
            min_trade_size_usd: Decimal::from(100),
            frontrun_size_multiplier: Decimal::new(5, 1), // 0.5
            gas_price_multiplier: Decimal::new(12, 1),    // 1.2
            retry_limit: 3,
            retry_backoff: Duration::from_millis(250),
            aggregation_enabled: false,
            aggregation_window: Duration::from_millis(1_500),
            dedup_ttl: Duration::from_secs(600),
            dedup_max_entries: 50_000,
            recent_id_capacity: 10_000,
        }
    }
}

impl PipelineConfig {
    /// Reject values the pipeline cannot run with and clamp the poll interval.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        self.watched_accounts = self
            .watched_accounts
            .into_iter()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();
        if self.watched_accounts.is_empty() {
            return Err(ConfigError::Missing("WATCHED_ACCOUNTS"));
        }
        if self.frontrun_size_multiplier < Decimal::ZERO
            || self.frontrun_size_multiplier > Decimal::ONE
        {
            return Err(ConfigError::Invalid {
                field: "FRONTRUN_SIZE_MULTIPLIER",
                reason: format!("{} not in 0.0..=1.0", self.frontrun_size_multiplier),
            });
        }
        if self.gas_price_multiplier < Decimal::ONE {
            return Err(ConfigError::Invalid {
                field: "GAS_PRICE_MULTIPLIER",
                reason: format!("{} is below 1.0", self.gas_price_multiplier),
            });
        }
        if self.retry_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "RETRY_LIMIT",
                reason: "must be at least 1".into(),
            });
        }
        if self.poll_interval < MIN_POLL_INTERVAL {
            tracing::warn!(
                requested_ms = self.poll_interval.as_millis() as u64,
                floor_ms = MIN_POLL_INTERVAL.as_millis() as u64,
                "Poll interval below floor, raising"
            );
            self.poll_interval = MIN_POLL_INTERVAL;
        }
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    /// Bearer token for the protected API routes. Unset disables auth.
    pub api_token: Option<String>,

    // Network endpoints
    pub polygon_ws_url: String,
    pub polygon_rpc_url: String,
    pub data_api_url: String,
    pub clob_api_url: String,

    // Polymarket credentials (optional; without them orders are dry-run)
    pub polymarket_private_key: Option<String>,
    pub polymarket_api_key: Option<String>,
    pub polymarket_api_secret: Option<String>,
    pub polymarket_passphrase: Option<String>,

    // Notifications
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    /// Balance the dry-run wallet pretends to hold.
    pub bankroll: Decimal,

    pub pipeline: PipelineConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let watched_accounts: Vec<String> = env::var("WATCHED_ACCOUNTS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            watched_accounts,
            poll_interval: Duration::from_secs(parse_or("POLL_INTERVAL_SECS", 5u64)?),
            poll_trade_limit: parse_or("POLL_TRADE_LIMIT", defaults.poll_trade_limit)?,
            min_trade_size_usd: parse_or("MIN_TRADE_SIZE_USD", defaults.min_trade_size_usd)?,
            frontrun_size_multiplier: parse_or(
                "FRONTRUN_SIZE_MULTIPLIER",
                defaults.frontrun_size_multiplier,
            )?,
            gas_price_multiplier: parse_or("GAS_PRICE_MULTIPLIER", defaults.gas_price_multiplier)?,
            retry_limit: parse_or("RETRY_LIMIT", defaults.retry_limit)?,
            retry_backoff: Duration::from_millis(parse_or("RETRY_BACKOFF_MS", 250u64)?),
            aggregation_enabled: parse_or("AGGREGATION_ENABLED", false)?,
            aggregation_window: Duration::from_millis(parse_or("AGGREGATION_WINDOW_MS", 1_500u64)?),
            dedup_ttl: Duration::from_secs(parse_or("DEDUP_TTL_SECS", 600u64)?),
            dedup_max_entries: parse_or("DEDUP_MAX_ENTRIES", defaults.dedup_max_entries)?,
            recent_id_capacity: defaults.recent_id_capacity,
        }
        .validate()?;

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_or("PORT", 8080u16)?,
            database_url: non_empty("DATABASE_URL"),
            api_token: non_empty("API_TOKEN"),

            polygon_ws_url: env::var("POLYGON_WS_URL")
                .unwrap_or_else(|_| DEFAULT_POLYGON_WS_URL.into()),
            polygon_rpc_url: env::var("POLYGON_RPC_URL")
                .unwrap_or_else(|_| DEFAULT_POLYGON_RPC_URL.into()),
            data_api_url: env::var("DATA_API_URL").unwrap_or_else(|_| DEFAULT_DATA_API_URL.into()),
            clob_api_url: env::var("CLOB_API_URL").unwrap_or_else(|_| DEFAULT_CLOB_API_URL.into()),

            polymarket_private_key: non_empty("POLYMARKET_PRIVATE_KEY"),
            polymarket_api_key: non_empty("POLYMARKET_API_KEY"),
            polymarket_api_secret: non_empty("POLYMARKET_API_SECRET"),
            polymarket_passphrase: non_empty("POLYMARKET_PASSPHRASE"),

            telegram_bot_token: non_empty("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: non_empty("TELEGRAM_CHAT_ID"),

            bankroll: parse_or("BANKROLL", Decimal::from(1_000))?,

            pipeline,
        })
    }

    /// Returns true if all Polymarket API credentials are configured.
    pub fn has_polymarket_auth(&self) -> bool {
        self.polymarket_api_key.is_some()
            && self.polymarket_api_secret.is_some()
            && self.polymarket_passphrase.is_some()
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                field: key,
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}
