pub mod api;
pub mod chain;
pub mod config;
pub mod db;
pub mod errors;
pub mod execution;
pub mod ingestion;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod polymarket;
pub mod ports;
pub mod services;

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::api::ws_types::WsMessage;
use crate::config::AppConfig;
use crate::execution::InFlightTable;
use crate::services::OutcomeLog;

/// Execution mode reported by the control API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Live,
    DryRun,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Live => "live",
            Mode::DryRun => "dry_run",
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Option<sqlx::PgPool>,
    pub config: Arc<AppConfig>,
    pub ws_tx: broadcast::Sender<WsMessage>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    pub outcome_log: Arc<OutcomeLog>,
    pub in_flight: InFlightTable,
    pub mode: Mode,
    pub wallet_address: Option<String>,
}
