use serde::Serialize;

use crate::models::OutcomeRecord;

/// Messages broadcast to all connected WebSocket clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    #[serde(rename = "outcome")]
    Outcome(OutcomeRecord),

    #[serde(rename = "status")]
    Status(StatusSnapshot),
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub mode: String,
    pub in_flight: usize,
    pub watched_accounts: usize,
}
