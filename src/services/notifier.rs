use serde_json::json;
use tokio::sync::broadcast;

use crate::models::{ExecutionOutcome, OutcomeStatus};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram notification service. Failures are logged but never block the pipeline.
#[derive(Debug, Clone)]
pub struct Notifier {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl Notifier {
    pub fn new(http: reqwest::Client, bot_token: String, chat_id: String) -> Self {
        Self {
            http,
            base_url: TELEGRAM_API_BASE.into(),
            bot_token,
            chat_id,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Send a Telegram message. Failures are logged as warnings.
    pub async fn send(&self, message: &str) {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);

        let body = json!({
            "chat_id": self.chat_id,
            "text": message,
            "parse_mode": "Markdown",
        });

        match self.http.post(&url).json(&body).send().await {
            Ok(resp) if !resp.status().is_success() => {
                tracing::warn!(status = %resp.status(), "Telegram sendMessage returned non-2xx");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send Telegram notification");
            }
        }
    }
}

/// Forward submitted and failed outcomes to Telegram until the channel closes.
pub async fn run_outcome_notifier(notifier: Notifier, mut rx: broadcast::Receiver<ExecutionOutcome>) {
    loop {
        match rx.recv().await {
            Ok(outcome) => {
                if let Some(message) = format_outcome(&outcome) {
                    notifier.send(&message).await;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Notifier lagging — outcomes dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Message for outcomes worth a notification; skips are not.
pub fn format_outcome(outcome: &ExecutionOutcome) -> Option<String> {
    let wallet = &outcome.key.account;
    let wallet_short = if wallet.is_ascii() && wallet.len() > 10 {
        format!("{}...{}", &wallet[..6], &wallet[wallet.len() - 4..])
    } else {
        wallet.clone()
    };
    let market: String = outcome.key.market_id.chars().take(16).collect();

    match outcome.status {
        OutcomeStatus::Submitted | OutcomeStatus::Confirmed => Some(format!(
            "*Frontrun Submitted*\nWallet: `{}`\nSide: {}\nSize: ${} USDC\nGas hint: {} gwei\nOrder: `{}`\nMarket: `{}`",
            wallet_short,
            outcome.key.side,
            outcome.requested_size_usd.round_dp(2),
            outcome.gas_price_hint.round_dp(2),
            outcome.order_id.as_deref().unwrap_or("-"),
            market,
        )),
        OutcomeStatus::Failed => Some(format!(
            "*Frontrun Failed*\nWallet: `{}`\nSide: {}\nSize: ${} USDC\nAttempts: {}\nMarket: `{}`\nError: {}",
            wallet_short,
            outcome.key.side,
            outcome.requested_size_usd.round_dp(2),
            outcome.attempts,
            market,
            outcome.error.as_deref().unwrap_or("unknown"),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Side, SignalKey};
    use rust_decimal::Decimal;

    fn outcome(status: OutcomeStatus) -> ExecutionOutcome {
        let mut o = ExecutionOutcome::skipped(
            SignalKey {
                account: "0x56687bf447db6ffa42ffe2204a05edaa20f55839".into(),
                market_id: "71321045679252212594626385532706912750332728571942532289631379312455583992563".into(),
                side: Side::Buy,
            },
            status,
            Decimal::new(25050, 2),
            vec!["0xhash".into()],
        );
        o.attempts = 3;
        o.error = Some("timeout".into());
        o.order_id = Some("abc-123".into());
        o
    }

    #[test]
    fn formats_submitted_and_failed_only() {
        let submitted = format_outcome(&outcome(OutcomeStatus::Submitted)).unwrap();
        assert!(submitted.contains("Frontrun Submitted"));
        assert!(submitted.contains("0x5668...5839"));
        assert!(submitted.contains("$250.50"));
        assert!(submitted.contains("abc-123"));

        let failed = format_outcome(&outcome(OutcomeStatus::Failed)).unwrap();
        assert!(failed.contains("Attempts: 3"));
        assert!(failed.contains("timeout"));

        assert!(format_outcome(&outcome(OutcomeStatus::SkippedDuplicate)).is_none());
    }

    #[test]
    fn truncates_multibyte_market_on_char_boundary() {
        let mut o = outcome(OutcomeStatus::Submitted);
        o.key.market_id = "é".repeat(20);
        let text = format_outcome(&o).unwrap();
        assert!(text.contains(&"é".repeat(16)));
        assert!(!text.contains(&"é".repeat(17)));
    }

    #[tokio::test]
    async fn posts_to_send_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .match_body(mockito::Matcher::PartialJson(json!({"chat_id": "42"})))
            .with_status(200)
            .create_async()
            .await;

        let notifier = Notifier::new(reqwest::Client::new(), "TOKEN".into(), "42".into())
            .with_base_url(server.url());
        notifier.send("hello").await;

        mock.assert_async().await;
    }
}
