use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{ConfirmationState, Side, SourceType, TradeSignal};
use crate::ports::ActivitySource;

use super::types::ApiTrade;

#[derive(Debug, Error)]
pub enum DataClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Polymarket Data API client, the polled source of trade signals.
#[derive(Debug, Clone)]
pub struct DataClient {
    http: Client,
    base_url: String,
    trade_limit: u32,
}

impl DataClient {
    pub fn new(http: Client, base_url: impl Into<String>, trade_limit: u32) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            trade_limit: trade_limit.max(1),
        }
    }

    /// Fetch the most recent trades for a wallet, newest first.
    pub async fn get_user_trades(
        &self,
        wallet: &str,
        limit: u32,
    ) -> Result<Vec<ApiTrade>, DataClientError> {
        let url = format!("{}/trades", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("user", wallet), ("limit", &limit.to_string())])
            .send()
            .await?
            .error_for_status()?;

        let trades: Vec<ApiTrade> = resp.json().await?;
        Ok(trades)
    }

    fn to_signal(&self, wallet: &str, trade: &ApiTrade) -> Option<TradeSignal> {
        let side = Side::from_api_str(trade.side.as_deref()?)?;
        let outcome_id = trade.asset.clone().filter(|a| !a.is_empty())?;
        let size = trade.size.unwrap_or(Decimal::ZERO);
        let price = trade.price.unwrap_or(Decimal::ZERO);

        let account = trade
            .proxy_wallet
            .as_deref()
            .unwrap_or(wallet)
            .to_lowercase();

        let id = match trade.transaction_hash.as_deref().filter(|h| !h.is_empty()) {
            Some(hash) => TradeSignal::trade_id(hash, &account, &outcome_id, side),
            None => {
                let ts = trade
                    .timestamp
                    .as_ref()
                    .map(|t| t.to_string().trim_matches('"').to_string())
                    .unwrap_or_default();
                TradeSignal::polled_id(&account, &outcome_id, &format!("{side}@{ts}"))
            }
        };

        Some(TradeSignal {
            id,
            source: SourceType::Polled,
            account,
            market_id: outcome_id.clone(),
            outcome_id,
            side,
            size_usd: size * price,
            price,
            detected_at: Utc::now(),
            confirmation: ConfirmationState::Confirmed,
        })
    }
}

/// The API reports one row per fill. Rows sharing an id are one trade:
/// sizes add up and the price is size-weighted. Order is preserved.
fn merge_fills(signals: impl IntoIterator<Item = TradeSignal>) -> Vec<TradeSignal> {
    let mut merged: Vec<TradeSignal> = Vec::new();
    for signal in signals {
        match merged.iter_mut().find(|s| s.id == signal.id) {
            Some(existing) => {
                let total = existing.size_usd + signal.size_usd;
                if !total.is_zero() {
                    existing.price =
                        (existing.price * existing.size_usd + signal.price * signal.size_usd) / total;
                }
                existing.size_usd = total;
            }
            None => merged.push(signal),
        }
    }
    merged
}

#[async_trait]
impl ActivitySource for DataClient {
    async fn poll_recent_activity(&self, account: &str) -> anyhow::Result<Vec<TradeSignal>> {
        let trades = self.get_user_trades(account, self.trade_limit).await?;
        Ok(merge_fills(
            trades.iter().filter_map(|t| self.to_signal(account, t)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const WALLET: &str = "0x56687bf447db6ffa42ffe2204a05edaa20f55839";

    fn trades_body() -> &'static str {
        r#"[
            {
                "proxyWallet": "0x56687BF447DB6FFA42FFE2204A05EDAA20F55839",
                "side": "BUY",
                "asset": "7132",
                "conditionId": "0xcond",
                "size": 1000,
                "price": 0.42,
                "timestamp": 1718000000,
                "transactionHash": "0xDEAD",
                "title": "Will it rain?",
                "outcome": "Yes"
            },
            {
                "proxyWallet": "0x56687bf447db6ffa42ffe2204a05edaa20f55839",
                "side": "SELL",
                "asset": "7133",
                "conditionId": "0xcond",
                "size": "10",
                "price": "0.5",
                "timestamp": 1718000100
            }
        ]"#
    }

    async fn serve(server: &mut mockito::ServerGuard, body: &str) -> mockito::Mock {
        server
            .mock("GET", "/trades")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("user".into(), WALLET.into()),
                Matcher::UrlEncoded("limit".into(), "20".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn converts_trades_keyed_by_outcome_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = serve(&mut server, trades_body()).await;

        let client = DataClient::new(Client::new(), server.url(), 20);
        let signals = client.poll_recent_activity(WALLET).await.unwrap();

        mock.assert_async().await;
        assert_eq!(signals.len(), 2);

        let buy = signals.iter().find(|s| s.side == Side::Buy).unwrap();
        assert_eq!(buy.id, format!("0xdead:{WALLET}:7132:BUY"));
        assert_eq!(buy.account, WALLET);
        assert_eq!(buy.market_id, "7132");
        assert_eq!(buy.outcome_id, "7132");
        assert_eq!(buy.size_usd, Decimal::from(420));
        assert_eq!(buy.source, SourceType::Polled);
        assert_eq!(buy.confirmation, ConfirmationState::Confirmed);

        let sell = signals.iter().find(|s| s.side == Side::Sell).unwrap();
        assert_eq!(sell.id, format!("{WALLET}:7133:SELL@1718000100"));
        assert_eq!(sell.size_usd, Decimal::from(5));
    }

    #[tokio::test]
    async fn opposite_outcomes_of_one_condition_stay_apart() {
        let body = r#"[
            {"side": "BUY", "asset": "111", "conditionId": "0xcond", "size": 100, "price": 0.9,
             "transactionHash": "0xaa"},
            {"side": "BUY", "asset": "222", "conditionId": "0xcond", "size": 100, "price": 0.1,
             "transactionHash": "0xaa"}
        ]"#;
        let mut server = mockito::Server::new_async().await;
        let _mock = serve(&mut server, body).await;

        let client = DataClient::new(Client::new(), server.url(), 20);
        let signals = client.poll_recent_activity(WALLET).await.unwrap();

        assert_eq!(signals.len(), 2);
        assert_ne!(signals[0].id, signals[1].id);
        assert_ne!(signals[0].key(), signals[1].key());
        assert_eq!(signals[0].price, Decimal::new(9, 1));
        assert_eq!(signals[1].price, Decimal::new(1, 1));
    }

    #[tokio::test]
    async fn fills_of_one_trade_are_merged() {
        // 100 shares at 0.4 and 300 at 0.6 in one transaction.
        let body = r#"[
            {"side": "BUY", "asset": "111", "size": 100, "price": 0.4, "transactionHash": "0xbb"},
            {"side": "BUY", "asset": "111", "size": 300, "price": 0.6, "transactionHash": "0xbb"}
        ]"#;
        let mut server = mockito::Server::new_async().await;
        let _mock = serve(&mut server, body).await;

        let client = DataClient::new(Client::new(), server.url(), 20);
        let signals = client.poll_recent_activity(WALLET).await.unwrap();

        assert_eq!(signals.len(), 1);
        // 40 + 180 USD; (0.4 × 40 + 0.6 × 180) / 220
        assert_eq!(signals[0].size_usd, Decimal::from(220));
        assert_eq!(signals[0].price.round_dp(6), Decimal::new(563_636, 6));
    }

    #[tokio::test]
    async fn api_error_fails_the_account() {
        let mut server = mockito::Server::new_async().await;
        let _down = server
            .mock("GET", "/trades")
            .match_query(Matcher::UrlEncoded("user".into(), "0xbroken".into()))
            .with_status(503)
            .create_async()
            .await;

        let client = DataClient::new(Client::new(), server.url(), 20);
        assert!(client.poll_recent_activity("0xbroken").await.is_err());
    }
}
