use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::Side;
use crate::ports::BalanceOracle;

use super::auth::PolymarketAuth;
use super::types::{ApiBalanceAllowance, AssetType};

/// USDC and outcome token balances are reported in 6-decimal units.
const BALANCE_DECIMALS: u32 = 6;

#[derive(Debug, Error)]
pub enum ClobClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication error: {0}")]
    Auth(#[from] super::auth::AuthError),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Authenticated CLOB REST client; serves as the balance oracle.
#[derive(Debug, Clone)]
pub struct ClobClient {
    http: Client,
    auth: PolymarketAuth,
    base_url: String,
}

impl ClobClient {
    pub fn new(http: Client, base_url: impl Into<String>, auth: PolymarketAuth) -> Self {
        Self {
            http,
            auth,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Current balance of collateral (USDC) or of one outcome token.
    pub async fn get_balance(
        &self,
        asset_type: AssetType,
        token_id: Option<&str>,
    ) -> Result<Decimal, ClobClientError> {
        let path = "/balance-allowance";
        let url = format!("{}{}", self.base_url, path);

        let mut query = vec![("asset_type", asset_type.as_str().to_string())];
        if let Some(token_id) = token_id {
            query.push(("token_id", token_id.to_string()));
        }

        let req = self.auth.apply(self.http.get(&url).query(&query), "GET", path, "")?;
        let resp: ApiBalanceAllowance = req.send().await?.error_for_status()?.json().await?;

        parse_balance(&resp.balance)
    }
}

#[async_trait]
impl BalanceOracle for ClobClient {
    /// BUY spends `size_usd` of USDC; SELL needs `size_usd / price` shares.
    async fn has_sufficient_balance(
        &self,
        outcome_id: &str,
        side: Side,
        size_usd: Decimal,
        price: Decimal,
    ) -> anyhow::Result<bool> {
        let sufficient = match side {
            Side::Buy => {
                let usdc = self.get_balance(AssetType::Collateral, None).await?;
                usdc >= size_usd
            }
            Side::Sell => {
                if price <= Decimal::ZERO {
                    return Ok(false);
                }
                let shares = self
                    .get_balance(AssetType::Conditional, Some(outcome_id))
                    .await?;
                shares >= size_usd / price
            }
        };
        Ok(sufficient)
    }
}

fn parse_balance(raw: &str) -> Result<Decimal, ClobClientError> {
    let units: i128 = raw
        .trim()
        .parse()
        .map_err(|_| ClobClientError::Unexpected(format!("balance {raw:?}")))?;
    Decimal::try_from_i128_with_scale(units, BALANCE_DECIMALS)
        .map_err(|e| ClobClientError::Unexpected(format!("balance {raw:?}: {e}")))
}
