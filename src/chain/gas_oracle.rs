use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::ports::GasPriceOracle;

/// 1 gwei = 10^9 wei.
const GWEI_SCALE: u32 = 9;

#[derive(Debug, Error)]
pub enum GasOracleError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("unparseable gas price: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Reads the node's suggested gas price via JSON-RPC `eth_gasPrice`.
#[derive(Debug, Clone)]
pub struct RpcGasOracle {
    http: Client,
    rpc_url: String,
}

impl RpcGasOracle {
    pub fn new(http: Client, rpc_url: impl Into<String>) -> Self {
        Self {
            http,
            rpc_url: rpc_url.into(),
        }
    }

    pub async fn gas_price_gwei(&self) -> Result<Decimal, GasOracleError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_gasPrice",
            "params": []
        });

        let resp: RpcResponse = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = resp.error {
            return Err(GasOracleError::Rpc(err.to_string()));
        }
        let hex = resp
            .result
            .ok_or_else(|| GasOracleError::Rpc("missing result".into()))?;
        parse_wei_to_gwei(&hex)
    }
}

#[async_trait]
impl GasPriceOracle for RpcGasOracle {
    async fn current_gas_price(&self) -> anyhow::Result<Decimal> {
        Ok(self.gas_price_gwei().await?)
    }
}

fn parse_wei_to_gwei(hex: &str) -> Result<Decimal, GasOracleError> {
    let digits = hex.strip_prefix("0x").unwrap_or(hex);
    let wei = i128::from_str_radix(digits, 16).map_err(|e| GasOracleError::Parse(format!("{hex}: {e}")))?;
    Decimal::try_from_i128_with_scale(wei, GWEI_SCALE)
        .map(|d| d.normalize())
        .map_err(|e| GasOracleError::Parse(format!("{hex}: {e}")))
}
