use base64::{
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE as BASE64_URL_SAFE},
    Engine,
};
use hmac::{Hmac, Mac};
use reqwest::RequestBuilder;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid base64 secret: {0}")]
    InvalidSecret(#[from] base64::DecodeError),

    #[error("HMAC computation failed: {0}")]
    HmacError(String),
}

/// L2 (API key) credentials for the CLOB REST API.
#[derive(Clone)]
pub struct PolymarketAuth {
    pub api_key: String,
    api_secret: String,
    pub passphrase: String,
    /// Wallet address sent as `POLY-ADDRESS` when known.
    pub address: Option<String>,
}

impl std::fmt::Debug for PolymarketAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolymarketAuth")
            .field("api_key", &self.api_key)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl PolymarketAuth {
    pub fn new(api_key: String, api_secret: String, passphrase: String) -> Self {
        Self {
            api_key,
            api_secret,
            passphrase,
            address: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// HMAC-SHA256 over `{timestamp}{method}{path}{body}`, base64-encoded.
    pub fn sign(
        &self,
        timestamp: &str,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<String, AuthError> {
        // Secrets are issued URL-safe; accept standard alphabet too.
        let secret_bytes = BASE64_URL_SAFE
            .decode(&self.api_secret)
            .or_else(|_| BASE64.decode(&self.api_secret))?;

        let message = format!("{timestamp}{method}{path}{body}");

        let mut mac = HmacSha256::new_from_slice(&secret_bytes)
            .map_err(|e| AuthError::HmacError(e.to_string()))?;
        mac.update(message.as_bytes());

        Ok(BASE64_URL_SAFE.encode(mac.finalize().into_bytes()))
    }

    /// Attach the signed L2 header set to `req`. `path` excludes the query.
    pub fn apply(
        &self,
        req: RequestBuilder,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<RequestBuilder, AuthError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&timestamp, method, path, body)?;

        let mut req = req
            .header("POLY-API-KEY", &self.api_key)
            .header("POLY-SIGNATURE", signature)
            .header("POLY-TIMESTAMP", &timestamp)
            .header("POLY-PASSPHRASE", &self.passphrase);
        if let Some(address) = &self.address {
            req = req.header("POLY-ADDRESS", address);
        }
        Ok(req)
    }
}
