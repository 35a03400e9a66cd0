use std::str::FromStr;

use alloy::signers::local::PrivateKeySigner;
use polymarket_client_sdk::auth::state::Authenticated;
use polymarket_client_sdk::auth::{Normal, Signer};
use polymarket_client_sdk::clob::client::{Client, Config};
use polymarket_client_sdk::POLYGON;

pub type AuthenticatedClient = Client<Authenticated<Normal>>;

/// Authenticated SDK client plus the local signer that owns our funds.
///
/// The private key is parsed once during construction and never stored as a string.
pub struct PolymarketWallet {
    signer: PrivateKeySigner,
    client: AuthenticatedClient,
}

impl PolymarketWallet {
    /// Authenticate against the CLOB at `clob_url`, deriving or creating an
    /// API key as needed. Accepts a hex key with or without `0x`.
    pub async fn connect(clob_url: &str, private_key: &str) -> anyhow::Result<Self> {
        let signer = PrivateKeySigner::from_str(private_key)?.with_chain_id(Some(POLYGON));

        let client = Client::new(clob_url, Config::default())?
            .authentication_builder(&signer)
            .authenticate()
            .await?;

        tracing::info!(address = %client.address(), "Polymarket wallet authenticated");
        Ok(Self { signer, client })
    }

    /// Lowercase hex address of the trading wallet.
    pub fn address(&self) -> String {
        self.client.address().to_string().to_lowercase()
    }

    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}
