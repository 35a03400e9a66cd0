pub mod auth;
pub mod clob_client;
pub mod data_client;
pub mod dry_run;
pub mod trading;
pub mod types;
pub mod wallet;

pub use auth::PolymarketAuth;
pub use clob_client::ClobClient;
pub use data_client::DataClient;
pub use dry_run::{DryRunSubmitter, PaperBalance};
pub use trading::TradingClient;
pub use types::ApiTrade;
pub use wallet::PolymarketWallet;
