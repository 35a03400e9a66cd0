//! Polygon node adapters: the pending-transaction feed and the gas oracle.

pub mod gas_oracle;
pub mod pending_feed;

pub use gas_oracle::RpcGasOracle;
pub use pending_feed::WsPendingTxFeed;
