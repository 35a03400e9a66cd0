pub mod aggregator;
pub mod decoder;
pub mod mempool_listener;
pub mod merger;
pub mod poller;

pub use aggregator::Aggregator;
pub use decoder::CtfOrderDecoder;
pub use merger::{MergeOutcome, SignalMerger};
pub use poller::RecentIds;
