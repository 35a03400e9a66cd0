pub mod decision;
pub mod executor;
pub mod inflight;
pub mod outcomes;

pub use decision::{Decision, DecisionConfig, DecisionEngine, Dispatch};
pub use executor::{Executor, ExecutorConfig};
pub use inflight::{InFlightGuard, InFlightTable};
pub use outcomes::OutcomePublisher;
