pub mod notifier;
pub mod outcome_log;

pub use notifier::Notifier;
pub use outcome_log::OutcomeLog;
